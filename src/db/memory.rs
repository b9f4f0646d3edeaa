// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store for local development and tests.
//!
//! Upserts hold the DashMap entry lock for their key while reading and
//! writing, so concurrent sign-ins for the same identity cannot lose updates.

use crate::db::{merge_tokens, merge_user, CredentialStore, TokenWrite};
use crate::error::AppError;
use crate::models::{CredentialRecord, IdentityProfile, Provider, UserAccount};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Credential store backed by concurrent hash maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Users keyed by email
    users: Arc<DashMap<String, UserAccount>>,
    /// User id → email
    user_emails: Arc<DashMap<String, String>>,
    tokens: Arc<DashMap<(String, Provider), CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of stored credential records.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

impl CredentialStore for MemoryStore {
    fn upsert_user<'a>(
        &'a self,
        profile: &'a IdentityProfile,
    ) -> BoxFuture<'a, Result<UserAccount, AppError>> {
        Box::pin(async move {
            let now = chrono::Utc::now();
            let account = match self.users.entry(profile.email.clone()) {
                Entry::Occupied(mut entry) => {
                    let merged = merge_user(Some(entry.get()), profile, now);
                    entry.insert(merged.clone());
                    merged
                }
                Entry::Vacant(entry) => {
                    let created = merge_user(None, profile, now);
                    self.user_emails
                        .insert(created.id.clone(), created.email.clone());
                    entry.insert(created.clone());
                    created
                }
            };
            Ok(account)
        })
    }

    fn upsert_tokens(&self, write: TokenWrite) -> BoxFuture<'_, Result<CredentialRecord, AppError>> {
        Box::pin(async move {
            let now = chrono::Utc::now();
            let key = (write.user_id.clone(), write.provider);
            let record = match self.tokens.entry(key) {
                Entry::Occupied(mut entry) => {
                    let merged = merge_tokens(Some(entry.get()), write, now);
                    entry.insert(merged.clone());
                    merged
                }
                Entry::Vacant(entry) => {
                    let created = merge_tokens(None, write, now);
                    entry.insert(created.clone());
                    created
                }
            };
            Ok(record)
        })
    }

    fn get_user_by_id<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>> {
        Box::pin(async move {
            let email = match self.user_emails.get(user_id) {
                Some(email) => email.value().clone(),
                None => return Ok(None),
            };
            Ok(self.users.get(&email).map(|user| user.value().clone()))
        })
    }

    fn get_user_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>> {
        Box::pin(async move { Ok(self.users.get(email).map(|user| user.value().clone())) })
    }

    fn get_tokens<'a>(
        &'a self,
        user_id: &'a str,
        provider: Provider,
    ) -> BoxFuture<'a, Result<Option<CredentialRecord>, AppError>> {
        Box::pin(async move {
            Ok(self
                .tokens
                .get(&(user_id.to_string(), provider))
                .map(|record| record.value().clone()))
        })
    }
}
