// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential vault: user and token persistence with refresh tokens sealed at rest.
//!
//! Plaintext refresh tokens exist only in memory. They are sealed with the
//! [`CryptoEnvelope`] before reaching the store, and revealed only on the way
//! to building an authorized client.

use crate::db::{CredentialStore, TokenWrite};
use crate::error::AppError;
use crate::models::{CredentialRecord, IdentityProfile, Provider, TokenSet, UserAccount};
use crate::services::crypto::CryptoEnvelope;
use std::sync::Arc;

/// Repository over a [`CredentialStore`] that owns encryption of refresh tokens.
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    crypto: CryptoEnvelope,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn CredentialStore>, crypto: CryptoEnvelope) -> Self {
        Self { store, crypto }
    }

    /// Create or refresh the user for this identity; returns the stable user id.
    pub async fn upsert_user(&self, profile: &IdentityProfile) -> Result<String, AppError> {
        let account = self.store.upsert_user(profile).await?;
        Ok(account.id)
    }

    /// Persist a token set for `(user_id, provider)`; returns the record id.
    ///
    /// A token set without a refresh token leaves the stored (sealed) one in place.
    pub async fn upsert_tokens(
        &self,
        user_id: &str,
        provider: Provider,
        tokens: &TokenSet,
    ) -> Result<String, AppError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .map(|plaintext| self.crypto.encrypt(plaintext))
            .transpose()?;

        let record = self
            .store
            .upsert_tokens(TokenWrite {
                user_id: user_id.to_string(),
                provider,
                access_token: tokens.access_token.clone(),
                refresh_token,
                expiry: tokens.expiry,
                scope: tokens.scope.clone(),
            })
            .await?;

        tracing::debug!(
            user_id,
            provider = %provider,
            sealed_refresh = record.refresh_token.is_some(),
            "Stored OAuth tokens"
        );

        Ok(record.id)
    }

    pub async fn get_tokens_for(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<CredentialRecord>, AppError> {
        self.store.get_tokens(user_id, provider).await
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<UserAccount>, AppError> {
        self.store.get_user_by_id(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, AppError> {
        self.store.get_user_by_email(email).await
    }

    /// Decrypt the stored refresh token of a record.
    ///
    /// A record without one cannot mint access tokens, so it counts as missing
    /// credentials.
    pub fn reveal_refresh_token(&self, record: &CredentialRecord) -> Result<String, AppError> {
        let sealed = record.refresh_token.as_ref().ok_or_else(|| {
            AppError::CredentialsNotFound(format!("no refresh token for user {}", record.user_id))
        })?;
        Ok(self.crypto.decrypt(sealed)?)
    }
}
