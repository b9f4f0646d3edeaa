// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage: one contract, two backends.
//!
//! [`FirestoreDb`] is the production store. [`MemoryStore`] backs local
//! development and tests. Both implement [`CredentialStore`], and both perform
//! each upsert as a single atomic read-modify-write keyed by the natural key
//! (email for users, user id + provider for credentials).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{CredentialRecord, IdentityProfile, Provider, UserAccount};
use crate::services::crypto::SealedSecret;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
}

/// Token fields to write for one (user, provider). The refresh token arrives
/// already sealed.
#[derive(Debug, Clone)]
pub struct TokenWrite {
    pub user_id: String,
    pub provider: Provider,
    pub access_token: Option<String>,
    pub refresh_token: Option<SealedSecret>,
    pub expiry: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Persistence contract for users and their OAuth credentials.
pub trait CredentialStore: Send + Sync {
    /// Create the user on first sight of the email, else refresh display fields.
    fn upsert_user<'a>(
        &'a self,
        profile: &'a IdentityProfile,
    ) -> BoxFuture<'a, Result<UserAccount, AppError>>;

    /// Create or overwrite the record for `(write.user_id, write.provider)`.
    fn upsert_tokens(&self, write: TokenWrite) -> BoxFuture<'_, Result<CredentialRecord, AppError>>;

    fn get_user_by_id<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>>;

    fn get_user_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>>;

    fn get_tokens<'a>(
        &'a self,
        user_id: &'a str,
        provider: Provider,
    ) -> BoxFuture<'a, Result<Option<CredentialRecord>, AppError>>;
}

/// Apply a sign-in to an existing account (or create one).
///
/// Only display fields change on an existing account; id, email and creation
/// time are kept.
pub fn merge_user(
    existing: Option<&UserAccount>,
    profile: &IdentityProfile,
    now: DateTime<Utc>,
) -> UserAccount {
    match existing {
        Some(current) => UserAccount {
            display_name: profile.name.clone(),
            picture_url: profile.picture.clone(),
            updated_at: now,
            ..current.clone()
        },
        None => UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            email: profile.email.clone(),
            display_name: profile.name.clone(),
            picture_url: profile.picture.clone(),
            created_at: now,
            updated_at: now,
        },
    }
}

/// Apply a token write to an existing record (or create one).
///
/// The record id and creation time survive overwrites. A write without a
/// refresh token or scope keeps the stored ones, since Google omits both from
/// most refresh responses.
pub fn merge_tokens(
    existing: Option<&CredentialRecord>,
    write: TokenWrite,
    now: DateTime<Utc>,
) -> CredentialRecord {
    let (id, created_at, previous_refresh, previous_scope) = match existing {
        Some(current) => (
            current.id.clone(),
            current.created_at,
            current.refresh_token.clone(),
            current.scope.clone(),
        ),
        None => (uuid::Uuid::new_v4().to_string(), now, None, None),
    };

    CredentialRecord {
        id,
        user_id: write.user_id,
        provider: write.provider,
        access_token: write.access_token,
        refresh_token: write.refresh_token.or(previous_refresh),
        expiry: write.expiry,
        scope: write.scope.or(previous_scope),
        created_at,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> IdentityProfile {
        IdentityProfile {
            email: "ada@example.edu".to_string(),
            name: name.to_string(),
            picture: None,
        }
    }

    #[test]
    fn test_merge_user_keeps_identity_fields() {
        let t0 = Utc::now();
        let created = merge_user(None, &profile("Ada"), t0);
        let t1 = t0 + chrono::Duration::seconds(30);
        let updated = merge_user(Some(&created), &profile("Ada Lovelace"), t1);

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, t0);
        assert_eq!(updated.updated_at, t1);
        assert_eq!(updated.display_name, "Ada Lovelace");
    }

    #[test]
    fn test_merge_tokens_keeps_refresh_when_absent() {
        let t0 = Utc::now();
        let sealed = SealedSecret {
            ciphertext: vec![1],
            nonce: vec![2; 12],
            auth_tag: vec![3; 16],
        };
        let first = merge_tokens(
            None,
            TokenWrite {
                user_id: "u1".to_string(),
                provider: Provider::Google,
                access_token: Some("a1".to_string()),
                refresh_token: Some(sealed.clone()),
                expiry: None,
                scope: Some("openid".to_string()),
            },
            t0,
        );

        let second = merge_tokens(
            Some(&first),
            TokenWrite {
                user_id: "u1".to_string(),
                provider: Provider::Google,
                access_token: Some("a2".to_string()),
                refresh_token: None,
                expiry: None,
                scope: None,
            },
            t0 + chrono::Duration::seconds(5),
        );

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, t0);
        assert_eq!(second.access_token.as_deref(), Some("a2"));
        assert_eq!(second.refresh_token, Some(sealed));
        assert_eq!(second.scope.as_deref(), Some("openid"));
    }
}
