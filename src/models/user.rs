// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User and credential records owned by the vault.

use crate::services::crypto::SealedSecret;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth provider slot. One credential record per (user, provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account stored in Firestore (or the in-memory store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Stable opaque id (UUID v4)
    pub id: String,
    /// Email address (unique key)
    pub email: String,
    /// Display name from the identity provider
    pub display_name: String,
    /// Profile picture URL
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity fields received on each successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Stored OAuth credentials for one (user, provider).
///
/// The refresh token is only ever persisted sealed; its ciphertext, nonce and
/// tag live in one [`SealedSecret`] so they are present or absent together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub user_id: String,
    pub provider: Provider,
    /// Short-lived access token (stored in the clear)
    pub access_token: Option<String>,
    pub refresh_token: Option<SealedSecret>,
    /// When the access token expires
    pub expiry: Option<DateTime<Utc>>,
    /// Granted OAuth scopes (space separated)
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plaintext token set as returned by the OAuth token endpoint.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}
