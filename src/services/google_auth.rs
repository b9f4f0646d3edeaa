// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 token lifecycle and authorized Classroom clients.
//!
//! Handles:
//! - Consent URL generation and authorization code exchange
//! - OpenID userinfo lookup for the signed-in identity
//! - Access token refresh with a 5-minute expiry margin
//! - Persisting refreshed (and rotated) tokens through a [`TokenRotationHook`]

use crate::config::Config;
use crate::error::{AppError, RemoteError};
use crate::models::{IdentityProfile, Provider, TokenSet};
use crate::services::classroom_api::{check_response_json, ClassroomClient, CLASSROOM_API_BASE};
use crate::services::vault::CredentialVault;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Scopes requested at consent: identity plus read-only Classroom access.
pub const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/classroom.courses.readonly",
    "https://www.googleapis.com/auth/classroom.rosters.readonly",
    "https://www.googleapis.com/auth/classroom.coursework.me.readonly",
    "https://www.googleapis.com/auth/classroom.student-submissions.students.readonly",
];

/// Google OAuth endpoints. Overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
        }
    }
}

/// OAuth client for the Google authorization server.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    endpoints: OAuthEndpoints,
}

impl GoogleOAuthClient {
    pub fn new(
        http: reqwest::Client,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            redirect_uri,
            endpoints: OAuthEndpoints::default(),
        }
    }

    pub fn from_config(http: reqwest::Client, config: &Config) -> Self {
        Self::new(
            http,
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            config.google_redirect_uri.clone(),
        )
    }

    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Consent URL requesting offline access, so a refresh token is issued.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, RemoteError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| RemoteError::transport(&e))?;

        let token: GoogleTokenResponse = check_response_json(response).await?;
        Ok(token.into_token_set(Utc::now()))
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Google usually omits `refresh_token` here; when it does send one, the
    /// old token has been rotated out.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, RemoteError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| RemoteError::transport(&e))?;

        let token: GoogleTokenResponse = check_response_json(response).await?;
        Ok(token.into_token_set(Utc::now()))
    }

    /// Fetch the signed-in identity from the OpenID userinfo endpoint.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<IdentityProfile, RemoteError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| RemoteError::transport(&e))?;

        let info: GoogleUserInfo = check_response_json(response).await?;
        let email = info
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| RemoteError::malformed("userinfo response has no email"))?;

        Ok(IdentityProfile {
            email,
            name: info.name.unwrap_or_default(),
            picture: info.picture.filter(|p| !p.is_empty()),
        })
    }
}

/// Token endpoint response.
#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl GoogleTokenResponse {
    fn into_token_set(self, now: DateTime<Utc>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry: self
                .expires_in
                .and_then(Duration::try_seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime)),
            scope: self.scope,
        }
    }
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Token session - per-client access token state
// ─────────────────────────────────────────────────────────────────────────────

/// Observer for every token refresh a [`TokenSession`] performs.
///
/// Failures are the hook's own business: the request that triggered the
/// refresh proceeds either way.
pub trait TokenRotationHook: Send + Sync {
    fn on_refresh<'a>(&'a self, user_id: &'a str, tokens: &'a TokenSet) -> BoxFuture<'a, ()>;
}

/// Persists refreshed tokens, including a rotated refresh token, to the vault.
pub struct VaultRotationHook {
    vault: CredentialVault,
}

impl VaultRotationHook {
    pub fn new(vault: CredentialVault) -> Self {
        Self { vault }
    }
}

impl TokenRotationHook for VaultRotationHook {
    fn on_refresh<'a>(&'a self, user_id: &'a str, tokens: &'a TokenSet) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if tokens.refresh_token.is_some() {
                tracing::info!(user_id, "Refresh token rotated, persisting replacement");
            }
            if let Err(e) = self
                .vault
                .upsert_tokens(user_id, Provider::Google, tokens)
                .await
            {
                tracing::warn!(error = %e, user_id, "Failed to persist refreshed tokens");
            }
        })
    }
}

struct SessionTokens {
    access_token: Option<String>,
    expiry: Option<DateTime<Utc>>,
    refresh_token: String,
}

/// Access token state for one authorized client.
///
/// The mutex serializes refreshes, so concurrent requests through the same
/// client share one refresh instead of racing.
pub struct TokenSession {
    user_id: String,
    oauth: GoogleOAuthClient,
    hook: Arc<dyn TokenRotationHook>,
    tokens: Mutex<SessionTokens>,
}

impl TokenSession {
    pub fn new(
        user_id: String,
        oauth: GoogleOAuthClient,
        hook: Arc<dyn TokenRotationHook>,
        refresh_token: String,
        access_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id,
            oauth,
            hook,
            tokens: Mutex::new(SessionTokens {
                access_token,
                expiry,
                refresh_token,
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// A valid access token, refreshing first if the current one is missing or
    /// within the refresh margin of expiry.
    pub async fn access_token(&self) -> Result<String, RemoteError> {
        let mut tokens = self.tokens.lock().await;

        if let (Some(access_token), Some(expiry)) = (&tokens.access_token, tokens.expiry) {
            if Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expiry {
                return Ok(access_token.clone());
            }
        }

        self.refresh_locked(&mut tokens).await
    }

    /// Refresh unconditionally (the API rejected the current token).
    pub async fn force_refresh(&self) -> Result<String, RemoteError> {
        let mut tokens = self.tokens.lock().await;
        self.refresh_locked(&mut tokens).await
    }

    async fn refresh_locked(&self, tokens: &mut SessionTokens) -> Result<String, RemoteError> {
        tracing::debug!(user_id = %self.user_id, "Refreshing access token");

        let refreshed = self.oauth.refresh(&tokens.refresh_token).await?;
        let access_token = refreshed
            .access_token
            .clone()
            .ok_or_else(|| RemoteError::malformed("token response has no access_token"))?;

        if let Some(rotated) = &refreshed.refresh_token {
            tokens.refresh_token = rotated.clone();
        }
        tokens.access_token = Some(access_token.clone());
        tokens.expiry = refreshed.expiry;

        self.hook.on_refresh(&self.user_id, &refreshed).await;

        Ok(access_token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClassroomClientFactory - builds per-user authorized clients
// ─────────────────────────────────────────────────────────────────────────────

/// Builds Classroom clients authorized as a stored user.
#[derive(Clone)]
pub struct ClassroomClientFactory {
    http: reqwest::Client,
    oauth: GoogleOAuthClient,
    vault: CredentialVault,
    hook: Arc<dyn TokenRotationHook>,
    api_base: String,
}

impl ClassroomClientFactory {
    /// Factory whose clients persist refreshed tokens back into `vault`.
    pub fn new(http: reqwest::Client, oauth: GoogleOAuthClient, vault: CredentialVault) -> Self {
        let hook = Arc::new(VaultRotationHook::new(vault.clone()));
        Self {
            http,
            oauth,
            vault,
            hook,
            api_base: CLASSROOM_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_rotation_hook(mut self, hook: Arc<dyn TokenRotationHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Client acting as `user_id`, renewing its access token from the stored
    /// refresh token as needed.
    pub async fn get_authorized_client(&self, user_id: &str) -> Result<ClassroomClient, AppError> {
        let record = self
            .vault
            .get_tokens_for(user_id, Provider::Google)
            .await?
            .ok_or_else(|| {
                AppError::CredentialsNotFound(format!("no Google tokens for user {}", user_id))
            })?;

        let refresh_token = self.vault.reveal_refresh_token(&record)?;

        let session = TokenSession::new(
            user_id.to_string(),
            self.oauth.clone(),
            self.hook.clone(),
            refresh_token,
            record.access_token,
            record.expiry,
        );

        Ok(ClassroomClient::new(
            self.http.clone(),
            self.api_base.clone(),
            Arc::new(session),
        ))
    }
}
