// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth sign-in routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::models::Provider;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a consent round trip may take before its state is rejected.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/api/logout", post(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to return to. Only the configured frontend or a local
    /// development origin is honored.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google consent.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .map(|uri| uri.trim_end_matches('/').to_string())
        .filter(|uri| is_allowed_frontend(uri, &state.config.frontend_url))
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(&frontend_url, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state.oauth.authorization_url(&oauth_state);

    tracing::info!(
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store credentials, start session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now_millis().ok()?))
        .ok_or_else(|| {
            tracing::warn!("Invalid, expired or missing OAuth state parameter");
            AppError::BadRequest("Invalid OAuth state".to_string())
        })?;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!(
            "{}/auth/error?error={}",
            frontend_url,
            urlencoding::encode(&error)
        );
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let tokens = state.oauth.exchange_code(&code).await?;

    let access_token = tokens.access_token.as_deref().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Token exchange returned no access token"))
    })?;
    let profile = state.oauth.fetch_profile(access_token).await?;

    let user_id = state.vault.upsert_user(&profile).await?;

    if tokens.refresh_token.is_some() {
        state
            .vault
            .upsert_tokens(&user_id, Provider::Google, &tokens)
            .await?;
    } else {
        tracing::warn!(
            user_id = %user_id,
            "Google returned no refresh token; keeping any stored credentials"
        );
    }

    tracing::info!(user_id = %user_id, "OAuth successful, user and tokens stored");

    let jwt = create_jwt(&user_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local_origin(&frontend_url))
        .build();

    let redirect_url = format!("{}/auth/success", frontend_url);
    Ok((jar.add(cookie), Redirect::temporary(&redirect_url)))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// Logout - clear the session cookie.
///
/// The expiring cookie is sent whether or not the request carried a session.
async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    let mut removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    removal.make_removal();
    (jar.add(removal), Json(LogoutResponse { ok: true }))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// A plain `http` URL whose host is exactly `localhost` or `127.0.0.1`, with no userinfo.
pub(crate) fn is_local_origin(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    parsed.scheme() == "http"
        && parsed.username().is_empty()
        && parsed.password().is_none()
        && matches!(parsed.host_str(), Some("localhost" | "127.0.0.1"))
}

fn is_allowed_frontend(url: &str, configured: &str) -> bool {
    url == configured || is_local_origin(url)
}

/// Sign `frontend_url` and the issue time into an opaque OAuth `state` value.
///
/// Format before base64: `frontend_url|timestamp_hex|signature_hex`.
pub fn sign_state(frontend_url: &str, issued_at_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, issued_at_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify an OAuth `state` value and return the frontend URL it carries.
///
/// Fails on a bad signature or a state older than ten minutes.
pub fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right: only the URL may contain '|'.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", frontend_url, timestamp_hex).as_bytes());
    let expected = mac.finalize().into_bytes();

    let provided = hex::decode(signature_hex).ok()?;
    if !bool::from(expected.as_slice().ct_eq(&provided)) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_at) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}
