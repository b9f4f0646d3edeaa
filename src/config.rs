// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup. Secrets arrive as environment variables (a `.env`
//! file locally, secret bindings in Cloud Run).

use base64::Engine;
use std::env;
use std::time::Duration;

/// Length in bytes of the refresh-token encryption key.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// OAuth redirect URI registered with Google
    pub google_redirect_uri: String,
    /// Frontend URL for post-login redirects and CORS
    pub frontend_url: String,
    /// GCP project ID; when unset, credentials live in memory
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,
    /// Deadline for each outbound call to Google
    pub remote_call_timeout: Duration,
    /// Deadline for an aggregated submission listing
    pub aggregate_timeout: Duration,
    /// Concurrent per-coursework drains during aggregation
    pub submission_fanout_concurrency: usize,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// AES-256 key sealing refresh tokens at rest (exactly 32 bytes)
    pub encryption_key: Vec<u8>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("google_client_id", &self.google_client_id)
            .field("google_redirect_uri", &self.google_redirect_uri)
            .field("frontend_url", &self.frontend_url)
            .field("gcp_project_id", &self.gcp_project_id)
            .field("port", &self.port)
            .field("remote_call_timeout", &self.remote_call_timeout)
            .field("aggregate_timeout", &self.aggregate_timeout)
            .field(
                "submission_fanout_concurrency",
                &self.submission_fanout_concurrency,
            )
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_redirect_uri: "http://localhost:4000/auth/google/callback".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: None,
            port: 4000,
            remote_call_timeout: Duration::from_secs(10),
            aggregate_timeout: Duration::from_secs(60),
            submission_fanout_concurrency: 4,
            google_client_secret: "test_secret".to_string(),
            encryption_key: vec![7u8; ENCRYPTION_KEY_LEN],
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = required("JWT_SIGNING_KEY")?.into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(String::into_bytes)
            .unwrap_or_else(|| jwt_signing_key.clone());

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            frontend_url: env::var("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            port: parse_or("PORT", 4000)?,
            remote_call_timeout: Duration::from_secs(parse_or("REMOTE_CALL_TIMEOUT_SECS", 10)?),
            aggregate_timeout: Duration::from_secs(parse_or("AGGREGATE_TIMEOUT_SECS", 60)?),
            submission_fanout_concurrency: parse_or::<usize>("SUBMISSION_FANOUT_CONCURRENCY", 4)?
                .max(1),

            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            encryption_key: decode_encryption_key(&required("ENCRYPTION_KEY_BASE64")?)?,
            jwt_signing_key,
            oauth_state_key,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {:?}", raw))),
        Err(_) => Ok(default),
    }
}

/// Decode and length-check the base64 encryption key.
pub fn decode_encryption_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let key = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| ConfigError::Invalid("ENCRYPTION_KEY_BASE64", "not valid base64".to_string()))?;

    if key.len() != ENCRYPTION_KEY_LEN {
        return Err(ConfigError::Invalid(
            "ENCRYPTION_KEY_BASE64",
            format!("must decode to {} bytes, got {}", ENCRYPTION_KEY_LEN, key.len()),
        ));
    }

    Ok(key)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
