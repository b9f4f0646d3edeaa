// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Failures of calls to Google are captured as [`RemoteError`] and must be
//! passed through [`translate`] before they leave the service layer. The
//! result is an [`ErrorEnvelope`] carrying one of the closed [`ErrorCode`]s.

use crate::services::crypto::CryptoError;
use crate::services::roles::CourseRole;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reason markers Google uses for revoked or expired grants.
const REAUTH_MARKERS: [&str; 2] = ["invalid_grant", "invalid_token"];

/// Closed set of error codes surfaced to dashboard clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthReauth,
    InsufficientPermissions,
    NotFoundOrForbidden,
    ProviderError,
    CredentialsNotFound,
    IntegrityError,
    RoleRequired,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthReauth => "AUTH_REAUTH",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::NotFoundOrForbidden => "NOT_FOUND_OR_FORBIDDEN",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::CredentialsNotFound => "CREDENTIALS_NOT_FOUND",
            ErrorCode::IntegrityError => "INTEGRITY_ERROR",
            ErrorCode::RoleRequired => "ROLE_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translated error: what a caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    #[serde(rename = "status")]
    pub http_status: u16,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, http_status: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            http_status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.http_status, self.message)
    }
}

/// Untranslated failure of a call to Google (Classroom API or OAuth endpoint).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status, if a response was received at all.
    pub status: Option<u16>,
    /// Machine-readable reason (`errors[0].reason`, OAuth `error`, or API `status`).
    pub reason: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl RemoteError {
    pub fn new(status: Option<u16>, reason: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
        }
    }

    /// Build from an unsuccessful HTTP response body.
    ///
    /// Understands both the Google API error shape
    /// (`{"error": {"code", "message", "status", "errors": [{"reason"}]}}`)
    /// and the OAuth token endpoint shape (`{"error", "error_description"}`).
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let (reason, message) = match parsed.as_ref().and_then(|v| v.get("error")) {
            Some(Value::Object(error)) => {
                let reason = error
                    .get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.get("reason"))
                    .and_then(Value::as_str)
                    .or_else(|| error.get("status").and_then(Value::as_str))
                    .map(str::to_string);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                (reason, message)
            }
            Some(Value::String(code)) => {
                let description = parsed
                    .as_ref()
                    .and_then(|v| v.get("error_description"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                (Some(code.clone()), description)
            }
            _ => (None, None),
        };

        let message = message.unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.to_string()
            }
        });

        Self::new(Some(status), reason, message)
    }

    /// Failure below HTTP (connect, TLS, timeout).
    pub fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::deadline_exceeded("Request to Google timed out");
        }
        Self::new(err.status().map(|s| s.as_u16()), None, err.to_string())
    }

    /// A per-call or aggregate deadline expired.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Some(504), Some("deadline_exceeded".to_string()), message)
    }

    /// The response arrived but did not have the expected shape.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(None, None, message)
    }

    /// Best-effort reason text: the structured reason if present, else the message.
    pub fn best_reason(&self) -> &str {
        self.reason.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.best_reason()),
            None => f.write_str(self.best_reason()),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Map a raw remote failure into the closed taxonomy. First match wins.
pub fn translate(raw: &RemoteError) -> ErrorEnvelope {
    let reason = raw.best_reason();
    let needs_reauth = raw.status == Some(401)
        || REAUTH_MARKERS
            .iter()
            .any(|marker| reason.contains(marker) || raw.message.contains(marker));

    if needs_reauth {
        return ErrorEnvelope::new(
            ErrorCode::AuthReauth,
            401,
            "Authentication expired. Please sign in again.",
        );
    }

    match raw.status {
        Some(403) => ErrorEnvelope::new(
            ErrorCode::InsufficientPermissions,
            403,
            "Insufficient permissions or Classroom API scopes.",
        ),
        // Google answers 404 both for missing resources and for ones the
        // caller's role cannot see.
        Some(404) => ErrorEnvelope::new(
            ErrorCode::NotFoundOrForbidden,
            404,
            "Resource not found or not accessible with current role.",
        ),
        status => ErrorEnvelope::new(
            ErrorCode::ProviderError,
            status.unwrap_or(500),
            reason.to_string(),
        ),
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A translated Google failure.
    #[error("{0}")]
    Remote(ErrorEnvelope),

    #[error("No stored credentials: {0}")]
    CredentialsNotFound(String),

    #[error("Stored secret failed its integrity check")]
    Integrity,

    #[error("Stored secret could not be decrypted: {0}")]
    Decryption(String),

    #[error("Course role required: {0}")]
    RoleRequired(CourseRole),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        AppError::Remote(translate(&err))
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Integrity => AppError::Integrity,
            CryptoError::Decryption(msg) => AppError::Decryption(msg),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl AppError {
    /// The closed-taxonomy envelope for this error, if it belongs to one.
    pub fn envelope(&self) -> Option<ErrorEnvelope> {
        match self {
            AppError::Remote(envelope) => Some(envelope.clone()),
            AppError::CredentialsNotFound(_) => Some(ErrorEnvelope::new(
                ErrorCode::CredentialsNotFound,
                401,
                "No stored Google credentials. Please sign in again to grant offline access.",
            )),
            AppError::Integrity | AppError::Decryption(_) => Some(ErrorEnvelope::new(
                ErrorCode::IntegrityError,
                500,
                "Stored credentials could not be verified. Please sign in again.",
            )),
            AppError::RoleRequired(role) => Some(ErrorEnvelope::new(
                ErrorCode::RoleRequired,
                403,
                role_required_message(*role),
            )),
            _ => None,
        }
    }

    /// Whether the caller must re-run the OAuth consent flow.
    pub fn is_reauth(&self) -> bool {
        matches!(
            self.envelope(),
            Some(ErrorEnvelope {
                code: ErrorCode::AuthReauth | ErrorCode::CredentialsNotFound,
                ..
            })
        )
    }
}

fn role_required_message(role: CourseRole) -> String {
    match role {
        CourseRole::Teacher => "Only teachers can view this. Ask the course owner to add you as a teacher.".to_string(),
        CourseRole::Student => "Only students enrolled in this course can view this.".to_string(),
        CourseRole::Unknown => "Your role in this course could not be determined.".to_string(),
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(envelope) = self.envelope() {
            let status = StatusCode::from_u16(envelope.http_status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::warn!(code = %envelope.code, error = %self, "Request failed");
            }
            let body = ErrorResponse {
                error: envelope.message,
                code: envelope.code.as_str().to_string(),
                status: status.as_u16(),
            };
            return (status, Json(body)).into_response();
        }

        let (status, code, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            other => {
                tracing::error!(error = %other, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
