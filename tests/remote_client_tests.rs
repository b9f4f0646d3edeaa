// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorized Classroom client tests against a local fake Google server.
//!
//! These tests verify that:
//! 1. Expired or nearly expired access tokens are refreshed before use
//! 2. A 401 from the API triggers exactly one refresh and retry
//! 3. Refreshed tokens, including a rotated refresh token, reach the vault
//! 4. Revoked grants surface as re-auth errors

use chrono::{Duration, Utc};
use classroom_bridge::error::AppError;
use classroom_bridge::models::{IdentityProfile, Provider, TokenSet};
use classroom_bridge::services::{
    ClassroomApi, ClassroomClientFactory, CredentialVault, GoogleOAuthClient, ListRequest,
};
use std::sync::Arc;

mod common;
use common::{fake_oauth_endpoints, spawn_fake_google, test_vault, FakeGoogle};

struct Harness {
    factory: ClassroomClientFactory,
    vault: CredentialVault,
    google: Arc<FakeGoogle>,
    user_id: String,
}

async fn harness(google: FakeGoogle, access_token: &str, expires_in: Duration) -> Harness {
    let google = Arc::new(google);
    let base = spawn_fake_google(google.clone()).await;

    let (vault, _store) = test_vault();
    let user_id = vault
        .upsert_user(&IdentityProfile {
            email: "ada@example.edu".to_string(),
            name: "Ada".to_string(),
            picture: None,
        })
        .await
        .unwrap();
    vault
        .upsert_tokens(
            &user_id,
            Provider::Google,
            &TokenSet {
                access_token: Some(access_token.to_string()),
                refresh_token: Some("refresh-0".to_string()),
                expiry: Some(Utc::now() + expires_in),
                scope: Some("openid".to_string()),
            },
        )
        .await
        .unwrap();

    let http = reqwest::Client::new();
    let oauth = GoogleOAuthClient::new(
        http.clone(),
        "client-id".to_string(),
        "client-secret".to_string(),
        "http://localhost:4000/auth/google/callback".to_string(),
    )
    .with_endpoints(fake_oauth_endpoints(&base));
    let factory =
        ClassroomClientFactory::new(http, oauth, vault.clone()).with_api_base(format!("{}/v1", base));

    Harness {
        factory,
        vault,
        google,
        user_id,
    }
}

fn courses() -> ListRequest {
    ListRequest::Courses {
        states: vec!["ACTIVE".to_string()],
    }
}

#[tokio::test]
async fn test_valid_token_used_without_refresh() {
    let h = harness(FakeGoogle::default(), "live", Duration::hours(1)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    let page = client.list_page(&courses(), None).await.unwrap();

    assert_eq!(page["courses"].as_array().unwrap().len(), 2);
    assert_eq!(h.google.refresh_count(), 0);
    assert_eq!(h.google.seen_access_tokens(), vec!["live".to_string()]);
}

#[tokio::test]
async fn test_expired_token_refreshed_before_call() {
    let h = harness(FakeGoogle::default(), "old", Duration::minutes(-1)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    client.list_page(&courses(), None).await.unwrap();

    assert_eq!(h.google.refresh_count(), 1);
    assert_eq!(h.google.seen_access_tokens(), vec!["access-1".to_string()]);

    let forms = h.google.token_forms.lock().unwrap().clone();
    assert_eq!(forms[0].get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(forms[0].get("refresh_token").map(String::as_str), Some("refresh-0"));

    let record = h
        .vault
        .get_tokens_for(&h.user_id, Provider::Google)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.access_token.as_deref(), Some("access-1"));
    assert!(record.expiry.unwrap() > Utc::now() + Duration::minutes(50));
    // No rotation: the original refresh token is kept.
    assert_eq!(h.vault.reveal_refresh_token(&record).unwrap(), "refresh-0");
}

#[tokio::test]
async fn test_token_inside_refresh_margin_is_refreshed() {
    let h = harness(FakeGoogle::default(), "almost", Duration::minutes(2)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    client.list_page(&courses(), None).await.unwrap();

    assert_eq!(h.google.refresh_count(), 1);
    assert_eq!(h.google.seen_access_tokens(), vec!["access-1".to_string()]);
}

#[tokio::test]
async fn test_unauthorized_retried_once_after_refresh() {
    let google = FakeGoogle {
        rejected_access_tokens: vec!["stale".to_string()],
        ..Default::default()
    };
    let h = harness(google, "stale", Duration::hours(1)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    client.list_page(&courses(), None).await.unwrap();

    assert_eq!(h.google.refresh_count(), 1);
    assert_eq!(
        h.google.seen_access_tokens(),
        vec!["stale".to_string(), "access-1".to_string()]
    );
}

#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let google = FakeGoogle {
        rejected_access_tokens: vec!["stale".to_string(), "access-1".to_string()],
        ..Default::default()
    };
    let h = harness(google, "stale", Duration::hours(1)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    let err = client.list_page(&courses(), None).await.unwrap_err();

    assert_eq!(err.status, Some(401));
    assert_eq!(h.google.refresh_count(), 1);
    assert_eq!(h.google.seen_access_tokens().len(), 2);
    assert!(AppError::from(err).is_reauth());
}

#[tokio::test]
async fn test_rotated_refresh_token_persisted() {
    let google = FakeGoogle {
        rotated_refresh_token: Some("refresh-rotated".to_string()),
        ..Default::default()
    };
    let h = harness(google, "old", Duration::minutes(-5)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    client.list_page(&courses(), None).await.unwrap();

    let record = h
        .vault
        .get_tokens_for(&h.user_id, Provider::Google)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        h.vault.reveal_refresh_token(&record).unwrap(),
        "refresh-rotated"
    );

    // A fresh client picks up the rotated token for its next refresh.
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();
    assert!(client.list_page(&courses(), None).await.is_ok());
}

#[tokio::test]
async fn test_revoked_grant_is_reauth() {
    let google = FakeGoogle {
        revoked: true,
        ..Default::default()
    };
    let h = harness(google, "old", Duration::minutes(-1)).await;
    let client = h.factory.get_authorized_client(&h.user_id).await.unwrap();

    let err = client.list_page(&courses(), None).await.unwrap_err();

    assert_eq!(err.reason.as_deref(), Some("invalid_grant"));
    assert!(AppError::from(err).is_reauth());
    assert!(h.google.seen_access_tokens().is_empty());
}

#[tokio::test]
async fn test_no_stored_tokens_is_credentials_not_found() {
    let h = harness(FakeGoogle::default(), "live", Duration::hours(1)).await;

    let err = h
        .factory
        .get_authorized_client("someone-else")
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AppError::CredentialsNotFound(_)));
    assert!(err.is_reauth());
}
