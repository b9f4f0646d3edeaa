// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (keyed by email, the natural key)
//! - Tokens (keyed by `{user_id}_{provider}`)

use crate::db::{collections, merge_tokens, merge_user, CredentialStore, TokenWrite};
use crate::error::AppError;
use crate::models::{CredentialRecord, IdentityProfile, Provider, UserAccount};
use futures_util::future::BoxFuture;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Document id for a user: the percent-encoded email.
pub fn user_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

/// Document id for a credential record.
pub fn token_doc_id(user_id: &str, provider: Provider) -> String {
    format!("{}_{}", user_id, provider.as_str())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create or update a user in one transaction keyed by email.
    ///
    /// The read happens inside the transaction, so when two sign-ins for the
    /// same email race, the losing commit fails with `AppError::Database`
    /// instead of minting a second id. Nothing retries it here.
    pub async fn upsert_user_record(
        &self,
        profile: &IdentityProfile,
    ) -> Result<UserAccount, AppError> {
        let client = self.get_client()?;
        let doc_id = user_doc_id(&profile.email);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let tx_reader = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let existing: Option<UserAccount> = tx_reader
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))?;

        let account = merge_user(existing.as_ref(), profile, chrono::Utc::now());

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&doc_id)
            .object(&account)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            user_id = %account.id,
            created = existing.is_none(),
            "User upserted"
        );

        Ok(account)
    }

    /// Get a user by their opaque id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>, AppError> {
        let users: Vec<UserAccount> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("id").eq(user_id)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Create or overwrite the credential record for (user, provider) in one
    /// transaction, keeping its id and creation time.
    pub async fn upsert_token_record(&self, write: TokenWrite) -> Result<CredentialRecord, AppError> {
        let client = self.get_client()?;
        let doc_id = token_doc_id(&write.user_id, write.provider);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let tx_reader = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let existing: Option<CredentialRecord> = tx_reader
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read tokens in transaction: {}", e))
            })?;

        let record = merge_tokens(existing.as_ref(), write, chrono::Utc::now());

        client
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(&doc_id)
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add tokens to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            user_id = %record.user_id,
            provider = %record.provider,
            "Credential record upserted"
        );

        Ok(record)
    }

    /// Get the credential record for a user and provider.
    pub async fn get_tokens(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<CredentialRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&token_doc_id(user_id, provider))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

impl CredentialStore for FirestoreDb {
    fn upsert_user<'a>(
        &'a self,
        profile: &'a IdentityProfile,
    ) -> BoxFuture<'a, Result<UserAccount, AppError>> {
        Box::pin(self.upsert_user_record(profile))
    }

    fn upsert_tokens(&self, write: TokenWrite) -> BoxFuture<'_, Result<CredentialRecord, AppError>> {
        Box::pin(self.upsert_token_record(write))
    }

    fn get_user_by_id<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>> {
        Box::pin(self.get_user(user_id))
    }

    fn get_user_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AppError>> {
        Box::pin(FirestoreDb::get_user_by_email(self, email))
    }

    fn get_tokens<'a>(
        &'a self,
        user_id: &'a str,
        provider: Provider,
    ) -> BoxFuture<'a, Result<Option<CredentialRecord>, AppError>> {
        Box::pin(FirestoreDb::get_tokens(self, user_id, provider))
    }
}
