// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use classroom_bridge::config::Config;
use classroom_bridge::db::{FirestoreDb, MemoryStore};
use classroom_bridge::error::RemoteError;
use classroom_bridge::middleware::auth::create_jwt;
use classroom_bridge::routes::create_router;
use classroom_bridge::services::{
    ClassroomApi, ClassroomClientFactory, ClassroomService, CredentialVault, CryptoEnvelope,
    GoogleOAuthClient, ListRequest, MembershipProbe, OAuthEndpoints,
};
use classroom_bridge::AppState;
use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Envelope with a fixed all-sevens test key.
#[allow(dead_code)]
pub fn test_crypto() -> CryptoEnvelope {
    CryptoEnvelope::new(&[7u8; 32]).unwrap()
}

/// Vault over a fresh in-memory store. The store handle is returned so tests
/// can inspect what was persisted.
#[allow(dead_code)]
pub fn test_vault() -> (CredentialVault, MemoryStore) {
    let store = MemoryStore::new();
    let vault = CredentialVault::new(Arc::new(store.clone()), test_crypto());
    (vault, store)
}

/// OAuth endpoints of a fake Google server at `base`.
#[allow(dead_code)]
pub fn fake_oauth_endpoints(base: &str) -> OAuthEndpoints {
    OAuthEndpoints {
        auth_url: format!("{}/o/oauth2/v2/auth", base),
        token_url: format!("{}/token", base),
        userinfo_url: format!("{}/userinfo", base),
    }
}

/// Create a test app with in-memory storage, talking to Google at
/// `google_base` (or the real endpoints when `None`).
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    google_base: Option<&str>,
) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let (vault, store) = test_vault();
    let http = reqwest::Client::builder()
        .timeout(config.remote_call_timeout)
        .build()
        .unwrap();

    let mut oauth = GoogleOAuthClient::from_config(http.clone(), &config);
    let mut client_factory = ClassroomClientFactory::new(http.clone(), oauth.clone(), vault.clone());
    if let Some(base) = google_base {
        oauth = oauth.with_endpoints(fake_oauth_endpoints(base));
        client_factory = ClassroomClientFactory::new(http, oauth.clone(), vault.clone())
            .with_api_base(format!("{}/v1", base));
    }

    let state = Arc::new(AppState {
        classroom: ClassroomService::from_config(&config),
        config,
        vault,
        oauth,
        client_factory,
    });

    (create_router(state.clone()), state, store)
}

/// Create a test app with offline defaults.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, MemoryStore) {
    create_test_app_with(Config::default(), None)
}

/// Session JWT for `user_id` signed with the test config key.
#[allow(dead_code)]
pub fn test_jwt(user_id: &str) -> String {
    create_jwt(user_id, &Config::default().jwt_signing_key).unwrap()
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Read a whole response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ─── Fake Classroom API ──────────────────────────────────────

/// One recorded call against [`FakeClassroom`].
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    List(ListRequest, Option<String>),
    Probe(MembershipProbe, String),
}

/// Scripted [`ClassroomApi`]. Unscripted calls answer 404.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeClassroom {
    pages: HashMap<(ListRequest, Option<String>), Result<Value, RemoteError>>,
    probes: HashMap<MembershipProbe, Result<(), RemoteError>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<FakeCall>>,
}

#[allow(dead_code)]
impl FakeClassroom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request` at `page_token` with `body`.
    pub fn with_page(mut self, request: ListRequest, page_token: Option<&str>, body: Value) -> Self {
        self.pages
            .insert((request, page_token.map(str::to_string)), Ok(body));
        self
    }

    /// Fail `request` at `page_token` with `error`.
    pub fn with_page_error(
        mut self,
        request: ListRequest,
        page_token: Option<&str>,
        error: RemoteError,
    ) -> Self {
        self.pages
            .insert((request, page_token.map(str::to_string)), Err(error));
        self
    }

    pub fn with_probe(mut self, probe: MembershipProbe, result: Result<(), RemoteError>) -> Self {
        self.probes.insert(probe, result);
        self
    }

    /// Sleep this long before answering each list call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> Vec<(ListRequest, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FakeCall::List(request, token) => Some((request, token)),
                FakeCall::Probe(..) => None,
            })
            .collect()
    }

    pub fn probes(&self) -> Vec<MembershipProbe> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FakeCall::Probe(probe, _) => Some(probe),
                FakeCall::List(..) => None,
            })
            .collect()
    }
}

fn not_scripted() -> RemoteError {
    RemoteError::new(Some(404), Some("notFound".to_string()), "Requested entity was not found.")
}

impl ClassroomApi for FakeClassroom {
    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.calls.lock().unwrap().push(FakeCall::List(
            request.clone(),
            page_token.map(str::to_string),
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.pages
            .get(&(request.clone(), page_token.map(str::to_string)))
            .cloned()
            .unwrap_or_else(|| Err(not_scripted()))
    }

    async fn probe_membership(
        &self,
        probe: MembershipProbe,
        course_id: &str,
    ) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(FakeCall::Probe(probe, course_id.to_string()));

        self.probes
            .get(&probe)
            .cloned()
            .unwrap_or_else(|| Err(not_scripted()))
    }
}

// ─── Fixtures ────────────────────────────────────────────────

/// Raw submission as Google returns it.
#[allow(dead_code)]
pub fn raw_submission(id: &str, course_work_id: &str) -> Value {
    serde_json::json!({
        "id": id,
        "courseId": "c1",
        "courseWorkId": course_work_id,
        "userId": "s1",
        "state": "TURNED_IN",
        "assignedGrade": 9,
        "late": false
    })
}

/// Raw coursework item as Google returns it.
#[allow(dead_code)]
pub fn raw_coursework(id: &str) -> Value {
    serde_json::json!({
        "id": id,
        "courseId": "c1",
        "title": format!("Assignment {}", id),
        "state": "PUBLISHED",
        "workType": "ASSIGNMENT",
        "maxPoints": 10
    })
}

// ─── Fake Google server ──────────────────────────────────────

/// Local stand-in for Google's OAuth and Classroom endpoints.
///
/// Issues `access-N` tokens on each refresh and answers 401 to any access
/// token listed in `rejected_access_tokens`.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeGoogle {
    /// Refresh token to hand back on refresh, simulating rotation.
    pub rotated_refresh_token: Option<String>,
    pub rejected_access_tokens: Vec<String>,
    /// Answer refreshes with `invalid_grant`.
    pub revoked: bool,
    pub is_teacher: bool,
    pub refreshes: AtomicUsize,
    pub seen_access_tokens: Mutex<Vec<String>>,
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
}

#[allow(dead_code)]
impl FakeGoogle {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn seen_access_tokens(&self) -> Vec<String> {
        self.seen_access_tokens.lock().unwrap().clone()
    }

    /// Record the bearer token and reject it if listed.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_string();
        self.seen_access_tokens.lock().unwrap().push(token.clone());

        if token.is_empty() || self.rejected_access_tokens.contains(&token) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {
                    "code": 401,
                    "message": "Request had invalid authentication credentials.",
                    "status": "UNAUTHENTICATED"
                }})),
            ));
        }
        Ok(())
    }
}

type FakeResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn google_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {
            "code": 404,
            "message": "Requested entity was not found.",
            "status": "NOT_FOUND",
            "errors": [{"reason": "notFound"}]
        }})),
    )
}

async fn fake_token(
    State(google): State<Arc<FakeGoogle>>,
    Form(form): Form<HashMap<String, String>>,
) -> FakeResult {
    google.token_forms.lock().unwrap().push(form.clone());

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("good-code") => {
            Ok(Json(json!({
                "access_token": "access-0",
                "refresh_token": "refresh-0",
                "expires_in": 3600,
                "scope": "openid email",
                "token_type": "Bearer"
            })))
        }
        Some("refresh_token") if !google.revoked => {
            let n = google.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            let mut body = json!({
                "access_token": format!("access-{}", n),
                "expires_in": 3600,
                "token_type": "Bearer"
            });
            if let Some(rotated) = &google.rotated_refresh_token {
                body["refresh_token"] = json!(rotated);
            }
            Ok(Json(body))
        }
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })),
        )),
    }
}

async fn fake_userinfo(State(google): State<Arc<FakeGoogle>>, headers: HeaderMap) -> FakeResult {
    google.authorize(&headers)?;
    Ok(Json(json!({
        "sub": "1234",
        "email": "ada@example.edu",
        "name": "Ada Lovelace",
        "picture": "https://example.edu/ada.png"
    })))
}

async fn fake_courses(State(google): State<Arc<FakeGoogle>>, headers: HeaderMap) -> FakeResult {
    google.authorize(&headers)?;
    Ok(Json(json!({
        "courses": [
            {"id": "c1", "name": "Algebra", "courseState": "ACTIVE", "ownerId": "t1"},
            {"id": "c2", "name": "Biology", "courseState": "ACTIVE", "ownerId": "t2"}
        ]
    })))
}

async fn fake_membership(
    State(google): State<Arc<FakeGoogle>>,
    Path((_course_id, collection)): Path<(String, String)>,
    headers: HeaderMap,
) -> FakeResult {
    google.authorize(&headers)?;
    let is_member = match collection.as_str() {
        "teachers" => google.is_teacher,
        "students" => !google.is_teacher,
        _ => false,
    };
    if is_member {
        Ok(Json(json!({"userId": "me"})))
    } else {
        Err(google_not_found())
    }
}

async fn fake_students(State(google): State<Arc<FakeGoogle>>, headers: HeaderMap) -> FakeResult {
    google.authorize(&headers)?;
    Ok(Json(json!({
        "students": [
            {"userId": "s1", "profile": {"id": "s1", "name": {"fullName": "Grace Hopper"}}}
        ]
    })))
}

async fn fake_coursework(State(google): State<Arc<FakeGoogle>>, headers: HeaderMap) -> FakeResult {
    google.authorize(&headers)?;
    Ok(Json(json!({"courseWork": [raw_coursework("w1"), raw_coursework("w2")]})))
}

async fn fake_submissions(
    State(google): State<Arc<FakeGoogle>>,
    Path((_course_id, course_work_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> FakeResult {
    google.authorize(&headers)?;
    Ok(Json(json!({
        "studentSubmissions": [raw_submission(&format!("sub-{}", course_work_id), &course_work_id)]
    })))
}

/// Serve `google` on an ephemeral port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_fake_google(google: Arc<FakeGoogle>) -> String {
    let router = axum::Router::new()
        .route("/token", post(fake_token))
        .route("/userinfo", get(fake_userinfo))
        .route("/v1/courses", get(fake_courses))
        .route("/v1/courses/{course_id}/{collection}/me", get(fake_membership))
        .route("/v1/courses/{course_id}/students", get(fake_students))
        .route("/v1/courses/{course_id}/courseWork", get(fake_coursework))
        .route(
            "/v1/courses/{course_id}/courseWork/{course_work_id}/studentSubmissions",
            get(fake_submissions),
        )
        .with_state(google);
    spawn_server(router).await
}
