// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Classroom REST client.
//!
//! Handles:
//! - One page of any list endpoint, addressed by a [`ListRequest`]
//! - Membership existence checks for the caller (`teachers/me`, `students/me`)
//! - Bearer auth with a single retry after a forced token refresh on 401
//! - Rate limit detection (429 is logged, then surfaced as a provider error)

use crate::error::RemoteError;
use crate::services::google_auth::TokenSession;
use crate::services::pagination::ListEndpoint;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Production Classroom API base URL.
pub const CLASSROOM_API_BASE: &str = "https://classroom.googleapis.com/v1";

/// One list call against the Classroom API, minus the page token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListRequest {
    /// Courses visible to the caller, filtered by course state.
    Courses { states: Vec<String> },
    /// Roster of a course.
    Students { course_id: String },
    /// Coursework of a course. An empty state list means no filter.
    CourseWork {
        course_id: String,
        states: Vec<String>,
    },
    /// Submissions for one coursework item.
    StudentSubmissions {
        course_id: String,
        course_work_id: String,
        user_id: Option<String>,
        states: Vec<String>,
    },
}

impl ListRequest {
    pub fn endpoint(&self) -> ListEndpoint {
        match self {
            ListRequest::Courses { .. } => ListEndpoint::Courses,
            ListRequest::Students { .. } => ListEndpoint::Students,
            ListRequest::CourseWork { .. } => ListEndpoint::CourseWork,
            ListRequest::StudentSubmissions { .. } => ListEndpoint::StudentSubmissions,
        }
    }

    /// Path relative to the API base, with ids percent-encoded.
    pub fn path(&self) -> String {
        match self {
            ListRequest::Courses { .. } => "courses".to_string(),
            ListRequest::Students { course_id } => {
                format!("courses/{}/students", urlencoding::encode(course_id))
            }
            ListRequest::CourseWork { course_id, .. } => {
                format!("courses/{}/courseWork", urlencoding::encode(course_id))
            }
            ListRequest::StudentSubmissions {
                course_id,
                course_work_id,
                ..
            } => format!(
                "courses/{}/courseWork/{}/studentSubmissions",
                urlencoding::encode(course_id),
                urlencoding::encode(course_work_id)
            ),
        }
    }

    /// Server-side filters. Repeated keys encode list parameters.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            ListRequest::Courses { states } => {
                states.iter().map(|s| ("courseStates", s.clone())).collect()
            }
            ListRequest::Students { .. } => Vec::new(),
            ListRequest::CourseWork { states, .. } => states
                .iter()
                .map(|s| ("courseWorkStates", s.clone()))
                .collect(),
            ListRequest::StudentSubmissions { user_id, states, .. } => {
                let mut query: Vec<(&'static str, String)> =
                    states.iter().map(|s| ("states", s.clone())).collect();
                if let Some(user_id) = user_id {
                    query.push(("userId", user_id.clone()));
                }
                query
            }
        }
    }
}

/// Membership row the caller may hold in a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipProbe {
    Teacher,
    Student,
}

impl MembershipProbe {
    pub fn path(&self, course_id: &str) -> String {
        let collection = match self {
            MembershipProbe::Teacher => "teachers",
            MembershipProbe::Student => "students",
        };
        format!("courses/{}/{}/me", urlencoding::encode(course_id), collection)
    }
}

/// Calls the Classroom service layer needs from an authorized client.
pub trait ClassroomApi: Send + Sync {
    /// Fetch one raw page of `request`, continuing from `page_token` if given.
    fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Succeeds if the caller holds the probed membership in the course.
    fn probe_membership(
        &self,
        probe: MembershipProbe,
        course_id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Classroom API client authorized as one user.
#[derive(Clone)]
pub struct ClassroomClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<TokenSession>,
}

impl ClassroomClient {
    pub fn new(http: reqwest::Client, base_url: String, session: Arc<TokenSession>) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    /// Id of the user this client acts for.
    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    /// GET a path with bearer auth. A 401 forces one token refresh and retry.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, RemoteError> {
        let url = format!("{}/{}", self.base_url, path);

        let access_token = self.session.access_token().await?;
        let response = self.send(&url, query, &access_token).await?;

        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(
            user_id = %self.user_id(),
            "Access token rejected, refreshing and retrying once"
        );
        let access_token = self.session.force_refresh().await?;
        self.send(&url, query, &access_token).await
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<reqwest::Response, RemoteError> {
        self.http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| RemoteError::transport(&e))
    }
}

impl ClassroomApi for ClassroomClient {
    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let mut query = request.query();
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self.get(&request.path(), &query).await?;
        check_response_json(response).await
    }

    async fn probe_membership(
        &self,
        probe: MembershipProbe,
        course_id: &str,
    ) -> Result<(), RemoteError> {
        let response = self.get(&probe.path(course_id), &[]).await?;
        check_response(response).await
    }
}

/// Check response status and return the raw error if not successful.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<(), RemoteError> {
    if response.status().is_success() {
        return Ok(());
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    if status == 429 {
        tracing::warn!("Google API rate limit hit (429)");
    }

    Err(RemoteError::from_response(status, &body))
}

/// Check response and parse JSON body.
pub(crate) async fn check_response_json<T: for<'de> serde::Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if status == 429 {
            tracing::warn!("Google API rate limit hit (429)");
        }

        return Err(RemoteError::from_response(status, &body));
    }

    response.json().await.map_err(|e| {
        if e.is_timeout() {
            RemoteError::transport(&e)
        } else {
            RemoteError::malformed(format!("JSON parse error: {}", e))
        }
    })
}
