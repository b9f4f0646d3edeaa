// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Course, CourseWork, Submission, UserProfile};
use crate::services::classroom::{
    SubmissionQuery, DEFAULT_COURSEWORK_STATES, DEFAULT_COURSE_STATES,
};
use crate::services::CourseRole;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/classroom/courses", get(get_courses))
        .route("/api/classroom/courses/{course_id}/role", get(get_role))
        .route(
            "/api/classroom/courses/{course_id}/students",
            get(get_students),
        )
        .route(
            "/api/classroom/courses/{course_id}/coursework",
            get(get_coursework),
        )
        .route(
            "/api/classroom/courses/{course_id}/submissions",
            get(get_submissions),
        )
}

/// Split a comma-separated `states` value, falling back to `default` when
/// absent or empty.
pub fn parse_states(raw: Option<&str>, default: &[&str]) -> Vec<String> {
    let states: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if states.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        states
    }
}

#[derive(Deserialize)]
pub struct StatesParams {
    #[serde(default)]
    states: Option<String>,
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    // A valid session for a user the store no longer knows is not a session.
    let account = state
        .vault
        .get_user_by_id(&user.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserResponse {
        id: account.id,
        email: account.email,
        name: account.display_name,
        picture: account.picture_url,
    }))
}

// ─── Classroom ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CoursesResponse {
    pub courses: Vec<Course>,
}

/// List the caller's courses.
async fn get_courses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<StatesParams>,
) -> Result<Json<CoursesResponse>> {
    let states = parse_states(params.states.as_deref(), DEFAULT_COURSE_STATES);
    let client = state.client_factory.get_authorized_client(&user.user_id).await?;
    let courses = state.classroom.list_courses(&client, states).await?;

    tracing::debug!(user_id = %user.user_id, count = courses.len(), "Listed courses");
    Ok(Json(CoursesResponse { courses }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RoleResponse {
    pub role: CourseRole,
}

/// The caller's role in a course.
async fn get_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<RoleResponse>> {
    let client = state.client_factory.get_authorized_client(&user.user_id).await?;
    let role = state.classroom.resolve_role(&client, &course_id).await;
    Ok(Json(RoleResponse { role }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StudentsResponse {
    pub students: Vec<UserProfile>,
}

/// Course roster. Teachers only.
async fn get_students(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<StudentsResponse>> {
    let client = state.client_factory.get_authorized_client(&user.user_id).await?;
    state
        .classroom
        .require_role(&client, &course_id, CourseRole::Teacher)
        .await?;
    let students = state
        .classroom
        .list_course_students(&client, &course_id)
        .await?;
    Ok(Json(StudentsResponse { students }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CourseworkResponse {
    pub coursework: Vec<CourseWork>,
}

/// Coursework (assignments) of a course.
async fn get_coursework(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Query(params): Query<StatesParams>,
) -> Result<Json<CourseworkResponse>> {
    let states = parse_states(params.states.as_deref(), DEFAULT_COURSEWORK_STATES);
    let client = state.client_factory.get_authorized_client(&user.user_id).await?;
    let coursework = state
        .classroom
        .list_coursework(&client, &course_id, states)
        .await?;
    Ok(Json(CourseworkResponse { coursework }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionsParams {
    #[serde(default)]
    course_work_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    states: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmissionsResponse {
    pub submissions: Vec<Submission>,
}

/// Student submissions, for one coursework item or across the course.
async fn get_submissions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Query(params): Query<SubmissionsParams>,
) -> Result<Json<SubmissionsResponse>> {
    let query = SubmissionQuery {
        course_work_id: params.course_work_id.filter(|id| !id.is_empty()),
        user_id: params.user_id.filter(|id| !id.is_empty()),
        states: parse_states(params.states.as_deref(), &[]),
    };

    let client = state.client_factory.get_authorized_client(&user.user_id).await?;
    let submissions = state
        .classroom
        .list_student_submissions(&client, &course_id, &query)
        .await?;

    tracing::debug!(
        user_id = %user.user_id,
        course_id = %course_id,
        aggregated = query.course_work_id.is_none(),
        count = submissions.len(),
        "Listed submissions"
    );
    Ok(Json(SubmissionsResponse { submissions }))
}
