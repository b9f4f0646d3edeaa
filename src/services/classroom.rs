// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classroom read operations: drain, normalize, and aggregate.
//!
//! Every remote failure leaves this module translated into the closed error
//! taxonomy through `From<RemoteError> for AppError`.

use crate::config::Config;
use crate::error::{AppError, ErrorCode, ErrorEnvelope};
use crate::models::classroom::{
    normalize_course, normalize_coursework, normalize_student, normalize_submission,
    NormalizeError, RawCourse, RawCourseWork, RawStudent, RawSubmission,
};
use crate::models::{Course, CourseWork, Submission, UserProfile};
use crate::services::classroom_api::{ClassroomApi, ListRequest};
use crate::services::pagination::drain_pages;
use crate::services::roles::{self, CourseRole};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::time::Duration;

/// Default course states when the caller does not filter.
pub const DEFAULT_COURSE_STATES: &[&str] = &["ACTIVE"];
/// Default coursework states when the caller does not filter.
pub const DEFAULT_COURSEWORK_STATES: &[&str] = &["PUBLISHED"];

/// Filters for a submission listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmissionQuery {
    /// Restrict to one coursework item; otherwise every item in the course.
    pub course_work_id: Option<String>,
    /// Restrict to one student (`me` or a user id).
    pub user_id: Option<String>,
    /// Submission states; empty means all.
    #[serde(default)]
    pub states: Vec<String>,
}

/// Classroom operations against any [`ClassroomApi`].
#[derive(Debug, Clone)]
pub struct ClassroomService {
    fanout_concurrency: usize,
    aggregate_timeout: Duration,
}

impl Default for ClassroomService {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(60))
    }
}

impl ClassroomService {
    pub fn new(fanout_concurrency: usize, aggregate_timeout: Duration) -> Self {
        Self {
            fanout_concurrency: fanout_concurrency.max(1),
            aggregate_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.submission_fanout_concurrency,
            config.aggregate_timeout,
        )
    }

    /// Courses visible to the caller in the given states.
    pub async fn list_courses<C: ClassroomApi>(
        &self,
        client: &C,
        states: Vec<String>,
    ) -> Result<Vec<Course>, AppError> {
        let raw: Vec<RawCourse> = drain_pages(client, &ListRequest::Courses { states }).await?;
        raw.into_iter()
            .map(|c| normalize_course(c).map_err(AppError::from))
            .collect()
    }

    /// Roster of a course.
    pub async fn list_course_students<C: ClassroomApi>(
        &self,
        client: &C,
        course_id: &str,
    ) -> Result<Vec<UserProfile>, AppError> {
        let request = ListRequest::Students {
            course_id: course_id.to_string(),
        };
        let raw: Vec<RawStudent> = drain_pages(client, &request).await?;
        raw.into_iter()
            .map(|s| normalize_student(s).map_err(AppError::from))
            .collect()
    }

    /// Coursework of a course in the given states.
    pub async fn list_coursework<C: ClassroomApi>(
        &self,
        client: &C,
        course_id: &str,
        states: Vec<String>,
    ) -> Result<Vec<CourseWork>, AppError> {
        let request = ListRequest::CourseWork {
            course_id: course_id.to_string(),
            states,
        };
        let raw: Vec<RawCourseWork> = drain_pages(client, &request).await?;
        raw.into_iter()
            .map(|w| normalize_coursework(w).map_err(AppError::from))
            .collect()
    }

    /// Student submissions for one coursework item, or for every item in the
    /// course when `query.course_work_id` is absent.
    ///
    /// The per-item drains run with bounded concurrency and are joined in
    /// coursework order. Any failure, or the aggregate deadline expiring,
    /// fails the whole listing.
    pub async fn list_student_submissions<C: ClassroomApi>(
        &self,
        client: &C,
        course_id: &str,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>, AppError> {
        let raw = match &query.course_work_id {
            Some(course_work_id) => {
                drain_pages(client, &submissions_request(course_id, course_work_id, query)).await?
            }
            None => tokio::time::timeout(
                self.aggregate_timeout,
                self.drain_all_submissions(client, course_id, query),
            )
            .await
            .map_err(|_| {
                tracing::warn!(
                    course_id,
                    timeout_secs = self.aggregate_timeout.as_secs(),
                    "Submission aggregation deadline exceeded"
                );
                AppError::Remote(ErrorEnvelope::new(
                    ErrorCode::ProviderError,
                    504,
                    "Timed out collecting submissions from Google Classroom.",
                ))
            })??,
        };

        raw.into_iter()
            .map(|s| normalize_submission(s).map_err(AppError::from))
            .collect()
    }

    async fn drain_all_submissions<C: ClassroomApi>(
        &self,
        client: &C,
        course_id: &str,
        query: &SubmissionQuery,
    ) -> Result<Vec<RawSubmission>, AppError> {
        // Every coursework item, regardless of state.
        let coursework_request = ListRequest::CourseWork {
            course_id: course_id.to_string(),
            states: Vec::new(),
        };
        let coursework: Vec<RawCourseWork> = drain_pages(client, &coursework_request).await?;

        let requests = coursework
            .iter()
            .map(|w| {
                w.id.as_deref()
                    .map(|course_work_id| submissions_request(course_id, course_work_id, query))
                    .ok_or(NormalizeError::missing("courseWork", "id"))
            })
            .collect::<Result<Vec<ListRequest>, NormalizeError>>()?;

        tracing::debug!(
            course_id,
            items = requests.len(),
            concurrency = self.fanout_concurrency,
            "Aggregating submissions across coursework"
        );

        let per_item: Vec<Vec<RawSubmission>> = stream::iter(requests)
            .map(|request| async move { drain_pages::<C, RawSubmission>(client, &request).await })
            .buffered(self.fanout_concurrency)
            .try_collect()
            .await?;

        Ok(per_item.into_iter().flatten().collect())
    }

    pub async fn resolve_role<C: ClassroomApi>(&self, client: &C, course_id: &str) -> CourseRole {
        roles::resolve_role(client, course_id).await
    }

    /// Fail with `ROLE_REQUIRED` unless the caller holds `required` in the course.
    pub async fn require_role<C: ClassroomApi>(
        &self,
        client: &C,
        course_id: &str,
        required: CourseRole,
    ) -> Result<(), AppError> {
        let role = self.resolve_role(client, course_id).await;
        if role == required {
            Ok(())
        } else {
            tracing::info!(course_id, %role, %required, "Caller lacks required course role");
            Err(AppError::RoleRequired(required))
        }
    }
}

fn submissions_request(course_id: &str, course_work_id: &str, query: &SubmissionQuery) -> ListRequest {
    ListRequest::StudentSubmissions {
        course_id: course_id.to_string(),
        course_work_id: course_work_id.to_string(),
        user_id: query.user_id.clone(),
        states: query.states.clone(),
    }
}
