// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caller role detection within a course.
//!
//! Classroom has no "my role" endpoint, so the role is inferred by probing for
//! the caller's own teacher row, then student row.

use crate::services::classroom_api::{ClassroomApi, MembershipProbe};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The caller's relationship to a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseRole {
    Teacher,
    Student,
    /// No direct membership row (e.g. a domain admin or coordinator).
    Unknown,
}

impl CourseRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseRole::Teacher => "TEACHER",
            CourseRole::Student => "STUDENT",
            CourseRole::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CourseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum ProbeState {
    ProbeTeacher,
    ProbeStudent,
    Resolved(CourseRole),
}

/// Resolve the caller's role in `course_id`.
///
/// A failed probe is not an error here; it advances to the next state. A
/// successful teacher probe ends resolution without probing for a student row.
pub async fn resolve_role<C: ClassroomApi>(client: &C, course_id: &str) -> CourseRole {
    let mut state = ProbeState::ProbeTeacher;

    loop {
        state = match state {
            ProbeState::ProbeTeacher => {
                match client
                    .probe_membership(MembershipProbe::Teacher, course_id)
                    .await
                {
                    Ok(()) => ProbeState::Resolved(CourseRole::Teacher),
                    Err(e) => {
                        tracing::debug!(course_id, error = %e, "Teacher probe failed");
                        ProbeState::ProbeStudent
                    }
                }
            }
            ProbeState::ProbeStudent => {
                match client
                    .probe_membership(MembershipProbe::Student, course_id)
                    .await
                {
                    Ok(()) => ProbeState::Resolved(CourseRole::Student),
                    Err(e) => {
                        tracing::debug!(course_id, error = %e, "Student probe failed");
                        ProbeState::Resolved(CourseRole::Unknown)
                    }
                }
            }
            ProbeState::Resolved(role) => return role,
        };
    }
}
