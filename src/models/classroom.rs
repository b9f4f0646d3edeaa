// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Classroom resources: raw API shapes and the stable schema served
//! to dashboards.
//!
//! Raw types accept whatever subset of fields Google returns. The
//! `normalize_*` functions are pure and total apart from a missing `id`.

use chrono::{Duration, Months, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A required identifier was absent from a raw record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} record is missing required field `{field}`")]
pub struct NormalizeError {
    pub entity: &'static str,
    pub field: &'static str,
}

impl NormalizeError {
    pub(crate) fn missing(entity: &'static str, field: &'static str) -> Self {
        Self { entity, field }
    }
}

impl From<NormalizeError> for crate::error::AppError {
    fn from(err: NormalizeError) -> Self {
        crate::error::AppError::Remote(crate::error::ErrorEnvelope::new(
            crate::error::ErrorCode::ProviderError,
            502,
            err.to_string(),
        ))
    }
}

/// Numbers only: strings, booleans and nulls become `None`.
fn numeric(value: Option<&Value>) -> Option<f64> {
    value.filter(|v| v.is_number()).and_then(Value::as_f64)
}

// ─── Raw API shapes ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCourse {
    pub id: Option<String>,
    pub name: Option<String>,
    pub section: Option<String>,
    pub course_state: Option<String>,
    pub owner_id: Option<String>,
    pub alternate_link: Option<String>,
    pub room: Option<String>,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawName {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUserProfile {
    pub id: Option<String>,
    pub email_address: Option<String>,
    pub name: Option<RawName>,
    pub photo_url: Option<String>,
}

/// Roster entry (`courses.students.list`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStudent {
    pub user_id: Option<String>,
    pub profile: Option<RawUserProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimeOfDay {
    pub hours: Option<i64>,
    pub minutes: Option<i64>,
    pub seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCourseWork {
    pub id: Option<String>,
    pub course_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<RawDate>,
    pub due_time: Option<RawTimeOfDay>,
    pub max_points: Option<Value>,
    pub state: Option<String>,
    pub work_type: Option<String>,
    pub alternate_link: Option<String>,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStateHistory {
    pub state: Option<String>,
    pub state_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradeHistory {
    pub points_earned: Option<Value>,
    pub grade_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmissionHistory {
    pub state_history: Option<RawStateHistory>,
    pub grade_history: Option<RawGradeHistory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    pub id: Option<String>,
    pub course_id: Option<String>,
    pub course_work_id: Option<String>,
    pub user_id: Option<String>,
    pub state: Option<String>,
    pub assigned_grade: Option<Value>,
    pub draft_grade: Option<Value>,
    pub late: Option<Value>,
    pub update_time: Option<String>,
    pub submission_history: Option<Vec<RawSubmissionHistory>>,
}

// ─── Normalized schema ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    pub state: String,
    pub owner_id: String,
    pub alternate_link: Option<String>,
    pub room: Option<String>,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CourseWork {
    pub id: String,
    pub course_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// UTC instant, RFC 3339 with milliseconds (`2024-03-15T14:30:00.000Z`)
    pub due_date: Option<String>,
    pub max_points: Option<f64>,
    pub state: String,
    pub work_type: String,
    pub alternate_link: Option<String>,
    pub creation_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmissionHistoryEntry {
    pub state: Option<String>,
    pub grade: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Submission {
    pub id: String,
    pub course_id: String,
    pub course_work_id: String,
    pub user_id: String,
    pub state: String,
    pub assigned_grade: Option<f64>,
    pub draft_grade: Option<f64>,
    pub late: Option<bool>,
    pub update_time: Option<String>,
    pub history: Vec<SubmissionHistoryEntry>,
}

// ─── Normalizers ─────────────────────────────────────────────

pub fn normalize_course(raw: RawCourse) -> Result<Course, NormalizeError> {
    Ok(Course {
        id: raw.id.ok_or(NormalizeError::missing("course", "id"))?,
        name: raw.name.unwrap_or_default(),
        section: raw.section,
        state: raw
            .course_state
            .unwrap_or_else(|| "COURSE_STATE_UNSPECIFIED".to_string()),
        owner_id: raw.owner_id.unwrap_or_default(),
        alternate_link: raw.alternate_link,
        room: raw.room,
        creation_time: raw.creation_time,
        update_time: raw.update_time,
    })
}

pub fn normalize_user_profile(raw: RawUserProfile) -> Result<UserProfile, NormalizeError> {
    Ok(UserProfile {
        id: raw.id.ok_or(NormalizeError::missing("userProfile", "id"))?,
        email: raw.email_address,
        display_name: raw.name.and_then(|n| n.full_name),
        photo_url: raw.photo_url,
    })
}

/// Roster entries carry the profile nested; `userId` stands in for a
/// profile without an id.
pub fn normalize_student(raw: RawStudent) -> Result<UserProfile, NormalizeError> {
    let mut profile = raw.profile.unwrap_or_default();
    if profile.id.is_none() {
        profile.id = raw.user_id;
    }
    normalize_user_profile(profile).map_err(|_| NormalizeError::missing("student", "userId"))
}

/// Combine Google's split `dueDate`/`dueTime` into one UTC instant.
///
/// Missing or zero date fields count as 1 and missing time fields as zero.
/// Month and day are offsets from January 1st, so an out-of-range date rolls
/// forward (`2024-04-31` is `2024-05-01`) and `24:00:00` is the next midnight.
/// `None` only when the result leaves chrono's range.
pub fn due_instant(date: Option<&RawDate>, time: Option<&RawTimeOfDay>) -> Option<String> {
    let date = date?;
    let month = date.month.filter(|m| *m > 0).unwrap_or(1);
    let day_of_month = date.day.filter(|d| *d > 0).unwrap_or(1);
    let day = NaiveDate::from_ymd_opt(date.year.unwrap_or(1970), 1, 1)?
        .checked_add_months(Months::new(month - 1))?
        .checked_add_signed(Duration::try_days(i64::from(day_of_month - 1))?)?;

    let (hours, minutes, seconds) = time
        .map(|t| {
            (
                t.hours.unwrap_or(0),
                t.minutes.unwrap_or(0),
                t.seconds.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0, 0));

    let offset = Duration::try_hours(hours)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(seconds)?)?;
    let instant = day.and_hms_opt(0, 0, 0)?.checked_add_signed(offset)?;

    Some(
        instant
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

pub fn normalize_coursework(raw: RawCourseWork) -> Result<CourseWork, NormalizeError> {
    let due_date = due_instant(raw.due_date.as_ref(), raw.due_time.as_ref());

    Ok(CourseWork {
        id: raw.id.ok_or(NormalizeError::missing("courseWork", "id"))?,
        course_id: raw.course_id.unwrap_or_default(),
        title: raw.title,
        description: raw.description,
        due_date,
        max_points: numeric(raw.max_points.as_ref()),
        state: raw
            .state
            .unwrap_or_else(|| "COURSE_WORK_STATE_UNSPECIFIED".to_string()),
        work_type: raw
            .work_type
            .unwrap_or_else(|| "COURSE_WORK_TYPE_UNSPECIFIED".to_string()),
        alternate_link: raw.alternate_link,
        creation_time: raw.creation_time,
        update_time: raw.update_time,
    })
}

fn condense_history(entry: RawSubmissionHistory) -> SubmissionHistoryEntry {
    let (state, state_timestamp) = entry
        .state_history
        .map(|s| (s.state, s.state_timestamp))
        .unwrap_or_default();
    let (grade, grade_timestamp) = entry
        .grade_history
        .map(|g| (numeric(g.points_earned.as_ref()), g.grade_timestamp))
        .unwrap_or_default();

    SubmissionHistoryEntry {
        state,
        grade,
        timestamp: state_timestamp.or(grade_timestamp),
    }
}

pub fn normalize_submission(raw: RawSubmission) -> Result<Submission, NormalizeError> {
    Ok(Submission {
        id: raw.id.ok_or(NormalizeError::missing("studentSubmission", "id"))?,
        course_id: raw.course_id.unwrap_or_default(),
        course_work_id: raw.course_work_id.unwrap_or_default(),
        user_id: raw.user_id.unwrap_or_default(),
        state: raw
            .state
            .unwrap_or_else(|| "SUBMISSION_STATE_UNSPECIFIED".to_string()),
        assigned_grade: numeric(raw.assigned_grade.as_ref()),
        draft_grade: numeric(raw.draft_grade.as_ref()),
        late: raw.late.as_ref().and_then(Value::as_bool),
        update_time: raw.update_time,
        history: raw
            .submission_history
            .unwrap_or_default()
            .into_iter()
            .map(condense_history)
            .collect(),
    })
}
