// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course role detection by membership probes.

use classroom_bridge::error::RemoteError;
use classroom_bridge::services::{resolve_role, CourseRole, MembershipProbe};

mod common;
use common::FakeClassroom;

fn forbidden() -> RemoteError {
    RemoteError::new(Some(403), Some("forbidden".to_string()), "The caller does not have permission")
}

#[tokio::test]
async fn test_teacher_probe_short_circuits() {
    let fake = FakeClassroom::new()
        .with_probe(MembershipProbe::Teacher, Ok(()))
        .with_probe(MembershipProbe::Student, Ok(()));

    assert_eq!(resolve_role(&fake, "c1").await, CourseRole::Teacher);
    assert_eq!(fake.probes(), vec![MembershipProbe::Teacher]);
}

#[tokio::test]
async fn test_student_when_teacher_probe_fails() {
    let fake = FakeClassroom::new()
        .with_probe(MembershipProbe::Teacher, Err(forbidden()))
        .with_probe(MembershipProbe::Student, Ok(()));

    assert_eq!(resolve_role(&fake, "c1").await, CourseRole::Student);
    assert_eq!(
        fake.probes(),
        vec![MembershipProbe::Teacher, MembershipProbe::Student]
    );
}

#[tokio::test]
async fn test_unknown_when_both_probes_fail() {
    // Unscripted probes answer 404.
    let fake = FakeClassroom::new();

    assert_eq!(resolve_role(&fake, "c1").await, CourseRole::Unknown);
    assert_eq!(fake.probes().len(), 2);
}

#[test]
fn test_role_serializes_upper_case() {
    assert_eq!(serde_json::to_value(CourseRole::Teacher).unwrap(), "TEACHER");
    assert_eq!(serde_json::to_value(CourseRole::Unknown).unwrap(), "UNKNOWN");
}
