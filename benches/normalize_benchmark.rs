use classroom_bridge::models::classroom::{normalize_submission, RawSubmission};
use classroom_bridge::services::{ListEndpoint, Page};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use std::hint::black_box;

/// One submissions page shaped like a large class: 200 submissions, each with
/// a few history entries.
fn submissions_page() -> Value {
    let submissions: Vec<Value> = (0..200)
        .map(|i| {
            json!({
                "id": format!("sub-{}", i),
                "courseId": "c1",
                "courseWorkId": "w1",
                "userId": format!("student-{}", i),
                "state": "RETURNED",
                "assignedGrade": 8.5,
                "draftGrade": 9,
                "late": i % 7 == 0,
                "updateTime": "2024-03-16T09:00:00.000Z",
                "submissionHistory": [
                    {"stateHistory": {"state": "CREATED", "stateTimestamp": "2024-03-01T10:00:00Z"}},
                    {"stateHistory": {"state": "TURNED_IN", "stateTimestamp": "2024-03-14T22:10:00Z"}},
                    {"gradeHistory": {"pointsEarned": 8.5, "gradeTimestamp": "2024-03-15T12:00:00Z"}},
                    {"stateHistory": {"state": "RETURNED", "stateTimestamp": "2024-03-16T09:00:00Z"}}
                ]
            })
        })
        .collect();

    json!({"studentSubmissions": submissions, "nextPageToken": "next"})
}

fn benchmark_submission_page(c: &mut Criterion) {
    let raw = submissions_page();

    let mut group = c.benchmark_group("submission_page");

    group.bench_function("parse_page", |b| {
        b.iter(|| {
            let page: Page<RawSubmission> = ListEndpoint::StudentSubmissions
                .parse_page(black_box(raw.clone()))
                .unwrap();
            page
        })
    });

    group.bench_function("parse_and_normalize", |b| {
        b.iter(|| {
            let page: Page<RawSubmission> = ListEndpoint::StudentSubmissions
                .parse_page(black_box(raw.clone()))
                .unwrap();
            page.items
                .into_iter()
                .map(normalize_submission)
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_submission_page);
criterion_main!(benches);
