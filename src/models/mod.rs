// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod classroom;
pub mod user;

pub use classroom::{Course, CourseWork, NormalizeError, Submission, SubmissionHistoryEntry, UserProfile};
pub use user::{CredentialRecord, IdentityProfile, Provider, TokenSet, UserAccount};
