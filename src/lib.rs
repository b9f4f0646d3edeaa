// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classroom-Bridge: Google Classroom data for teacher and student dashboards
//!
//! This crate provides the backend API that signs users in with Google, keeps
//! their OAuth credentials sealed at rest, and serves normalized Classroom
//! courses, rosters, coursework and submissions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{ClassroomClientFactory, ClassroomService, CredentialVault, GoogleOAuthClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub vault: CredentialVault,
    pub oauth: GoogleOAuthClient,
    pub client_factory: ClassroomClientFactory,
    pub classroom: ClassroomService,
}
