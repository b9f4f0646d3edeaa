// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod classroom;
pub mod classroom_api;
pub mod crypto;
pub mod google_auth;
pub mod pagination;
pub mod roles;
pub mod vault;

pub use classroom::{ClassroomService, SubmissionQuery};
pub use classroom_api::{ClassroomApi, ClassroomClient, ListRequest, MembershipProbe};
pub use crypto::{CryptoEnvelope, CryptoError, SealedSecret};
pub use google_auth::{
    ClassroomClientFactory, GoogleOAuthClient, OAuthEndpoints, TokenRotationHook, TokenSession,
    VaultRotationHook,
};
pub use pagination::{drain_pages, ListEndpoint, Page};
pub use roles::{resolve_role, CourseRole};
pub use vault::CredentialVault;
