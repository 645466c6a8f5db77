// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Services
//!
//! Each service borrows [`AppState`](crate::state::AppState) for one call and
//! composes the crypto core with storage and the outbound collaborators.
//! Handlers stay thin: parse, call one service method, map the result.

pub mod consent;
pub mod error;
pub mod identity;
pub mod organizations;
pub mod profile;
pub mod vault;

pub use consent::{ConsentWorkflow, Decision, DetokenizedBundle, NewConsentRequest, ReleasedEntry};
pub use error::{ServiceError, ServiceResult};
pub use identity::{IdentityService, LoginSession, RegisteredIdentity};
pub use organizations::{
    ContactUpdate, NewOrganization, OrganizationService, RegisteredOrganization,
};
pub use profile::{ProfileRecord, ProfileService, UserProfile};
pub use vault::{DecryptedEntry, VaultService};
