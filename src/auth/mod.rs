// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! ## Auth Flow
//!
//! 1. A user or organization logs in with email and password
//! 2. The platform issues an ES256 auth token (`token_use = "auth"`, `role`)
//! 3. Clients send `Authorization: Bearer <token>`
//! 4. The extractors verify signature, issuer and expiry, then check the role
//!
//! The same [`CapabilityTokenService`] also issues PII tokens for the consent
//! workflow; those are never accepted as bearer credentials.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OrganizationOnly, UserOnly};
pub use roles::Role;
pub use tokens::{CapabilityTokenService, TokenClaims, TokenError, TokenUse};
