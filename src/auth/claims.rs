// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticated principal of a request.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use super::tokens::TokenClaims;
use super::AuthError;

/// Authenticated principal extracted from a verified auth token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// User id, organization id, or `admin`
    pub user_id: String,

    pub role: Role,

    /// Token id (`jti`), useful for log correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Build from verified claims. A missing or unknown role is rejected
    /// rather than defaulted.
    pub fn from_claims(claims: TokenClaims) -> Result<Self, AuthError> {
        let role = claims.role().ok_or(AuthError::InvalidToken)?;
        Ok(Self {
            user_id: claims.sub,
            role,
            session_id: Some(claims.jti),
            expires_at: claims.exp,
        })
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}
