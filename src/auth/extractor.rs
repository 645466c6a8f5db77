// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated principals.
//!
//! ```rust,ignore
//! async fn my_handler(UserOnly(user): UserOnly) -> impl IntoResponse {
//!     // user is AuthenticatedUser with Role::User
//! }
//! ```
//!
//! Only `token_use = "auth"` tokens are accepted. A PII token presented as a
//! bearer credential is rejected even though its signature is valid.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::tokens::TokenUse;
use super::{AuthError, AuthenticatedUser, Role};
use crate::state::AppState;

/// Any authenticated principal.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.tokens.verify(token)?;
        if claims.token_use() != Some(TokenUse::Auth) {
            return Err(AuthError::WrongTokenUse);
        }

        Ok(Auth(AuthenticatedUser::from_claims(claims)?))
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: Role,
) -> Result<AuthenticatedUser, AuthError> {
    let Auth(user) = Auth::from_request_parts(parts, state).await?;
    if !user.has_role(role) {
        tracing::debug!(user_id = %user.user_id, required = %role, "role check failed");
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(user)
}

/// Requires an identity owner.
pub struct UserOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for UserOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::User).await.map(UserOnly)
    }
}

/// Requires an organization principal.
pub struct OrganizationOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for OrganizationOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Organization)
            .await
            .map(OrganizationOnly)
    }
}

/// Requires the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(AdminOnly)
    }
}
