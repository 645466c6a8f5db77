// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints: registration, login, recovery, profile and the current
//! principal.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{Auth, AuthenticatedUser, Role, UserOnly},
    error::ApiError,
    models::{
        LoginRequest, RecoverIdentityRequest, RecoverIdentityResponse, RegisterUserRequest,
        RegisterUserResponse, SessionResponse, UserProfileRequest, UserProfileResponse,
    },
    services::{IdentityService, ProfileService},
    state::AppState,
};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User, organization or admin id
    pub user_id: String,
    pub role: Role,
    /// Token id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl From<AuthenticatedUser> for UserMeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            role: user.role,
            session_id: user.session_id,
        }
    }
}

/// Create an identity: key pair, DID, sealed contact data and key envelope.
///
/// The recovery phrase is in this response and nowhere else.
#[utoipa::path(
    post,
    path = "/v1/users/register",
    tag = "Users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Identity created", body = RegisterUserResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid email, name or password")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterUserResponse>), ApiError> {
    let registered = IdentityService::new(&state)
        .register(&req.name, &req.email, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterUserResponse {
            user_id: registered.user_id.clone(),
            did: registered.did.clone(),
            address: registered.address.clone(),
            mnemonic: registered.mnemonic.to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Auth token issued", body = SessionResponse),
        (status = 401, description = "Authentication failed")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = IdentityService::new(&state).login(&req.email, &req.password)?;
    Ok(Json(session.into()))
}

/// Rewrap the private key under a new password using the recovery phrase.
#[utoipa::path(
    post,
    path = "/v1/users/recover",
    tag = "Users",
    request_body = RecoverIdentityRequest,
    responses(
        (status = 200, description = "Password reset", body = RecoverIdentityResponse),
        (status = 401, description = "Authentication failed"),
        (status = 422, description = "Invalid new password")
    )
)]
pub async fn recover_identity(
    State(state): State<AppState>,
    Json(req): Json<RecoverIdentityRequest>,
) -> Result<Json<RecoverIdentityResponse>, ApiError> {
    let user_id =
        IdentityService::new(&state).recover(&req.email, &req.mnemonic, &req.new_password)?;
    Ok(Json(RecoverIdentityResponse {
        user_id,
        message: "password updated".to_string(),
    }))
}

/// Get the current authenticated principal.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Principal information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<UserMeResponse> {
    Json(user.into())
}

// =============================================================================
// Profile
// =============================================================================

#[utoipa::path(
    post,
    path = "/v1/users/me/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UserProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = UserProfileResponse),
        (status = 409, description = "Profile already exists"),
        (status = 422, description = "Invalid field")
    )
)]
pub async fn create_profile(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Json(req): Json<UserProfileRequest>,
) -> Result<(StatusCode, Json<UserProfileResponse>), ApiError> {
    let record = ProfileService::new(&state).create(&user.user_id, req.into())?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    get,
    path = "/v1/users/me/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = UserProfileResponse),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn get_profile(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let record = ProfileService::new(&state).get(&user.user_id)?;
    Ok(Json(record.into()))
}

/// Omitted fields are kept; an empty string clears a field.
#[utoipa::path(
    patch,
    path = "/v1/users/me/profile",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UserProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserProfileResponse),
        (status = 404, description = "No profile yet"),
        (status = 422, description = "Invalid field")
    )
)]
pub async fn update_profile(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Json(req): Json<UserProfileRequest>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let record = ProfileService::new(&state).update(&user.user_id, req.into())?;
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_me_response_from_authenticated_user() {
        let user = AuthenticatedUser {
            user_id: "user_123".to_string(),
            role: Role::User,
            session_id: Some("jti_abc".to_string()),
            expires_at: 0,
        };

        let response: UserMeResponse = user.into();
        assert_eq!(response.user_id, "user_123");
        assert_eq!(response.role, Role::User);
        assert_eq!(response.session_id, Some("jti_abc".to_string()));
    }
}
