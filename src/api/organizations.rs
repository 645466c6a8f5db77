// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Organization endpoints: registration, sessions and the requester side of
//! the consent workflow.
//!
//! Everything past login requires an organization token, and the service
//! layer re-checks that the organization is still approved on every call.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::OrganizationOnly,
    error::ApiError,
    models::{
        ApiKeySessionRequest, ConsentRequestList, ConsentRequestView, CreateConsentRequest,
        DetokenizeRequest, DetokenizeResponse, LoginRequest, OrganizationView,
        RegisterOrganizationRequest, RegisterOrganizationResponse, ReleasedDataItem,
        ReleasedDataResponse, SessionResponse, UpdateOrganizationRequest,
    },
    services::{ConsentWorkflow, NewConsentRequest, NewOrganization, OrganizationService},
    state::AppState,
};

// =============================================================================
// Registration and Sessions
// =============================================================================

/// Register an organization. It starts `un_approved` until an admin approves it.
#[utoipa::path(
    post,
    path = "/v1/organizations/register",
    tag = "Organizations",
    request_body = RegisterOrganizationRequest,
    responses(
        (status = 201, description = "Organization registered", body = RegisterOrganizationResponse),
        (status = 409, description = "Name or email already registered"),
        (status = 422, description = "Missing or invalid fields")
    )
)]
pub async fn register_organization(
    State(state): State<AppState>,
    Json(req): Json<RegisterOrganizationRequest>,
) -> Result<(StatusCode, Json<RegisterOrganizationResponse>), ApiError> {
    let registered = OrganizationService::new(&state).register(NewOrganization {
        name: req.organization_name,
        contact_name: req.contact_name,
        contact_email: req.contact_email,
        password: req.password,
        document_type: req.document_type,
        document_reference: req.document_reference,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterOrganizationResponse {
            organization: registered.org.into(),
            api_key: registered.api_key,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/organizations/login",
    tag = "Organizations",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Auth token issued", body = SessionResponse),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Organization is not approved")
    )
)]
pub async fn login_organization(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = OrganizationService::new(&state).login(&req.email, &req.password)?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/v1/organizations/session",
    tag = "Organizations",
    request_body = ApiKeySessionRequest,
    responses(
        (status = 200, description = "Auth token issued", body = SessionResponse),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Organization is not approved")
    )
)]
pub async fn api_key_session(
    State(state): State<AppState>,
    Json(req): Json<ApiKeySessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = OrganizationService::new(&state).api_key_session(&req.org_id, &req.api_key)?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    get,
    path = "/v1/organizations/me",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Calling organization", body = OrganizationView),
        (status = 403, description = "Not an organization token")
    )
)]
pub async fn get_current_organization(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
) -> Result<Json<OrganizationView>, ApiError> {
    let org = OrganizationService::new(&state).get(&org.user_id)?;
    Ok(Json(org.into()))
}

/// Change the contact name or email. The email is also the login email.
#[utoipa::path(
    put,
    path = "/v1/organizations/me",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = OrganizationView),
        (status = 403, description = "Not an approved organization"),
        (status = 409, description = "Email belongs to another organization"),
        (status = 422, description = "Invalid contact name or email")
    )
)]
pub async fn update_current_organization(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationView>, ApiError> {
    let org = OrganizationService::new(&state).update_contact(&org.user_id, req.into())?;
    Ok(Json(org.into()))
}

// =============================================================================
// Consent Requests
// =============================================================================

/// Ask an owner for access to one or more data types.
///
/// The response carries the PII token with the owner's ciphertexts.
#[utoipa::path(
    post,
    path = "/v1/organizations/requests",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    request_body = CreateConsentRequest,
    responses(
        (status = 201, description = "Consent request created", body = ConsentRequestView),
        (status = 403, description = "Organization is not approved"),
        (status = 404, description = "Unknown owner"),
        (status = 422, description = "Invalid data types, purpose or ttl")
    )
)]
pub async fn create_consent_request(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
    Json(req): Json<CreateConsentRequest>,
) -> Result<(StatusCode, Json<ConsentRequestView>), ApiError> {
    let data_types = req.all_data_types();
    let request = ConsentWorkflow::new(&state)
        .create_request(
            &org.user_id,
            NewConsentRequest {
                owner: req.owner,
                data_types,
                purpose: req.purpose,
                ttl_minutes: req.ttl_minutes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConsentRequestView::for_requester(request)),
    ))
}

/// Requests created by the caller, newest first.
#[utoipa::path(
    get,
    path = "/v1/organizations/requests",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Consent requests", body = ConsentRequestList),
        (status = 403, description = "Not an organization token")
    )
)]
pub async fn list_consent_requests(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
) -> Result<Json<ConsentRequestList>, ApiError> {
    let requests = ConsentWorkflow::new(&state).list_for_requester(&org.user_id)?;
    Ok(Json(ConsentRequestList::new(
        requests
            .into_iter()
            .map(ConsentRequestView::for_requester)
            .collect(),
    )))
}

/// Verify a PII token and return its contents. The entries stay encrypted
/// for the owner.
#[utoipa::path(
    post,
    path = "/v1/organizations/detokenize",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    request_body = DetokenizeRequest,
    responses(
        (status = 200, description = "Token contents", body = DetokenizeResponse),
        (status = 401, description = "Token invalid or expired"),
        (status = 403, description = "Token issued to another organization")
    )
)]
pub async fn detokenize(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
    Json(req): Json<DetokenizeRequest>,
) -> Result<Json<DetokenizeResponse>, ApiError> {
    let bundle = ConsentWorkflow::new(&state).detokenize(&org.user_id, &req.token)?;
    Ok(Json(bundle.into()))
}

/// Plaintext released by an approved request.
#[utoipa::path(
    get,
    path = "/v1/organizations/requests/{request_id}/data",
    tag = "Organizations",
    security(("bearer_auth" = [])),
    params(("request_id" = String, Path, description = "Consent request id")),
    responses(
        (status = 200, description = "Released data", body = ReleasedDataResponse),
        (status = 403, description = "Not the requester, or organization not approved"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request is not approved")
    )
)]
pub async fn get_released_data(
    OrganizationOnly(org): OrganizationOnly,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<ReleasedDataResponse>, ApiError> {
    let released = ConsentWorkflow::new(&state).read_released(&request_id, &org.user_id)?;

    let entries = released
        .into_iter()
        .map(|entry| {
            let data = std::str::from_utf8(&entry.data)
                .map_err(|_| {
                    ApiError::bad_request(format!("entry {} is not valid UTF-8", entry.data_type))
                })?
                .to_string();
            Ok(ReleasedDataItem {
                data_type: entry.data_type,
                data,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(ReleasedDataResponse {
        request_id,
        entries,
    }))
}
