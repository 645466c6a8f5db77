// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin API endpoints.
//!
//! An admin token is obtained by exchanging the configured admin key. It
//! grants:
//! - Organization review (list, approve, suspend, ban)
//! - Audit log queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    models::{
        AdminSessionRequest, OrganizationList, OrganizationView, SessionResponse,
        UpdateOrganizationStatusRequest,
    },
    services::OrganizationService,
    state::AppState,
    storage::{AuditEvent, AuditRepository},
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD), default today.
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD), default today.
    pub end_date: Option<String>,
    /// Filter by principal (user, organization or `admin`).
    pub principal_id: Option<String>,
    /// Filter by event type, e.g. `consent_approved`.
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Total count before limit/offset.
    pub total: usize,
    pub has_more: bool,
}

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Handlers
// ============================================================================

/// Exchange the admin key for an admin token.
#[utoipa::path(
    post,
    path = "/v1/admin/session",
    tag = "Admin",
    request_body = AdminSessionRequest,
    responses(
        (status = 200, description = "Admin token issued", body = SessionResponse),
        (status = 401, description = "Wrong admin key"),
        (status = 403, description = "Admin API disabled")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<AdminSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = OrganizationService::new(&state).admin_session(&req.api_key)?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    get,
    path = "/v1/admin/organizations",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All organizations", body = OrganizationList),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_organizations(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<OrganizationList>, ApiError> {
    let organizations: Vec<OrganizationView> = OrganizationService::new(&state)
        .list()?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = organizations.len();
    Ok(Json(OrganizationList {
        organizations,
        total,
    }))
}

/// Move an organization along its lifecycle.
///
/// Pending organizations can be approved, rejected, suspended or banned.
/// Approved and suspended swap freely; rejected and banned are final.
#[utoipa::path(
    put,
    path = "/v1/admin/organizations/{org_id}/status",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("org_id" = String, Path, description = "Organization id")),
    request_body = UpdateOrganizationStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrganizationView),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Unknown organization"),
        (status = 409, description = "Transition not allowed")
    )
)]
pub async fn update_organization_status(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Json(req): Json<UpdateOrganizationStatusRequest>,
) -> Result<Json<OrganizationView>, ApiError> {
    let org = OrganizationService::new(&state)
        .set_status(&admin, &org_id, req.status)
        .await?;
    Ok(Json(org.into()))
}

/// Query audit logs with optional filters.
#[utoipa::path(
    get,
    path = "/v1/admin/audit/events",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_logs(
    AdminOnly(_admin): AdminOnly,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let start_date = params.start_date.as_deref().unwrap_or(&today);
    let end_date = params.end_date.as_deref().unwrap_or(&today);

    NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid start_date format. Use YYYY-MM-DD."))?;
    NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid end_date format. Use YYYY-MM-DD."))?;

    let mut events = AuditRepository::new(&state.store)
        .read_events_range(start_date, end_date)
        .map_err(|e| ApiError::internal(&e))?;

    if let Some(principal_id) = &params.principal_id {
        events.retain(|e| e.principal_id.as_deref() == Some(principal_id.as_str()));
    }
    if let Some(event_type) = &params.event_type {
        events.retain(|e| {
            serde_json::to_value(&e.event_type)
                .ok()
                .and_then(|v| v.as_str().map(|s| s == event_type))
                .unwrap_or(false)
        });
    }
    if let Some(resource_type) = &params.resource_type {
        events.retain(|e| e.resource_type.as_deref() == Some(resource_type.as_str()));
    }
    if let Some(resource_id) = &params.resource_id {
        events.retain(|e| e.resource_id.as_deref() == Some(resource_id.as_str()));
    }

    let total = events.len();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let has_more = offset.saturating_add(limit) < total;
    let events = events.into_iter().skip(offset).take(limit).collect();

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}
