// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner-side consent endpoints: inbox and decisions.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    auth::UserOnly,
    error::ApiError,
    models::{ConsentRequestList, ConsentRequestView, DecideConsentRequest, DecisionKind},
    services::{ConsentWorkflow, Decision},
    state::AppState,
};

/// Requests addressed to the caller, newest first.
#[utoipa::path(
    get,
    path = "/v1/consent/requests",
    tag = "Consent",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Consent requests", body = ConsentRequestList),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not a user token")
    )
)]
pub async fn list_requests(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
) -> Result<Json<ConsentRequestList>, ApiError> {
    let requests = ConsentWorkflow::new(&state).list_for_owner(&user.user_id)?;
    Ok(Json(ConsentRequestList::new(
        requests.into_iter().map(ConsentRequestView::for_owner).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/v1/consent/requests/{request_id}",
    tag = "Consent",
    security(("bearer_auth" = [])),
    params(("request_id" = String, Path, description = "Consent request id")),
    responses(
        (status = 200, description = "Consent request", body = ConsentRequestView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown request")
    )
)]
pub async fn get_request(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<ConsentRequestView>, ApiError> {
    let request = ConsentWorkflow::new(&state).get_for_owner(&request_id, &user.user_id)?;
    Ok(Json(ConsentRequestView::for_owner(request)))
}

/// Approve or reject a pending request.
///
/// Approval needs the owner's password to decrypt the requested entries.
#[utoipa::path(
    post,
    path = "/v1/consent/requests/{request_id}/decision",
    tag = "Consent",
    security(("bearer_auth" = [])),
    params(("request_id" = String, Path, description = "Consent request id")),
    request_body = DecideConsentRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ConsentRequestView),
        (status = 401, description = "Not authenticated or wrong password"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request already decided"),
        (status = 422, description = "Password missing for approval")
    )
)]
pub async fn decide_request(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(req): Json<DecideConsentRequest>,
) -> Result<Json<ConsentRequestView>, ApiError> {
    let decision = match req.decision {
        DecisionKind::Approve => Decision::Approve {
            password: req
                .password
                .ok_or_else(|| ApiError::unprocessable("password is required to approve"))?,
        },
        DecisionKind::Reject => Decision::Reject { reason: req.reason },
    };

    let request = ConsentWorkflow::new(&state)
        .decide(&request_id, &user.user_id, decision)
        .await?;
    Ok(Json(ConsentRequestView::for_owner(request)))
}
