// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner vault endpoints. Both require the owner's password to unlock the key.

use axum::{extract::State, Json};

use crate::{
    auth::UserOnly,
    error::ApiError,
    models::{
        QueryVaultRequest, SaveVaultEntryRequest, VaultDataItem, VaultDataResponse,
        VaultEntryResponse,
    },
    services::VaultService,
    state::AppState,
};

/// Encrypt and store one entry, replacing any entry of the same type.
#[utoipa::path(
    put,
    path = "/v1/vault/entries",
    tag = "Vault",
    security(("bearer_auth" = [])),
    request_body = SaveVaultEntryRequest,
    responses(
        (status = 200, description = "Entry stored", body = VaultEntryResponse),
        (status = 401, description = "Not authenticated or wrong password"),
        (status = 403, description = "Not a user token"),
        (status = 422, description = "Invalid data type")
    )
)]
pub async fn save_entry(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Json(req): Json<SaveVaultEntryRequest>,
) -> Result<Json<VaultEntryResponse>, ApiError> {
    let entry = VaultService::new(&state).save_entry(
        &user.user_id,
        &req.password,
        &req.data_type,
        req.data.as_bytes(),
        req.content_hash,
    )?;
    Ok(Json(entry.into()))
}

/// Decrypt the caller's entries.
#[utoipa::path(
    post,
    path = "/v1/vault/entries/query",
    tag = "Vault",
    security(("bearer_auth" = [])),
    request_body = QueryVaultRequest,
    responses(
        (status = 200, description = "Decrypted entries", body = VaultDataResponse),
        (status = 400, description = "Stored entry is not valid UTF-8"),
        (status = 401, description = "Not authenticated or wrong password"),
        (status = 403, description = "Not a user token")
    )
)]
pub async fn query_entries(
    UserOnly(user): UserOnly,
    State(state): State<AppState>,
    Json(req): Json<QueryVaultRequest>,
) -> Result<Json<VaultDataResponse>, ApiError> {
    let decrypted =
        VaultService::new(&state).get_user_data(&user.user_id, &req.password, &req.data_types)?;

    let entries = decrypted
        .into_iter()
        .map(|entry| {
            let data = std::str::from_utf8(&entry.data)
                .map_err(|_| {
                    ApiError::bad_request(format!("entry {} is not valid UTF-8", entry.data_type))
                })?
                .to_string();
            Ok(VaultDataItem {
                data_type: entry.data_type,
                data,
                content_hash: entry.content_hash,
                updated_at: entry.updated_at,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(VaultDataResponse { entries }))
}
