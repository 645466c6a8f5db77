// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner-side vault operations.

use serde_json::json;
use zeroize::Zeroizing;

use super::error::{ServiceError, ServiceResult};
use super::identity::IdentityService;
use crate::audit_log;
use crate::crypto::{vault_cipher, IdentityKeyManager};
use crate::state::AppState;
use crate::storage::{
    AuditEvent, AuditEventType, OwnershipEnforcer, VaultEntry, VaultEntryStatus, VaultRepository,
};

pub const MAX_DATA_TYPE_LEN: usize = 64;

/// Validate and upper-case a data type name.
pub fn normalize_data_type(raw: &str) -> ServiceResult<String> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_DATA_TYPE_LEN
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ServiceError::Validation(format!(
            "data type must be 1-{MAX_DATA_TYPE_LEN} characters of A-Z, 0-9, '_' or '-'"
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

pub fn normalize_data_types(raw: &[String]) -> ServiceResult<Vec<String>> {
    let mut types = raw
        .iter()
        .map(|t| normalize_data_type(t))
        .collect::<ServiceResult<Vec<_>>>()?;
    types.sort();
    types.dedup();
    Ok(types)
}

/// A decrypted entry, held only for the duration of one response.
pub struct DecryptedEntry {
    pub data_type: String,
    pub data: Zeroizing<Vec<u8>>,
    pub content_hash: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Debug for DecryptedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedEntry")
            .field("data_type", &self.data_type)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

pub struct VaultService<'a> {
    state: &'a AppState,
}

impl<'a> VaultService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Encrypt `data` for the owner and store it under `data_type`.
    pub fn save_entry(
        &self,
        owner_id: &str,
        password: &str,
        data_type: &str,
        data: &[u8],
        content_hash: Option<String>,
    ) -> ServiceResult<VaultEntry> {
        let data_type = normalize_data_type(data_type)?;
        let identities = IdentityService::new(self.state);
        let identity = identities.get(owner_id)?;

        let ciphertext = {
            let private_key = identities.unlock_private_key(&identity, password)?;
            let public_key = IdentityKeyManager::derive_public_key(&private_key);
            vault_cipher::encrypt_for_owner(&public_key, data)?
        };

        let entry = VaultRepository::new(&self.state.store).upsert(
            owner_id,
            &data_type,
            vault_cipher::encode_transport(&ciphertext),
            content_hash,
            VaultEntryStatus::Approved,
        )?;

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::VaultEntrySaved)
                .with_principal(owner_id)
                .with_resource("vault_entry", &entry.id)
                .with_details(json!({ "data_type": entry.data_type }))
        );
        tracing::debug!(owner_id = %owner_id, data_type = %entry.data_type, "vault entry saved");

        Ok(entry)
    }

    /// Decrypt the owner's entries of `data_types` (all when empty).
    pub fn get_user_data(
        &self,
        owner_id: &str,
        password: &str,
        data_types: &[String],
    ) -> ServiceResult<Vec<DecryptedEntry>> {
        let data_types = normalize_data_types(data_types)?;
        let identities = IdentityService::new(self.state);
        let identity = identities.get(owner_id)?;
        let private_key = identities.unlock_private_key(&identity, password)?;

        let entries = VaultRepository::new(&self.state.store).get_by_types(owner_id, &data_types)?;
        let mut decrypted = Vec::with_capacity(entries.len());
        for entry in entries {
            entry.verify_ownership(owner_id)?;
            let data = vault_cipher::decrypt_transport(&private_key, &entry.ciphertext)?;
            decrypted.push(DecryptedEntry {
                data_type: entry.data_type,
                data: Zeroizing::new(data),
                content_hash: entry.content_hash,
                updated_at: entry.updated_at,
            });
        }
        drop(private_key);

        audit_log!(
            &self.state.store,
            AuditEvent::new(AuditEventType::VaultEntryRead)
                .with_principal(owner_id)
                .with_resource("vault", owner_id)
                .with_details(json!({
                    "data_types": decrypted.iter().map(|e| e.data_type.as_str()).collect::<Vec<_>>()
                }))
        );

        Ok(decrypted)
    }
}
