// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent ledger backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `consent_requests`: request_id → serialized ConsentRequest
//! - `owner_index`: composite key (owner_id|!created_at|request_id) → request_id
//! - `requester_index`: composite key (requester_id|!created_at|request_id) → request_id
//!
//! Records are never deleted. Status changes go through [`ConsentLedger::transition`],
//! a compare-and-set inside a single write transaction. redb admits one writer
//! at a time, so of two racing decisions exactly one observes `un_approved`.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::ownership::OwnedResource;
use crate::crypto::SealedBox;

// =============================================================================
// Table Definitions
// =============================================================================

const CONSENT_REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("consent_requests");

/// Key format: `owner_id|!created_at_be|request_id` for newest-first range scans.
const OWNER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("owner_index");

/// Key format: `requester_id|!created_at_be|request_id`.
const REQUESTER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("requester_index");

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    UnApproved,
    Approved,
    Rejected,
}

impl ConsentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConsentStatus::UnApproved)
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsentStatus::UnApproved => "un_approved",
            ConsentStatus::Approved => "approved",
            ConsentStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A vault ciphertext carried unchanged inside a PII token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EmbeddedEntry {
    pub data_type: String,
    /// Base64 transport encoding of the owner-targeted ciphertext
    pub encrypted_data: String,
}

/// Plain-language rendering of a request shown to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ConsentExplanation {
    pub title: String,
    pub purpose_text: String,
    pub usage_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub id: String,
    /// Requesting organization id
    pub requester_id: String,
    pub requester_name: String,
    pub owner_id: String,
    pub owner_did: String,
    pub data_types: Vec<String>,
    pub purpose: String,
    pub explanation: ConsentExplanation,
    pub pii_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub ttl_minutes: u32,
    /// Ciphertexts embedded in `pii_token`, kept so a decision can outlive the token.
    pub bundle: Vec<EmbeddedEntry>,
    pub status: ConsentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Plaintext bundle sealed under the platform key on approval.
    pub released: Option<SealedBox>,
}

impl OwnedResource for ConsentRequest {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn resource_kind(&self) -> &'static str {
        "consent_request"
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("consent request not found: {0}")]
    NotFound(String),

    #[error("consent request already exists: {0}")]
    AlreadyExists(String),

    #[error("consent request is {from}; cannot move to {to}")]
    InvalidTransition { from: ConsentStatus, to: ConsentStatus },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// `party | inverted_created_at_be | request_id`; newest sorts first.
fn make_index_key(party_id: &str, created_at: i64, request_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(party_id.len() + 1 + 8 + 1 + request_id.len());
    key.extend_from_slice(party_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!created_at as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(request_id.as_bytes());
    key
}

fn make_prefix(party_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(party_id.len() + 1);
    prefix.extend_from_slice(party_id.as_bytes());
    prefix.push(b'|');
    prefix
}

fn make_prefix_end(party_id: &str) -> Vec<u8> {
    let mut end = make_prefix(party_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// ConsentLedger
// =============================================================================

pub struct ConsentLedger {
    db: Database,
}

impl ConsentLedger {
    /// Open (or create) the ledger at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CONSENT_REQUESTS)?;
            let _ = write_txn.open_table(OWNER_INDEX)?;
            let _ = write_txn.open_table(REQUESTER_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new request and both index entries.
    pub fn insert(&self, request: &ConsentRequest) -> LedgerResult<()> {
        let json = serde_json::to_vec(request)?;
        let created = request.created_at.timestamp_millis();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONSENT_REQUESTS)?;
            if table.get(request.id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(request.id.clone()));
            }
            table.insert(request.id.as_str(), json.as_slice())?;

            let mut owner_idx = write_txn.open_table(OWNER_INDEX)?;
            let key = make_index_key(&request.owner_id, created, &request.id);
            owner_idx.insert(key.as_slice(), request.id.as_str())?;

            let mut requester_idx = write_txn.open_table(REQUESTER_INDEX)?;
            let key = make_index_key(&request.requester_id, created, &request.id);
            requester_idx.insert(key.as_slice(), request.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// A read transaction over the main table succeeds.
    pub fn health_check(&self) -> LedgerResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(CONSENT_REQUESTS)?;
        Ok(())
    }

    pub fn get(&self, request_id: &str) -> LedgerResult<Option<ConsentRequest>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONSENT_REQUESTS)?;
        match table.get(request_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Requests addressed to an owner, newest first.
    pub fn list_by_owner(&self, owner_id: &str) -> LedgerResult<Vec<ConsentRequest>> {
        self.list_by_index(OWNER_INDEX, owner_id)
    }

    /// Requests created by an organization, newest first.
    pub fn list_by_requester(&self, requester_id: &str) -> LedgerResult<Vec<ConsentRequest>> {
        self.list_by_index(REQUESTER_INDEX, requester_id)
    }

    fn list_by_index(
        &self,
        index: TableDefinition<&[u8], &str>,
        party_id: &str,
    ) -> LedgerResult<Vec<ConsentRequest>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(index)?;
        let table = read_txn.open_table(CONSENT_REQUESTS)?;

        let prefix = make_prefix(party_id);
        let prefix_end = make_prefix_end(party_id);

        let mut results = Vec::new();
        for entry in idx_table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (_, id) = entry?;
            if let Some(value) = table.get(id.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(results)
    }

    /// Move a request out of `un_approved`.
    ///
    /// Reads the current record, refuses if it is already terminal, applies
    /// `apply` and writes it back, all in one write transaction. `apply` may
    /// fill in decision fields such as the sealed release.
    pub fn transition<F>(&self, request_id: &str, next: ConsentStatus, apply: F) -> LedgerResult<ConsentRequest>
    where
        F: FnOnce(&mut ConsentRequest),
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(CONSENT_REQUESTS)?;

            let existing_bytes = {
                let existing = table
                    .get(request_id)?
                    .ok_or_else(|| LedgerError::NotFound(request_id.to_string()))?;
                existing.value().to_vec()
            };

            let mut request: ConsentRequest = serde_json::from_slice(&existing_bytes)?;
            if request.status.is_terminal() || !next.is_terminal() {
                return Err(LedgerError::InvalidTransition {
                    from: request.status,
                    to: next,
                });
            }

            let now = Utc::now();
            request.status = next;
            request.updated_at = now;
            request.decided_at = Some(now);
            apply(&mut request);

            let json = serde_json::to_vec(&request)?;
            table.insert(request_id, json.as_slice())?;
            request
        };
        write_txn.commit()?;
        Ok(updated)
    }
}

impl std::fmt::Debug for ConsentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentLedger").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
