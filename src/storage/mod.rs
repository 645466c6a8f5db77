// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   identities/{user_id}.json         # identity, sealed contact data, key envelope
//!   profiles/{user_id}.json           # sealed user profile
//!   organizations/{org_id}.json
//!   vault/{owner_id}/{DATA_TYPE}.json # owner-targeted ciphertext
//!   index/{kind}/{key}.json           # uniqueness claims
//!   audit/{date}/events.jsonl         # daily audit log
//!   consent.redb                      # consent ledger
//! ```
//!
//! Documents are plain JSON; anything sensitive is encrypted by the services
//! before it is handed to this layer.

pub mod audit;
pub mod consent_ledger;
pub mod fs_store;
pub mod ownership;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use consent_ledger::{
    ConsentExplanation, ConsentLedger, ConsentRequest, ConsentStatus, EmbeddedEntry, LedgerError,
    LedgerResult,
};
pub use fs_store::{FileStore, StorageError, StorageResult};
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{
    IdentityRepository, OrgStatus, OrganizationRepository, ProfileRepository, StoredIdentity,
    StoredOrganization, StoredProfile, VaultEntry, VaultEntryStatus, VaultRepository,
};
