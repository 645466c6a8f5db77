// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault entry repository.
//!
//! One file per (owner, data type): `vault/{owner_id}/{DATA_TYPE}.json`.
//! The path is the uniqueness constraint. Ciphertexts are stored in their
//! base64 transport encoding exactly as produced for the owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStore, OwnedResource, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VaultEntryStatus {
    Pending,
    Approved,
    Rejected,
    UnApproved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub id: String,
    pub owner_id: String,
    pub data_type: String,
    /// Base64 of `ephemeral_pk || nonce || tag || ciphertext`
    pub ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub status: VaultEntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for VaultEntry {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn resource_kind(&self) -> &'static str {
        "vault_entry"
    }
}

pub struct VaultRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> VaultRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, owner_id: &str, data_type: &str) -> StorageResult<Option<VaultEntry>> {
        let path = self.storage.paths().vault_entry(owner_id, data_type);
        if !self.storage.exists(&path) {
            return Ok(None);
        }
        self.storage.read_json(path).map(Some)
    }

    /// Insert or replace the entry for `(owner_id, data_type)`.
    ///
    /// A replacement keeps the original `id` and `created_at`.
    pub fn upsert(
        &self,
        owner_id: &str,
        data_type: &str,
        ciphertext: String,
        content_hash: Option<String>,
        status: VaultEntryStatus,
    ) -> StorageResult<VaultEntry> {
        let now = Utc::now();
        let entry = match self.get(owner_id, data_type)? {
            Some(existing) => VaultEntry {
                ciphertext,
                content_hash,
                status,
                updated_at: now,
                ..existing
            },
            None => VaultEntry {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                data_type: data_type.to_string(),
                ciphertext,
                content_hash,
                status,
                created_at: now,
                updated_at: now,
            },
        };

        self.storage
            .write_json(self.storage.paths().vault_entry(owner_id, data_type), &entry)?;
        Ok(entry)
    }

    /// Entries of the given types, sorted by data type. An empty `data_types`
    /// selects every entry the owner has; types with no entry are skipped.
    pub fn get_by_types(&self, owner_id: &str, data_types: &[String]) -> StorageResult<Vec<VaultEntry>> {
        let mut wanted: Vec<String> = if data_types.is_empty() {
            self.storage
                .list_files(self.storage.paths().owner_vault_dir(owner_id), "json")?
        } else {
            data_types.to_vec()
        };
        wanted.sort();
        wanted.dedup();

        let mut entries = Vec::with_capacity(wanted.len());
        for data_type in wanted {
            if let Some(entry) = self.get(owner_id, &data_type)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn delete(&self, owner_id: &str, data_type: &str) -> StorageResult<()> {
        let path = self.storage.paths().vault_entry(owner_id, data_type);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Vault entry {data_type}")));
        }
        self.storage.delete(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn upsert_creates_then_replaces() {
        let (_temp, storage) = setup();
        let repo = VaultRepository::new(&storage);

        let first = repo
            .upsert("u1", "CORE_PII", "AAA=".into(), None, VaultEntryStatus::Approved)
            .unwrap();
        let second = repo
            .upsert("u1", "CORE_PII", "BBB=".into(), Some("h".into()), VaultEntryStatus::Approved)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);

        let stored = repo.get("u1", "CORE_PII").unwrap().unwrap();
        assert_eq!(stored.ciphertext, "BBB=");
        assert_eq!(stored.content_hash.as_deref(), Some("h"));
    }

    #[test]
    fn get_by_types_filters_and_sorts() {
        let (_temp, storage) = setup();
        let repo = VaultRepository::new(&storage);
        for data_type in ["FINANCIALS", "CORE_PII", "HEALTH"] {
            repo.upsert("u1", data_type, "AAA=".into(), None, VaultEntryStatus::Approved)
                .unwrap();
        }
        repo.upsert("u2", "CORE_PII", "AAA=".into(), None, VaultEntryStatus::Approved)
            .unwrap();

        let all: Vec<_> = repo
            .get_by_types("u1", &[])
            .unwrap()
            .into_iter()
            .map(|e| e.data_type)
            .collect();
        assert_eq!(all, vec!["CORE_PII", "FINANCIALS", "HEALTH"]);

        let some = repo
            .get_by_types("u1", &["HEALTH".into(), "MISSING".into(), "CORE_PII".into()])
            .unwrap();
        assert_eq!(some.len(), 2);
        assert_eq!(some[0].data_type, "CORE_PII");

        assert!(repo.get_by_types("u3", &[]).unwrap().is_empty());
    }

    #[test]
    fn delete_entry() {
        let (_temp, storage) = setup();
        let repo = VaultRepository::new(&storage);
        repo.upsert("u1", "CORE_PII", "AAA=".into(), None, VaultEntryStatus::Approved)
            .unwrap();

        repo.delete("u1", "CORE_PII").unwrap();
        assert!(repo.get("u1", "CORE_PII").unwrap().is_none());
        assert!(matches!(
            repo.delete("u1", "CORE_PII"),
            Err(StorageError::NotFound(_))
        ));
    }
}
