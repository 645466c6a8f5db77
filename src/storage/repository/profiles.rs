// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profile repository: `profiles/{user_id}.json`.
//!
//! The profile body is sealed by the service layer; this module only sees
//! the [`SealedBox`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStore, OwnedResource, StorageError, StorageResult};
use crate::crypto::SealedBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    pub user_id: String,
    pub sealed: SealedBox,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for StoredProfile {
    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn resource_kind(&self) -> &'static str {
        "profile"
    }
}

pub struct ProfileRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<StoredProfile> {
        let path = self.storage.paths().profile(user_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Profile for {user_id}")));
        }
        self.storage.read_json(path)
    }

    /// At most one profile per user; a second create is `AlreadyExists`.
    pub fn create(&self, profile: &StoredProfile) -> StorageResult<()> {
        self.storage
            .create_json(self.storage.paths().profile(&profile.user_id), profile)
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => {
                    StorageError::AlreadyExists("Profile for this user".to_string())
                }
                other => other,
            })
    }

    pub fn update(&self, profile: &StoredProfile) -> StorageResult<()> {
        let path = self.storage.paths().profile(&profile.user_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Profile for {}", profile.user_id)));
        }
        self.storage.write_json(path, profile)
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

    fn profile(user_id: &str, byte: u8) -> StoredProfile {
        let now = Utc::now();
        StoredProfile {
            user_id: user_id.to_string(),
            sealed: SealedBox {
                nonce: vec![0; 12],
                tag: vec![0; 16],
                ciphertext: vec![byte; 4],
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_once_then_update() {
        let (_temp, storage) = setup();
        let repo = ProfileRepository::new(&storage);

        assert!(matches!(repo.get("u1"), Err(StorageError::NotFound(_))));
        assert!(matches!(repo.update(&profile("u1", 1)), Err(StorageError::NotFound(_))));

        repo.create(&profile("u1", 1)).unwrap();
        assert!(matches!(
            repo.create(&profile("u1", 2)),
            Err(StorageError::AlreadyExists(_))
        ));

        repo.update(&profile("u1", 3)).unwrap();
        assert_eq!(repo.get("u1").unwrap().sealed.ciphertext, vec![3; 4]);
    }
}
