// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity repository.
//!
//! ```text
//! identities/{user_id}.json          # StoredIdentity
//! index/identity-email/{digest}.json # claim: email digest → user_id
//! index/identity-did/{did}.json      # claim: DID → user_id
//! ```
//!
//! The private key is only ever present as a [`PlatformEnvelope`]; contact
//! details are sealed under the platform key.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStore, StorageError, StorageResult};
use crate::crypto::{PlatformEnvelope, SealedBox};

const EMAIL_INDEX: &str = "identity-email";
const DID_INDEX: &str = "identity-did";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub user_id: String,
    pub did: String,
    /// EIP-55 address the DID is bound to
    pub address: String,
    /// Keyed digest of the normalised email; the only email lookup key
    pub email_index: String,
    pub sealed_email: SealedBox,
    pub sealed_name: SealedBox,
    /// Argon2 PHC string for login
    pub password_hash: String,
    pub key_envelope: PlatformEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claim file content for unique lookup keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexClaim {
    pub id: String,
}

/// Unique-key claims taken while creating a record.
///
/// Dropped without [`ClaimSet::keep`], every claim is deleted again.
pub(crate) struct ClaimSet<'a> {
    storage: &'a FileStore,
    taken: Vec<PathBuf>,
}

impl<'a> ClaimSet<'a> {
    pub(crate) fn new(storage: &'a FileStore) -> Self {
        Self {
            storage,
            taken: Vec::new(),
        }
    }

    pub(crate) fn take(&mut self, path: PathBuf, claim: &IndexClaim) -> StorageResult<()> {
        self.storage.create_json(&path, claim)?;
        self.taken.push(path);
        Ok(())
    }

    pub(crate) fn keep(mut self) {
        self.taken.clear();
    }
}

impl Drop for ClaimSet<'_> {
    fn drop(&mut self) {
        for path in self.taken.drain(..) {
            if let Err(e) = self.storage.delete(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to release index claim");
            }
        }
    }
}

pub struct IdentityRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> IdentityRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    pub fn exists(&self, user_id: &str) -> bool {
        self.storage.exists(self.storage.paths().identity(user_id))
    }

    pub fn get(&self, user_id: &str) -> StorageResult<StoredIdentity> {
        let path = self.storage.paths().identity(user_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Identity {user_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new identity.
    ///
    /// The email digest is claimed first; a second identity with the same
    /// email fails with `AlreadyExists` even under concurrent registration.
    /// Any failure releases the claims taken so far.
    pub fn create(&self, identity: &StoredIdentity) -> StorageResult<()> {
        let paths = self.storage.paths();
        let claim = IndexClaim {
            id: identity.user_id.clone(),
        };
        let mut claims = ClaimSet::new(self.storage);

        claims
            .take(paths.index_entry(EMAIL_INDEX, &identity.email_index), &claim)
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => {
                    StorageError::AlreadyExists("Identity with this email".to_string())
                }
                other => other,
            })?;
        claims.take(paths.index_entry(DID_INDEX, &identity.did), &claim)?;

        self.storage
            .create_json(paths.identity(&identity.user_id), identity)?;
        claims.keep();
        Ok(())
    }

    pub fn update(&self, identity: &StoredIdentity) -> StorageResult<()> {
        let user_id = &identity.user_id;
        if !self.exists(user_id) {
            return Err(StorageError::NotFound(format!("Identity {user_id}")));
        }
        self.storage
            .write_json(self.storage.paths().identity(user_id), identity)
    }

    pub fn find_by_email_index(&self, digest: &str) -> StorageResult<Option<StoredIdentity>> {
        self.find_by_claim(EMAIL_INDEX, digest)
    }

    pub fn find_by_did(&self, did: &str) -> StorageResult<Option<StoredIdentity>> {
        self.find_by_claim(DID_INDEX, did)
    }

    fn find_by_claim(&self, kind: &str, key: &str) -> StorageResult<Option<StoredIdentity>> {
        let path = self.storage.paths().index_entry(kind, key);
        if !self.storage.exists(&path) {
            return Ok(None);
        }
        let claim: IndexClaim = self.storage.read_json(path)?;
        match self.get(&claim.id) {
            Ok(identity) => Ok(Some(identity)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::ENVELOPE_VERSION;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn sealed() -> SealedBox {
        SealedBox {
            nonce: vec![0; 12],
            tag: vec![0; 16],
            ciphertext: vec![1, 2, 3],
        }
    }

    fn identity(user_id: &str, email_index: &str) -> StoredIdentity {
        let now = Utc::now();
        StoredIdentity {
            user_id: user_id.to_string(),
            did: format!("did:sde:mainnet:0x{user_id}"),
            address: format!("0x{user_id}"),
            email_index: email_index.to_string(),
            sealed_email: sealed(),
            sealed_name: sealed(),
            password_hash: "$argon2id$stub".to_string(),
            key_envelope: PlatformEnvelope {
                version: ENVELOPE_VERSION,
                sealed: sealed(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_lookup() {
        let (_temp, storage) = setup();
        let repo = IdentityRepository::new(&storage);
        repo.create(&identity("u1", "digest-1")).unwrap();

        assert_eq!(repo.get("u1").unwrap().email_index, "digest-1");
        assert_eq!(
            repo.find_by_email_index("digest-1").unwrap().unwrap().user_id,
            "u1"
        );
        assert_eq!(
            repo.find_by_did("did:sde:mainnet:0xu1").unwrap().unwrap().user_id,
            "u1"
        );
        assert!(repo.find_by_email_index("digest-2").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (_temp, storage) = setup();
        let repo = IdentityRepository::new(&storage);
        repo.create(&identity("u1", "digest-1")).unwrap();

        let err = repo.create(&identity("u2", "digest-1")).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert!(!repo.exists("u2"));
    }

    #[test]
    fn failed_record_write_releases_claims() {
        let (_temp, storage) = setup();
        let repo = IdentityRepository::new(&storage);
        let dir = storage.paths().identities_dir();
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        assert!(matches!(
            repo.create(&identity("u1", "digest-1")),
            Err(StorageError::Io(_))
        ));
        assert!(repo.find_by_email_index("digest-1").unwrap().is_none());

        std::fs::remove_file(&dir).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        repo.create(&identity("u1", "digest-1")).unwrap();
        assert_eq!(
            repo.find_by_did("did:sde:mainnet:0xu1").unwrap().unwrap().user_id,
            "u1"
        );
    }

    #[test]
    fn update_requires_existing() {
        let (_temp, storage) = setup();
        let repo = IdentityRepository::new(&storage);

        let mut stored = identity("u1", "digest-1");
        assert!(matches!(repo.update(&stored), Err(StorageError::NotFound(_))));

        repo.create(&stored).unwrap();
        stored.password_hash = "$argon2id$new".to_string();
        repo.update(&stored).unwrap();
        assert_eq!(repo.get("u1").unwrap().password_hash, "$argon2id$new");
    }

    #[test]
    fn missing_identity_is_not_found() {
        let (_temp, storage) = setup();
        let repo = IdentityRepository::new(&storage);
        assert!(matches!(repo.get("nope"), Err(StorageError::NotFound(_))));
    }
}
