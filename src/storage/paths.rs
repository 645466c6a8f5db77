// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the data directory.

use std::path::{Path, PathBuf};

/// Default data directory when `DATA_DIR` is unset.
pub const DATA_ROOT: &str = "./data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Identity Paths ==========

    pub fn identities_dir(&self) -> PathBuf {
        self.root.join("identities")
    }

    pub fn identity(&self, user_id: &str) -> PathBuf {
        self.identities_dir().join(format!("{user_id}.json"))
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn profile(&self, user_id: &str) -> PathBuf {
        self.profiles_dir().join(format!("{user_id}.json"))
    }

    // ========== Organization Paths ==========

    pub fn organizations_dir(&self) -> PathBuf {
        self.root.join("organizations")
    }

    pub fn organization(&self, org_id: &str) -> PathBuf {
        self.organizations_dir().join(format!("{org_id}.json"))
    }

    // ========== Vault Paths ==========

    pub fn vault_dir(&self) -> PathBuf {
        self.root.join("vault")
    }

    /// One directory per owner; one file per data type inside it.
    pub fn owner_vault_dir(&self, owner_id: &str) -> PathBuf {
        self.vault_dir().join(owner_id)
    }

    pub fn vault_entry(&self, owner_id: &str, data_type: &str) -> PathBuf {
        self.owner_vault_dir(owner_id)
            .join(format!("{data_type}.json"))
    }

    // ========== Unique Key Index ==========

    /// Claim files that enforce uniqueness (emails, names, public ids).
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn index_entry(&self, kind: &str, key: &str) -> PathBuf {
        self.index_dir().join(kind).join(format!("{key}.json"))
    }

    // ========== Consent Ledger ==========

    pub fn ledger_db(&self) -> PathBuf {
        self.root.join("consent.redb")
    }

    // ========== Audit Log Paths ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
    }

    #[test]
    fn entity_paths_are_correct() {
        let paths = StoragePaths::new("/srv/sde");
        assert_eq!(
            paths.identity("u-1"),
            PathBuf::from("/srv/sde/identities/u-1.json")
        );
        assert_eq!(
            paths.profile("u-1"),
            PathBuf::from("/srv/sde/profiles/u-1.json")
        );
        assert_eq!(
            paths.organization("o-1"),
            PathBuf::from("/srv/sde/organizations/o-1.json")
        );
        assert_eq!(paths.ledger_db(), PathBuf::from("/srv/sde/consent.redb"));
        assert_eq!(
            paths.index_entry("identity-email", "ab12"),
            PathBuf::from("/srv/sde/index/identity-email/ab12.json")
        );
    }

    #[test]
    fn vault_paths_are_keyed_by_owner_and_type() {
        let paths = StoragePaths::new("/srv/sde");
        assert_eq!(
            paths.vault_entry("u-1", "CORE_PII"),
            PathBuf::from("/srv/sde/vault/u-1/CORE_PII.json")
        );
        assert_eq!(paths.owner_vault_dir("u-1"), PathBuf::from("/srv/sde/vault/u-1"));
    }

    #[test]
    fn audit_paths_are_daily() {
        let paths = StoragePaths::new("/srv/sde");
        assert_eq!(
            paths.audit_events_file("2026-01-31"),
            PathBuf::from("/srv/sde/audit/2026-01-31/events.jsonl")
        );
    }
}
