// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Organization repository and lifecycle.
//!
//! ```text
//! organizations/{org_id}.json
//! index/org-email/{digest}.json   # unique contact email
//! index/org-name/{digest}.json    # unique organization name
//! index/org-public-id/{slug}.json # unique public id
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::identities::{ClaimSet, IndexClaim};
use super::super::{FileStore, StorageError, StorageResult};

const EMAIL_INDEX: &str = "org-email";
const NAME_INDEX: &str = "org-name";
const PUBLIC_ID_INDEX: &str = "org-public-id";

/// Upper bound on numeric suffixes tried for a colliding public id.
const MAX_PUBLIC_ID_ATTEMPTS: u32 = 1000;

/// Organization lifecycle.
///
/// ```text
/// un_approved ──▶ approved | rejected | banned | suspended
/// approved    ──▶ suspended | banned
/// suspended   ──▶ approved | banned
/// ```
/// `rejected` and `banned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrgStatus {
    UnApproved,
    Approved,
    Rejected,
    Banned,
    Suspended,
}

impl OrgStatus {
    pub fn can_transition_to(&self, next: OrgStatus) -> bool {
        use OrgStatus::*;
        matches!(
            (self, next),
            (UnApproved, Approved | Rejected | Banned | Suspended)
                | (Approved, Suspended | Banned)
                | (Suspended, Approved | Banned)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrgStatus::Rejected | OrgStatus::Banned)
    }
}

impl std::fmt::Display for OrgStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrgStatus::UnApproved => "un_approved",
            OrgStatus::Approved => "approved",
            OrgStatus::Rejected => "rejected",
            OrgStatus::Banned => "banned",
            OrgStatus::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOrganization {
    pub org_id: String,
    /// Human-facing id, `org_<slug>[_n]`
    pub public_org_id: String,
    pub name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub email_index: String,
    pub password_hash: String,
    /// SHA-256 hex of the API key; the key itself is never stored
    pub api_key_hash: String,
    pub status: OrgStatus,
    pub document_type: String,
    pub document_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lowercase ASCII slug; runs of other characters collapse to `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "org".to_string()
    } else {
        slug.to_string()
    }
}

fn name_key(name: &str) -> String {
    let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    alloy::hex::encode(Sha256::digest(normalized.as_bytes()))
}

pub struct OrganizationRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> OrganizationRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    pub fn exists(&self, org_id: &str) -> bool {
        self.storage.exists(self.storage.paths().organization(org_id))
    }

    pub fn get(&self, org_id: &str) -> StorageResult<StoredOrganization> {
        let path = self.storage.paths().organization(org_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Organization {org_id}")));
        }
        self.storage.read_json(path)
    }

    /// Persist a new organization, claiming its email, name and a public id.
    ///
    /// `public_org_id` is assigned here from the name; the value on the
    /// input is ignored. Any failure releases the claims taken so far.
    /// Returns the stored record.
    pub fn create(&self, org: &StoredOrganization) -> StorageResult<StoredOrganization> {
        let paths = self.storage.paths();
        let claim = IndexClaim {
            id: org.org_id.clone(),
        };
        let mut claims = ClaimSet::new(self.storage);

        claims
            .take(paths.index_entry(EMAIL_INDEX, &org.email_index), &claim)
            .map_err(|e| conflict(e, "Organization with this email"))?;
        claims
            .take(paths.index_entry(NAME_INDEX, &name_key(&org.name)), &claim)
            .map_err(|e| conflict(e, "Organization with this name"))?;

        let mut stored = org.clone();
        stored.public_org_id = self.claim_public_id(&org.name, &claim, &mut claims)?;

        self.storage
            .create_json(paths.organization(&stored.org_id), &stored)?;
        claims.keep();
        Ok(stored)
    }

    fn claim_public_id(
        &self,
        name: &str,
        claim: &IndexClaim,
        claims: &mut ClaimSet<'_>,
    ) -> StorageResult<String> {
        let base = format!("org_{}", slugify(name));
        for attempt in 1..=MAX_PUBLIC_ID_ATTEMPTS {
            let candidate = if attempt == 1 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            let path = self.storage.paths().index_entry(PUBLIC_ID_INDEX, &candidate);
            match claims.take(path, claim) {
                Ok(()) => return Ok(candidate),
                Err(StorageError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::AlreadyExists(format!("public id {base}")))
    }

    pub fn update(&self, org: &StoredOrganization) -> StorageResult<()> {
        let org_id = &org.org_id;
        if !self.exists(org_id) {
            return Err(StorageError::NotFound(format!("Organization {org_id}")));
        }
        self.storage
            .write_json(self.storage.paths().organization(org_id), org)
    }

    /// Save `org` after a contact change, moving the email claim when
    /// `org.email_index` differs from `previous_index`.
    ///
    /// The new claim is taken before the record is written and released
    /// again if the write fails; the old claim is dropped last.
    pub fn update_contact(&self, org: &StoredOrganization, previous_index: &str) -> StorageResult<()> {
        if org.email_index == previous_index {
            return self.update(org);
        }

        let paths = self.storage.paths();
        let claim = IndexClaim {
            id: org.org_id.clone(),
        };
        let mut claims = ClaimSet::new(self.storage);
        claims
            .take(paths.index_entry(EMAIL_INDEX, &org.email_index), &claim)
            .map_err(|e| conflict(e, "Organization with this email"))?;
        self.update(org)?;
        claims.keep();

        let old_claim = paths.index_entry(EMAIL_INDEX, previous_index);
        if let Err(e) = self.storage.delete(&old_claim) {
            tracing::warn!(org_id = %org.org_id, error = %e, "failed to release previous email claim");
        }
        Ok(())
    }

    pub fn find_by_email_index(&self, digest: &str) -> StorageResult<Option<StoredOrganization>> {
        let path = self.storage.paths().index_entry(EMAIL_INDEX, digest);
        if !self.storage.exists(&path) {
            return Ok(None);
        }
        let claim: IndexClaim = self.storage.read_json(path)?;
        match self.get(&claim.id) {
            Ok(org) => Ok(Some(org)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All organizations, oldest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredOrganization>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().organizations_dir(), "json")?;

        let mut orgs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id) {
                Ok(org) => orgs.push(org),
                Err(e) => tracing::warn!(org_id = %id, error = %e, "skipping unreadable organization"),
            }
        }
        orgs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orgs)
    }
}

fn conflict(e: StorageError, what: &str) -> StorageError {
    match e {
        StorageError::AlreadyExists(_) => StorageError::AlreadyExists(what.to_string()),
        other => other,
    }
}
