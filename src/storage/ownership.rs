// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for stored resources.
//!
//! Vault entries and consent requests belong to exactly one identity. Every
//! owner-scoped read or decision passes through these checks.

use super::{StorageError, StorageResult};

pub trait OwnedResource {
    /// Id of the identity that owns this resource.
    fn owner_id(&self) -> &str;

    /// Short resource name used in errors and audit records.
    fn resource_kind(&self) -> &'static str;
}

pub trait OwnershipEnforcer {
    /// `StorageError::PermissionDenied` unless `principal_id` owns the resource.
    fn verify_ownership(&self, principal_id: &str) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, principal_id: &str) -> StorageResult<()> {
        if self.owner_id() == principal_id {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied {
                principal: principal_id.to_string(),
                resource: self.resource_kind().to_string(),
            })
        }
    }
}
