// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the file store.

pub mod identities;
pub mod organizations;
pub mod profiles;
pub mod vault;

pub use identities::{IdentityRepository, StoredIdentity};
pub use organizations::{OrgStatus, OrganizationRepository, StoredOrganization};
pub use profiles::{ProfileRepository, StoredProfile};
pub use vault::{VaultEntry, VaultEntryStatus, VaultRepository};
