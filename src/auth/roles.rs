// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal roles carried in auth tokens.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// ## Role Hierarchy
///
/// - `Admin` - approves, suspends and bans organizations
/// - `User` - owns an identity and its vault
/// - `Organization` - requests consent and reads released data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Organization,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    ///
    /// Admin does not inherit user or organization rights: it owns no vault
    /// and cannot request data.
    pub fn has_privilege(&self, required: Role) -> bool {
        *self == required
    }

    /// Parse role from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "organization" => Some(Role::Organization),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
            Role::Organization => write!(f, "organization"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_only_match_themselves() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(!Role::Admin.has_privilege(Role::User));
        assert!(!Role::Admin.has_privilege(Role::Organization));
        assert!(Role::User.has_privilege(Role::User));
        assert!(!Role::Organization.has_privilege(Role::User));
    }

    #[test]
    fn from_str_parses_correctly() {
        assert_eq!(Role::from_str("admin"), Some(Role::Admin));
        assert_eq!(Role::from_str("ORGANIZATION"), Some(Role::Organization));
        assert_eq!(Role::from_str("User"), Some(Role::User));
        assert_eq!(Role::from_str("client"), None);
    }

    #[test]
    fn display_round_trips() {
        for role in [Role::Admin, Role::User, Role::Organization] {
            assert_eq!(Role::from_str(&role.to_string()), Some(role));
        }
    }
}
