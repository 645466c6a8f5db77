// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Identity, vault, consent and organization events are appended to a daily
//! JSONL file. Events never carry plaintext personal data, passwords,
//! phrases or tokens; only ids, data type names and outcomes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStore, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Identity events
    IdentityCreated,
    IdentityLoggedIn,
    IdentityRecovered,
    ProfileCreated,
    ProfileUpdated,

    // Vault events
    VaultEntrySaved,
    VaultEntryRead,

    // Organization events
    OrganizationRegistered,
    OrganizationStatusChanged,
    OrganizationUpdated,

    // Consent events
    ConsentRequested,
    ConsentApproved,
    ConsentRejected,
    TokenDetokenized,
    ReleaseRead,

    // Auth events
    AuthFailure,
    PermissionDenied,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Principal that triggered the event (user, organization or admin id).
    pub principal_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            principal_id: None,
            resource_type: None,
            resource_id: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_principal(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

pub struct AuditRepository<'a> {
    storage: &'a FileStore,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a FileStore) -> Self {
        Self { storage }
    }

    /// Append an event to the daily log.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let line = serde_json::to_string(event).map_err(|e| {
            StorageError::Serialization(format!("failed to serialize audit event: {e}"))
        })?;
        self.storage.append_line(&path, &line)
    }

    /// Events for one day (`YYYY-MM-DD`). A day with no log is an error.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;
        let content = String::from_utf8(content)
            .map_err(|e| StorageError::Serialization(format!("invalid UTF-8 in audit log: {e}")))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::Serialization(format!("failed to deserialize audit event: {e}"))
                })
            })
            .collect()
    }

    /// Events across an inclusive date range; missing days are skipped.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| StorageError::Serialization(format!("invalid date {s}: {e}")))
        };
        let end = parse(end_date)?;
        let mut current = parse(start_date)?;

        let mut all_events = Vec::new();
        while current <= end {
            match self.read_events(&current.format("%Y-%m-%d").to_string()) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::Serialization("date overflow".to_string()))?;
        }

        Ok(all_events)
    }
}

/// Record an audit event. Failures are logged and never fail the caller.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event:expr) => {{
        let event = $event;
        if let Err(e) = $crate::storage::AuditRepository::new($storage).log(&event) {
            tracing::warn!(
                error = %e,
                event_type = ?event.event_type,
                "failed to write audit event"
            );
        }
    }};
}
