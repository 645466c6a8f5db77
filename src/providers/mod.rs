// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound collaborators.

pub mod notifier;
pub mod oracle;

pub use notifier::{notify, LogNotifier, MailRelayNotifier, Notifier, NotifyError, Template};
pub use oracle::{
    translate_or_fallback, ComplianceOracle, ComplianceSummary, DisabledOracle, HttpOracle,
    OracleError,
};
