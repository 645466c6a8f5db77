// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SDE Server - consent-gated personal data exchange
//!
//! Users hold sovereign identities whose private keys are wrapped under their
//! password. Personal data is stored encrypted to the owner's public key, and
//! organizations obtain it only through a signed capability token and an
//! explicit owner decision.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Capability tokens, password hashing and request extractors
//! - `crypto` - Identity keys, key envelopes and the vault cipher
//! - `providers` - Compliance oracle and notification relay
//! - `services` - Identity, vault, organization and consent workflows
//! - `storage` - JSON document store, consent ledger (redb) and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod state;
pub mod storage;
