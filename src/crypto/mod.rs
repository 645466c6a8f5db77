// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Custody Core
//!
//! Synchronous, side-effect-free crypto used by the services:
//!
//! - [`identity`]: phrase generation and identity derivation
//! - [`envelope`]: the two-layer private key envelope
//! - [`vault_cipher`]: owner-targeted ECIES for vault entries
//! - [`identifiers`]: keyed lookup digests and API keys
//!
//! Nothing here retries. Cryptographic failures are never transient.

pub mod envelope;
pub mod error;
pub mod identifiers;
pub mod identity;
pub mod vault_cipher;

pub use envelope::{KdfParams, KeyEnvelope, PlatformEnvelope, PlatformKey, SealedBox, UserEnvelope};
pub use error::{CryptoError, CryptoResult, OPAQUE_FAILURE};
pub use identity::{GeneratedIdentity, IdentityKeyManager, PrivateKey, PublicKey};
