// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors raised by the key-custody and vault crypto routines.

/// Generic message shown for envelope and vault failures.
///
/// Wrong password, wrong key and tampered ciphertext must look identical
/// to a caller.
pub const OPAQUE_FAILURE: &str = "invalid credentials or corrupt data";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// An envelope layer failed tag verification (wrong password or secret).
    #[error("invalid credentials or corrupt data")]
    Authentication,

    /// A vault ciphertext failed to decrypt (tampered or wrong key).
    #[error("invalid credentials or corrupt data")]
    Decryption,

    /// Transport encoding was malformed. Raised before any crypto runs.
    #[error("malformed encoding: {0}")]
    Encoding(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("mnemonic error: {0}")]
    Mnemonic(String),
}

impl CryptoError {
    /// True for failures whose cause must stay hidden from the caller.
    pub fn is_opaque(&self) -> bool {
        matches!(self, CryptoError::Authentication | CryptoError::Decryption)
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
