// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic lookup digests and API key material.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use super::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_PREFIX: &str = "sde_";
const API_KEY_BYTES: usize = 32;

/// Canonical form of an email address: NFKC, trimmed, lower case.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Keyed lookup digest for an email address.
///
/// Equal addresses (after normalisation) always produce the same digest;
/// without the pepper the digest cannot be brute-forced from a dictionary.
pub fn email_index(email: &str, pepper: &[u8]) -> CryptoResult<String> {
    let mut mac = HmacSha256::new_from_slice(pepper)
        .map_err(|e| CryptoError::InvalidKey(format!("email pepper: {e}")))?;
    mac.update(normalize_email(email).as_bytes());
    Ok(alloy::hex::encode(mac.finalize().into_bytes()))
}

/// Fresh organization API key. Shown once; only its digest is stored.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", Base64UrlUnpadded::encode_string(&bytes))
}

pub fn hash_api_key(api_key: &str) -> String {
    alloy::hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Constant-time equality for secrets presented over the wire.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
