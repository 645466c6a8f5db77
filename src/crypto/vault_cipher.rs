// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner-targeted hybrid encryption for vault entries (ECIES on secp256k1).
//!
//! ## Wire layout
//!
//! ```text
//! ephemeral_public_key (65, uncompressed) || nonce (16) || tag (16) || ciphertext
//! ```
//!
//! The symmetric key is HKDF-SHA256 (no salt, empty info) over
//! `ephemeral_public_key || shared_point`, both uncompressed, and the AEAD is
//! AES-256-GCM with a 16 byte nonce. This matches the layout produced by the
//! common `eciespy` tooling so existing vault rows stay readable.
//!
//! Stored and transported ciphertexts are standard base64. Decoding errors are
//! reported as [`CryptoError::Encoding`] before any key agreement runs.

use aes_gcm::{
    aead::{consts::U16, Aead, KeyInit},
    aes::Aes256,
    AesGcm, Nonce,
};
use base64ct::{Base64, Encoding};
use hkdf::Hkdf;
use k256::elliptic_curve::rand_core::OsRng;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::error::{CryptoError, CryptoResult};
use super::identity::{PrivateKey, PublicKey, UNCOMPRESSED_PUBLIC_KEY_LEN};

pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Smallest well-formed blob (empty plaintext).
pub const MIN_CIPHERTEXT_LEN: usize = UNCOMPRESSED_PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN;

type EciesAead = AesGcm<Aes256, U16>;

/// Encrypt `plaintext` so only the holder of `public_key`'s private key can
/// read it. Every call uses a fresh ephemeral key and nonce.
pub fn encrypt_for_owner(public_key: &PublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let ephemeral = SecretKey::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);

    let key = derive_symmetric_key(&ephemeral, ephemeral_public.as_bytes(), public_key)?;
    let cipher =
        EciesAead::new_from_slice(&key[..]).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut sealed = cipher
        .encrypt(Nonce::<U16>::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::InvalidKey("AEAD encryption failed".to_string()))?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    let mut out = Vec::with_capacity(MIN_CIPHERTEXT_LEN + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse of [`encrypt_for_owner`].
///
/// Any structural or authentication failure is reported as
/// [`CryptoError::Decryption`] so a wrong key and a tampered blob look the same.
pub fn decrypt_for_owner(private_key: &PrivateKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::Decryption);
    }

    let (ephemeral_bytes, rest) = ciphertext.split_at(UNCOMPRESSED_PUBLIC_KEY_LEN);
    let (nonce, rest) = rest.split_at(NONCE_LEN);
    let (tag, body) = rest.split_at(TAG_LEN);

    let ephemeral_public =
        PublicKey::from_sec1_bytes(ephemeral_bytes).map_err(|_| CryptoError::Decryption)?;
    let shared = shared_point(private_key.as_secret(), &ephemeral_public);
    let key = hkdf_key(ephemeral_bytes, &shared)?;

    let cipher =
        EciesAead::new_from_slice(&key[..]).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut combined = Vec::with_capacity(body.len() + TAG_LEN);
    combined.extend_from_slice(body);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::<U16>::from_slice(nonce), combined.as_slice())
        .map_err(|_| CryptoError::Decryption)
}

/// Standard base64 used for storage and tokens.
pub fn encode_transport(ciphertext: &[u8]) -> String {
    Base64::encode_string(ciphertext)
}

pub fn decode_transport(encoded: &str) -> CryptoResult<Vec<u8>> {
    Base64::decode_vec(encoded.trim()).map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Decode then decrypt. Encoding errors surface before any crypto runs.
pub fn decrypt_transport(private_key: &PrivateKey, encoded: &str) -> CryptoResult<Vec<u8>> {
    let ciphertext = decode_transport(encoded)?;
    decrypt_for_owner(private_key, &ciphertext)
}

fn derive_symmetric_key(
    ephemeral: &SecretKey,
    ephemeral_public: &[u8],
    recipient: &PublicKey,
) -> CryptoResult<Zeroizing<[u8; KEY_LEN]>> {
    let shared = shared_point(ephemeral, recipient);
    hkdf_key(ephemeral_public, &shared)
}

/// Full uncompressed ECDH point `secret * public`.
fn shared_point(secret: &SecretKey, public: &PublicKey) -> Zeroizing<Vec<u8>> {
    let point = (public.as_inner().to_projective() * *secret.to_nonzero_scalar()).to_affine();
    Zeroizing::new(point.to_encoded_point(false).as_bytes().to_vec())
}

fn hkdf_key(ephemeral_public: &[u8], shared: &[u8]) -> CryptoResult<Zeroizing<[u8; KEY_LEN]>> {
    let mut master = Zeroizing::new(Vec::with_capacity(ephemeral_public.len() + shared.len()));
    master.extend_from_slice(ephemeral_public);
    master.extend_from_slice(shared);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Hkdf::<Sha256>::new(None, &master)
        .expand(&[], &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
