// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Two-layer private key envelope.
//!
//! ```text
//! Raw ──wrap(password)──▶ UserEnvelope ──wrap_platform(secret)──▶ PlatformEnvelope
//! ```
//!
//! The user layer is AES-256-GCM under an Argon2id key derived from the
//! owner's password. The platform layer is AES-256-GCM under the process-wide
//! [`PlatformKey`]. Each layer binds its own associated data, so a blob from
//! one layer never opens as the other. Reading a stored key always runs
//! `unwrap_platform` before `unwrap`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::error::{CryptoError, CryptoResult};
use super::identity::PrivateKey;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const SALT_LEN: usize = 16;

pub const ENVELOPE_VERSION: u8 = 1;

const USER_LAYER_AAD: &[u8] = b"sde/envelope/user/v1";
const PLATFORM_LAYER_AAD: &[u8] = b"sde/envelope/platform/v1";

/// Hex (de)serialization for byte fields.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&alloy::hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        alloy::hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Output of one AEAD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub tag: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Argon2id cost parameters, stored with each envelope so they can be
/// raised later without breaking existing envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

#[cfg(test)]
impl KdfParams {
    /// Minimal costs so unit tests stay fast.
    pub(crate) fn for_tests() -> Self {
        Self {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// Private key sealed under the owner's password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub version: u8,
    pub kdf: KdfParams,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(flatten)]
    pub sealed: SealedBox,
}

/// User envelope sealed again under the platform secret. This is the only
/// form that is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEnvelope {
    pub version: u8,
    #[serde(flatten)]
    pub sealed: SealedBox,
}

/// The process-wide static wrapping secret.
pub struct PlatformKey(Zeroizing<[u8; KEY_LEN]>);

impl PlatformKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "platform secret must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parse a standard base64 secret as provisioned in the environment.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = Zeroizing::new(
            Base64::decode_vec(encoded.trim())
                .map_err(|e| CryptoError::Encoding(format!("platform secret: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Seal arbitrary bytes under the platform secret. `context` is bound
    /// as associated data and must be presented again to open.
    pub fn seal(&self, plaintext: &[u8], context: &[u8]) -> CryptoResult<SealedBox> {
        seal_aes_gcm(&self.0[..], plaintext, context)
    }

    pub fn open(&self, sealed: &SealedBox, context: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        open_aes_gcm(&self.0[..], sealed, context)
    }
}

impl std::fmt::Debug for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlatformKey(<redacted>)")
    }
}

/// Wraps and unwraps identity private keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEnvelope {
    kdf: KdfParams,
}

impl KeyEnvelope {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Raw → UserWrapped.
    pub fn wrap(&self, private_key: &PrivateKey, password: &str) -> CryptoResult<UserEnvelope> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = derive_user_key(password, &salt, &self.kdf)?;
        let sealed = seal_aes_gcm(&key[..], &private_key.to_bytes(), USER_LAYER_AAD)?;

        Ok(UserEnvelope {
            version: ENVELOPE_VERSION,
            kdf: self.kdf,
            salt,
            sealed,
        })
    }

    /// UserWrapped → Raw. Fails with `Authentication` on a wrong password or
    /// any corruption of the envelope.
    pub fn unwrap(&self, envelope: &UserEnvelope, password: &str) -> CryptoResult<PrivateKey> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::Encoding(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let key = derive_user_key(password, &envelope.salt, &envelope.kdf)?;
        let scalar = open_aes_gcm(&key[..], &envelope.sealed, USER_LAYER_AAD)?;
        PrivateKey::from_bytes(&scalar).map_err(|_| CryptoError::Authentication)
    }

    /// UserWrapped → PlatformWrapped.
    pub fn wrap_platform(
        &self,
        envelope: &UserEnvelope,
        platform_key: &PlatformKey,
    ) -> CryptoResult<PlatformEnvelope> {
        let inner = Zeroizing::new(
            serde_json::to_vec(envelope).map_err(|e| CryptoError::Encoding(e.to_string()))?,
        );
        Ok(PlatformEnvelope {
            version: ENVELOPE_VERSION,
            sealed: seal_aes_gcm(&platform_key.0[..], &inner, PLATFORM_LAYER_AAD)?,
        })
    }

    /// PlatformWrapped → UserWrapped.
    pub fn unwrap_platform(
        &self,
        envelope: &PlatformEnvelope,
        platform_key: &PlatformKey,
    ) -> CryptoResult<UserEnvelope> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::Encoding(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let inner = open_aes_gcm(&platform_key.0[..], &envelope.sealed, PLATFORM_LAYER_AAD)?;
        serde_json::from_slice(&inner)
            .map_err(|e| CryptoError::Encoding(format!("inner envelope: {e}")))
    }

    /// Both layers in storage order.
    pub fn seal(
        &self,
        private_key: &PrivateKey,
        password: &str,
        platform_key: &PlatformKey,
    ) -> CryptoResult<PlatformEnvelope> {
        let user = self.wrap(private_key, password)?;
        self.wrap_platform(&user, platform_key)
    }

    /// Both layers in read order.
    pub fn open(
        &self,
        envelope: &PlatformEnvelope,
        password: &str,
        platform_key: &PlatformKey,
    ) -> CryptoResult<PrivateKey> {
        let user = self.unwrap_platform(envelope, platform_key)?;
        self.unwrap(&user, password)
    }
}

fn derive_user_key(
    password: &str,
    salt: &[u8],
    kdf: &KdfParams,
) -> CryptoResult<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn seal_aes_gcm(key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBox> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut output = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::InvalidKey("AEAD encryption failed".to_string()))?;

    // aes-gcm appends the tag; store it separately.
    let tag = output.split_off(output.len() - TAG_LEN);
    Ok(SealedBox {
        nonce: nonce.to_vec(),
        tag,
        ciphertext: output,
    })
}

fn open_aes_gcm(key: &[u8], sealed: &SealedBox, aad: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if sealed.nonce.len() != NONCE_LEN || sealed.tag.len() != TAG_LEN {
        return Err(CryptoError::Authentication);
    }
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&sealed.ciphertext);
    combined.extend_from_slice(&sealed.tag);

    cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &combined,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)
}
