// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sovereign identity generation.
//!
//! A fresh BIP-39 phrase is generated per registration and one secp256k1
//! keypair is derived from it along [`DERIVATION_PATH`]. The address is the
//! EVM-style keccak address of that key and the DID embeds it.
//!
//! Nothing here touches storage. The phrase is handed back to the caller
//! exactly once and the private key only leaves this module wrapped by
//! [`super::envelope`].

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::{
    coins_bip39::{English, Mnemonic},
    MnemonicBuilder,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

use super::error::{CryptoError, CryptoResult};

/// BIP-32 path of the single identity key.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Prefix of every identity DID.
pub const DID_PREFIX: &str = "did:sde:mainnet:";

/// 15 words carry 160 bits of entropy.
pub const MNEMONIC_WORD_COUNT: usize = 15;

/// Length of an uncompressed SEC1 public key.
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

/// A secp256k1 private key held only in memory.
///
/// The inner key is zeroized on drop and never serialized.
pub struct PrivateKey(k256::SecretKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 byte scalar, got {}",
                bytes.len()
            )));
        }
        k256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("scalar out of range".to_string()))
    }

    /// Raw scalar bytes, wiped when the returned buffer drops.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.0.to_bytes().to_vec())
    }

    pub(crate) fn as_secret(&self) -> &k256::SecretKey {
        &self.0
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A secp256k1 public key. Always derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    pub fn from_sec1_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("not a valid SEC1 point".to_string()))
    }

    /// 65 byte `0x04 || x || y` encoding.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    pub(crate) fn as_inner(&self) -> &k256::PublicKey {
        &self.0
    }
}

/// Output of [`IdentityKeyManager::generate_identity`].
pub struct GeneratedIdentity {
    pub mnemonic: Zeroizing<String>,
    pub did: String,
    pub address: String,
    pub private_key: PrivateKey,
}

impl GeneratedIdentity {
    pub fn public_key(&self) -> PublicKey {
        IdentityKeyManager::derive_public_key(&self.private_key)
    }
}

impl std::fmt::Debug for GeneratedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedIdentity")
            .field("did", &self.did)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Stateless identity derivation.
pub struct IdentityKeyManager;

impl IdentityKeyManager {
    /// Generate a new phrase and derive the identity from it.
    pub fn generate_identity() -> CryptoResult<GeneratedIdentity> {
        let mut rng = rand::thread_rng();
        let mnemonic = Mnemonic::<English>::new_with_count(&mut rng, MNEMONIC_WORD_COUNT)
            .map_err(|e| CryptoError::Mnemonic(e.to_string()))?;
        let phrase = Zeroizing::new(mnemonic.to_phrase());
        Self::recover_identity(&phrase)
    }

    /// Re-derive an identity from its recovery phrase.
    ///
    /// Deterministic: the same phrase always yields the same key and DID.
    pub fn recover_identity(phrase: &str) -> CryptoResult<GeneratedIdentity> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        );

        let signer = MnemonicBuilder::<English>::default()
            .phrase(normalized.as_str())
            .derivation_path(DERIVATION_PATH)
            .map_err(|e| CryptoError::Mnemonic(e.to_string()))?
            .build()
            .map_err(|e| CryptoError::Mnemonic(e.to_string()))?;

        let scalar = Zeroizing::new(signer.credential().to_bytes().to_vec());
        let private_key = PrivateKey::from_bytes(&scalar)?;
        let address = Self::address_from_public_key(&Self::derive_public_key(&private_key));

        Ok(GeneratedIdentity {
            mnemonic: Zeroizing::new(normalized.to_string()),
            did: Self::did_for_address(&address),
            address,
            private_key,
        })
    }

    pub fn derive_public_key(private_key: &PrivateKey) -> PublicKey {
        PublicKey(private_key.as_secret().public_key())
    }

    /// EIP-55 checksummed address: last 20 bytes of keccak256(x || y).
    pub fn address_from_public_key(public_key: &PublicKey) -> String {
        let uncompressed = public_key.to_uncompressed();
        let hash = keccak256(&uncompressed[1..]);
        Address::from_slice(&hash[12..]).to_checksum(None)
    }

    pub fn did_for_address(address: &str) -> String {
        format!("{DID_PREFIX}{address}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_PHRASE: &str = "test test test test test test test test test test test junk";
    const KNOWN_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const KNOWN_KEY_HEX: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn generated_identity_has_fifteen_words_and_did() {
        let identity = IdentityKeyManager::generate_identity().unwrap();

        assert_eq!(identity.mnemonic.split(' ').count(), MNEMONIC_WORD_COUNT);
        assert!(identity.address.starts_with("0x"));
        assert_eq!(identity.address.len(), 42);
        assert_eq!(identity.did, format!("did:sde:mainnet:{}", identity.address));
    }

    #[test]
    fn identities_are_unique() {
        let a = IdentityKeyManager::generate_identity().unwrap();
        let b = IdentityKeyManager::generate_identity().unwrap();
        assert_ne!(a.did, b.did);
        assert_ne!(*a.mnemonic, *b.mnemonic);
    }

    #[test]
    fn recovery_matches_known_vector() {
        let identity = IdentityKeyManager::recover_identity(KNOWN_PHRASE).unwrap();

        assert_eq!(identity.address, KNOWN_ADDRESS);
        assert_eq!(identity.did, format!("{DID_PREFIX}{KNOWN_ADDRESS}"));
        assert_eq!(alloy::hex::encode(&*identity.private_key.to_bytes()), KNOWN_KEY_HEX);
    }

    #[test]
    fn recovery_of_generated_phrase_is_identical() {
        let generated = IdentityKeyManager::generate_identity().unwrap();
        let recovered = IdentityKeyManager::recover_identity(&generated.mnemonic).unwrap();

        assert_eq!(generated.did, recovered.did);
        assert_eq!(generated.private_key, recovered.private_key);
    }

    #[test]
    fn recovery_tolerates_whitespace_and_case() {
        let messy = format!("  {}  ", KNOWN_PHRASE.to_uppercase().replace(' ', "   "));
        let identity = IdentityKeyManager::recover_identity(&messy).unwrap();
        assert_eq!(identity.address, KNOWN_ADDRESS);
    }

    #[test]
    fn invalid_phrase_is_rejected() {
        let err = IdentityKeyManager::recover_identity("not a real mnemonic phrase").unwrap_err();
        assert!(matches!(err, CryptoError::Mnemonic(_)));
    }

    #[test]
    fn derive_public_key_is_deterministic() {
        let identity = IdentityKeyManager::generate_identity().unwrap();

        let first = IdentityKeyManager::derive_public_key(&identity.private_key);
        let second = IdentityKeyManager::derive_public_key(&identity.private_key);
        assert_eq!(first, second);
        assert_eq!(first.to_uncompressed().len(), UNCOMPRESSED_PUBLIC_KEY_LEN);
        assert_eq!(
            IdentityKeyManager::address_from_public_key(&first),
            identity.address
        );
    }

    #[test]
    fn private_key_round_trips_through_bytes() {
        let identity = IdentityKeyManager::generate_identity().unwrap();
        let bytes = identity.private_key.to_bytes();
        let restored = PrivateKey::from_bytes(&bytes).unwrap();
        assert_eq!(restored, identity.private_key);
    }

    #[test]
    fn private_key_rejects_bad_lengths_and_zero() {
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let identity = IdentityKeyManager::generate_identity().unwrap();
        let rendered = format!("{identity:?} {:?}", identity.private_key);
        assert!(!rendered.contains(identity.mnemonic.as_str()));
        assert!(rendered.contains("redacted"));
    }
}
