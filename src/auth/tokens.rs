// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed, time-boxed capability tokens.
//!
//! Tokens are ES256 JWTs signed with a platform keypair that is separate from
//! every identity key. The same mechanism carries two flavors, told apart by
//! the `token_use` claim:
//!
//! - `auth`: subject is a user, organization or admin id plus a `role` claim
//! - `pii`: subject is the requesting organization and the claims embed an
//!   already-encrypted vault bundle
//!
//! Expiry is checked here on every verification (`now < exp`, no leeway).
//! There is no revocation list; expiry is the only lifecycle bound.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Role;

pub const DEFAULT_ISSUER: &str = "sde-platform";

/// Claim names owned by the service. Caller claims never override them.
const RESERVED_CLAIMS: [&str; 5] = ["sub", "iat", "exp", "iss", "jti"];

pub const TOKEN_USE_CLAIM: &str = "token_use";
pub const ROLE_CLAIM: &str = "role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Auth,
    Pii,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Auth => "auth",
            TokenUse::Pii => "pii",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token key material: {0}")]
    Key(String),
}

/// Verified claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl TokenClaims {
    pub fn token_use(&self) -> Option<TokenUse> {
        self.claims
            .get(TOKEN_USE_CLAIM)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn role(&self) -> Option<Role> {
        self.claims
            .get(ROLE_CLAIM)
            .and_then(Value::as_str)
            .and_then(Role::from_str)
    }
}

/// Issues and verifies capability tokens. Built once at startup; read-only.
pub struct CapabilityTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl CapabilityTokenService {
    /// Load a P-256 keypair: PKCS#8 private key and SPKI public key, both PEM.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding_key =
            EncodingKey::from_ec_pem(private_pem).map_err(|e| TokenError::Key(e.to_string()))?;
        let decoding_key =
            DecodingKey::from_ec_pem(public_pem).map_err(|e| TokenError::Key(e.to_string()))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: DEFAULT_ISSUER.to_string(),
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign `{sub, iat, exp = iat + ttl, iss, jti} ∪ claims`.
    pub fn issue(
        &self,
        subject: &str,
        mut claims: Map<String, Value>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        for reserved in RESERVED_CLAIMS {
            claims.remove(reserved);
        }

        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| TokenError::Signing("ttl out of range".to_string()))?;
        let iat = Utc::now().timestamp();
        let exp = iat
            .checked_add(ttl_secs)
            .ok_or_else(|| TokenError::Signing("ttl out of range".to_string()))?;

        let token_claims = TokenClaims {
            sub: subject.to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            claims,
        };

        encode(&Header::new(Algorithm::ES256), &token_claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, issuer and expiry.
    ///
    /// Signature and format problems are `Invalid`; a valid but stale token
    /// is `Expired`. Neither grants any trust.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::ES256);
        // Expiry is enforced below with a strict `now < exp`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "capability token rejected");
            TokenError::Invalid
        })?;

        if Utc::now().timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Auth flavor: no payload beyond the role.
    pub fn issue_auth_token(
        &self,
        subject: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let mut claims = Map::new();
        claims.insert(TOKEN_USE_CLAIM.into(), Value::from(TokenUse::Auth.as_str()));
        claims.insert(ROLE_CLAIM.into(), Value::from(role.to_string()));
        self.issue(subject, claims, ttl)
    }

    /// PII flavor: `payload` is embedded as-is next to `token_use = "pii"`.
    pub fn issue_pii_token(
        &self,
        subject: &str,
        payload: Map<String, Value>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let mut claims = payload;
        claims.insert(TOKEN_USE_CLAIM.into(), Value::from(TokenUse::Pii.as_str()));
        self.issue(subject, claims, ttl)
    }

    /// Verify and require a particular flavor.
    pub fn verify_use(&self, token: &str, expected: TokenUse) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_use() != Some(expected) {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for CapabilityTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTokenService")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_keys {
    pub const SIGNING_KEY: &str = include_str!("../../tests/fixtures/token_signing_key.pem");
    pub const VERIFY_KEY: &str = include_str!("../../tests/fixtures/token_verify_key.pem");
    pub const UNRELATED_VERIFY_KEY: &str =
        include_str!("../../tests/fixtures/unrelated_verify_key.pem");

    pub fn service() -> super::CapabilityTokenService {
        super::CapabilityTokenService::from_pem(SIGNING_KEY.as_bytes(), VERIFY_KEY.as_bytes())
            .expect("fixture keys load")
    }
}
