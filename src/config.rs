// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once at startup. Secrets end up in immutable
//! structs shared through `AppState`; nothing is re-read per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root of the JSON store, audit log and consent ledger | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SDE_PLATFORM_SECRET` | Base64 32-byte outer envelope key | Required |
//! | `SDE_EMAIL_PEPPER` | Pepper for the email lookup index | Required |
//! | `SDE_TOKEN_SIGNING_KEY_PATH` | PKCS#8 PEM P-256 signing key | Required |
//! | `SDE_TOKEN_VERIFY_KEY_PATH` | PEM P-256 verification key | Required |
//! | `SDE_TOKEN_ISSUER` | `iss` claim of capability tokens | `sde-platform` |
//! | `SDE_AUTH_TOKEN_TTL_MINUTES` | Auth token lifetime | `60` |
//! | `SDE_ADMIN_API_KEY` | Key exchanged for an admin token | Unset (admin API off) |
//! | `SDE_ORACLE_URL` / `SDE_ORACLE_API_KEY` | Compliance oracle | Unset (fallback text) |
//! | `SDE_MAIL_RELAY_URL` / `SDE_MAIL_RELAY_API_KEY` / `SDE_MAIL_SENDER` | Mail relay | Unset (log only) |
//! | `SDE_OUTBOUND_TIMEOUT_SECS` | Oracle and mail timeout | `10` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::auth::tokens::DEFAULT_ISSUER;
use crate::crypto::{identifiers, CryptoResult, PlatformKey};
use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const PLATFORM_SECRET_ENV: &str = "SDE_PLATFORM_SECRET";
pub const EMAIL_PEPPER_ENV: &str = "SDE_EMAIL_PEPPER";
pub const TOKEN_SIGNING_KEY_PATH_ENV: &str = "SDE_TOKEN_SIGNING_KEY_PATH";
pub const TOKEN_VERIFY_KEY_PATH_ENV: &str = "SDE_TOKEN_VERIFY_KEY_PATH";
pub const TOKEN_ISSUER_ENV: &str = "SDE_TOKEN_ISSUER";
pub const AUTH_TOKEN_TTL_ENV: &str = "SDE_AUTH_TOKEN_TTL_MINUTES";
pub const ADMIN_API_KEY_ENV: &str = "SDE_ADMIN_API_KEY";
pub const ORACLE_URL_ENV: &str = "SDE_ORACLE_URL";
pub const ORACLE_API_KEY_ENV: &str = "SDE_ORACLE_API_KEY";
pub const MAIL_RELAY_URL_ENV: &str = "SDE_MAIL_RELAY_URL";
pub const MAIL_RELAY_API_KEY_ENV: &str = "SDE_MAIL_RELAY_API_KEY";
pub const MAIL_SENDER_ENV: &str = "SDE_MAIL_SENDER";
pub const OUTBOUND_TIMEOUT_ENV: &str = "SDE_OUTBOUND_TIMEOUT_SECS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_AUTH_TOKEN_TTL_MINUTES: u64 = 60;
pub const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAIL_SENDER: &str = "no-reply@sde.local";

/// Shortest accepted email pepper, in bytes.
pub const MIN_PEPPER_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Process-wide secrets. Immutable after startup.
pub struct PlatformSecrets {
    pub platform_key: PlatformKey,
    email_pepper: Zeroizing<Vec<u8>>,
}

impl PlatformSecrets {
    pub fn new(platform_key: PlatformKey, email_pepper: Vec<u8>) -> Self {
        Self {
            platform_key,
            email_pepper: Zeroizing::new(email_pepper),
        }
    }

    /// Keyed lookup digest for an email address.
    pub fn email_index(&self, email: &str) -> CryptoResult<String> {
        identifiers::email_index(email, &self.email_pepper)
    }
}

impl std::fmt::Debug for PlatformSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlatformSecrets(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub url: Url,
    pub api_key: Option<String>,
    pub sender: String,
}

#[derive(Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub secrets: PlatformSecrets,
    pub token_signing_key_path: PathBuf,
    pub token_verify_key_path: PathBuf,
    pub token_issuer: String,
    pub auth_token_ttl: Duration,
    pub admin_api_key: Option<String>,
    pub oracle: Option<OracleConfig>,
    pub mail_relay: Option<MailRelayConfig>,
    pub outbound_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let platform_key = PlatformKey::from_base64(&required(PLATFORM_SECRET_ENV)?).map_err(|e| {
            ConfigError::Invalid {
                name: PLATFORM_SECRET_ENV,
                reason: e.to_string(),
            }
        })?;

        let pepper = required(EMAIL_PEPPER_ENV)?.into_bytes();
        if pepper.len() < MIN_PEPPER_LEN {
            return Err(ConfigError::Invalid {
                name: EMAIL_PEPPER_ENV,
                reason: format!("must be at least {MIN_PEPPER_LEN} bytes"),
            });
        }

        let port = match optional(PORT_ENV) {
            Some(v) => parse_number(PORT_ENV, &v)?,
            None => DEFAULT_PORT,
        };

        let ttl_minutes: u64 = match optional(AUTH_TOKEN_TTL_ENV) {
            Some(v) => parse_number(AUTH_TOKEN_TTL_ENV, &v)?,
            None => DEFAULT_AUTH_TOKEN_TTL_MINUTES,
        };
        if ttl_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: AUTH_TOKEN_TTL_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let timeout_secs: u64 = match optional(OUTBOUND_TIMEOUT_ENV) {
            Some(v) => parse_number(OUTBOUND_TIMEOUT_ENV, &v)?,
            None => DEFAULT_OUTBOUND_TIMEOUT_SECS,
        };

        let oracle = match optional(ORACLE_URL_ENV) {
            Some(url) => Some(OracleConfig {
                url: parse_url(ORACLE_URL_ENV, &url)?,
                api_key: required(ORACLE_API_KEY_ENV)?,
            }),
            None => None,
        };

        let mail_relay = match optional(MAIL_RELAY_URL_ENV) {
            Some(url) => Some(MailRelayConfig {
                url: parse_url(MAIL_RELAY_URL_ENV, &url)?,
                api_key: optional(MAIL_RELAY_API_KEY_ENV),
                sender: optional(MAIL_SENDER_ENV).unwrap_or_else(|| DEFAULT_MAIL_SENDER.to_string()),
            }),
            None => None,
        };

        Ok(Self {
            data_dir: PathBuf::from(optional(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string())),
            host: optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            secrets: PlatformSecrets::new(platform_key, pepper),
            token_signing_key_path: PathBuf::from(required(TOKEN_SIGNING_KEY_PATH_ENV)?),
            token_verify_key_path: PathBuf::from(required(TOKEN_VERIFY_KEY_PATH_ENV)?),
            token_issuer: optional(TOKEN_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            auth_token_ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)),
            admin_api_key: optional(ADMIN_API_KEY_ENV),
            oracle,
            mail_relay,
            outbound_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
