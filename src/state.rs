// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.
//!
//! Built once at startup and cloned into every handler. All members are
//! read-only or internally synchronised.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CapabilityTokenService, TokenError};
use crate::config::{AppConfig, PlatformSecrets};
use crate::crypto::KeyEnvelope;
use crate::providers::{
    ComplianceOracle, DisabledOracle, HttpOracle, LogNotifier, MailRelayNotifier, Notifier,
    NotifyError, OracleError,
};
use crate::storage::{ConsentLedger, FileStore, LedgerError, StorageError, StoragePaths};

pub const DEFAULT_AUTH_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage initialization failed: {0}")]
    Storage(#[from] StorageError),

    #[error("consent ledger failed to open: {0}")]
    Ledger(#[from] LedgerError),

    #[error("failed to read {path}: {source}")]
    KeyFile {
        path: String,
        source: std::io::Error,
    },

    #[error("capability token keys rejected: {0}")]
    Token(#[from] TokenError),

    #[error("compliance oracle setup failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("mail relay setup failed: {0}")]
    Notify(#[from] NotifyError),
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub ledger: Arc<ConsentLedger>,
    pub secrets: Arc<PlatformSecrets>,
    pub tokens: Arc<CapabilityTokenService>,
    pub oracle: Arc<dyn ComplianceOracle>,
    pub notifier: Arc<dyn Notifier>,
    pub key_envelope: KeyEnvelope,
    pub auth_token_ttl: Duration,
    pub admin_api_key: Option<Arc<str>>,
}

impl AppState {
    /// State with the oracle disabled and notifications logged only.
    pub fn new(
        store: FileStore,
        ledger: ConsentLedger,
        secrets: PlatformSecrets,
        tokens: CapabilityTokenService,
    ) -> Self {
        Self {
            store: Arc::new(store),
            ledger: Arc::new(ledger),
            secrets: Arc::new(secrets),
            tokens: Arc::new(tokens),
            oracle: Arc::new(DisabledOracle),
            notifier: Arc::new(LogNotifier),
            key_envelope: KeyEnvelope::default(),
            auth_token_ttl: DEFAULT_AUTH_TOKEN_TTL,
            admin_api_key: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ComplianceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_key_envelope(mut self, key_envelope: KeyEnvelope) -> Self {
        self.key_envelope = key_envelope;
        self
    }

    pub fn with_auth_token_ttl(mut self, ttl: Duration) -> Self {
        self.auth_token_ttl = ttl;
        self
    }

    pub fn with_admin_api_key(mut self, key: Option<String>) -> Self {
        self.admin_api_key = key.map(Arc::from);
        self
    }

    /// Open storage and the ledger, load token keys and wire collaborators.
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let mut store = FileStore::new(StoragePaths::new(&config.data_dir));
        store.initialize()?;
        let ledger = ConsentLedger::open(&store.paths().ledger_db())?;

        let signing_pem = read_key_file(&config.token_signing_key_path)?;
        let verify_pem = read_key_file(&config.token_verify_key_path)?;
        let tokens = CapabilityTokenService::from_pem(&signing_pem, &verify_pem)?
            .with_issuer(config.token_issuer.clone());

        let oracle: Arc<dyn ComplianceOracle> = match &config.oracle {
            Some(oracle) => Arc::new(HttpOracle::new(
                oracle.url.clone(),
                oracle.api_key.clone(),
                config.outbound_timeout,
            )?),
            None => {
                tracing::warn!("compliance oracle not configured; requests use fallback text");
                Arc::new(DisabledOracle)
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.mail_relay {
            Some(relay) => Arc::new(MailRelayNotifier::new(
                relay.url.clone(),
                relay.api_key.clone(),
                relay.sender.clone(),
                config.outbound_timeout,
            )?),
            None => {
                tracing::warn!("mail relay not configured; notifications are logged only");
                Arc::new(LogNotifier)
            }
        };

        if config.admin_api_key.is_none() {
            tracing::info!("admin API key not set; admin endpoints are disabled");
        }

        Ok(Self::new(store, ledger, config.secrets, tokens)
            .with_oracle(oracle)
            .with_notifier(notifier)
            .with_auth_token_ttl(config.auth_token_ttl)
            .with_admin_api_key(config.admin_api_key))
    }
}

fn read_key_file(path: &std::path::Path) -> Result<Vec<u8>, StartupError> {
    std::fs::read(path).map_err(|source| StartupError::KeyFile {
        path: path.display().to_string(),
        source,
    })
}
