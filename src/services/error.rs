// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the service layer.

use crate::auth::TokenError;
use crate::crypto::CryptoError;
use crate::storage::{LedgerError, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ServiceError::NotFound(what),
            StorageError::AlreadyExists(what) => ServiceError::Conflict(format!("{what} already exists")),
            StorageError::PermissionDenied { resource, .. } => {
                ServiceError::Forbidden(format!("not the owner of this {resource}"))
            }
            other => ServiceError::Storage(other),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(id) => ServiceError::NotFound(format!("consent request {id}")),
            LedgerError::AlreadyExists(id) => ServiceError::Conflict(format!("consent request {id}")),
            LedgerError::InvalidTransition { from, .. } => {
                ServiceError::InvalidState(format!("consent request is already {from}"))
            }
            other => ServiceError::Ledger(other),
        }
    }
}
