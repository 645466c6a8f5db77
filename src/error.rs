// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::TokenError;
use crate::crypto::{CryptoError, OPAQUE_FAILURE};
use crate::services::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500 with a fixed message; the cause is logged, never returned.
    pub fn internal(cause: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Crypto(CryptoError::Authentication | CryptoError::Decryption) => {
                Self::unauthorized(OPAQUE_FAILURE)
            }
            ServiceError::Crypto(CryptoError::Encoding(msg)) => {
                Self::bad_request(format!("malformed encoding: {msg}"))
            }
            ServiceError::Token(TokenError::Invalid) => Self::unauthorized("token is invalid"),
            ServiceError::Token(TokenError::Expired) => Self::unauthorized("token has expired"),
            ServiceError::Forbidden(msg) => Self::forbidden(msg),
            ServiceError::InvalidState(msg) | ServiceError::Conflict(msg) => Self::conflict(msg),
            ServiceError::NotFound(msg) => Self::not_found(msg),
            ServiceError::Validation(msg) => Self::unprocessable(msg),
            other => Self::internal(&other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use crate::storage::StorageError;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::Crypto(CryptoError::Authentication), StatusCode::UNAUTHORIZED),
            (ServiceError::Crypto(CryptoError::Decryption), StatusCode::UNAUTHORIZED),
            (ServiceError::Crypto(CryptoError::Encoding("x".into())), StatusCode::BAD_REQUEST),
            (ServiceError::Token(TokenError::Invalid), StatusCode::UNAUTHORIZED),
            (ServiceError::Token(TokenError::Expired), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("f".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidState("s".into()), StatusCode::CONFLICT),
            (ServiceError::Conflict("c".into()), StatusCode::CONFLICT),
            (ServiceError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (ServiceError::Validation("v".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::Storage(StorageError::NotInitialized), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ServiceError::Crypto(CryptoError::KeyDerivation("argon2".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn credential_failures_share_one_message() {
        let auth = ApiError::from(ServiceError::Crypto(CryptoError::Authentication));
        let decrypt = ApiError::from(ServiceError::Crypto(CryptoError::Decryption));
        assert_eq!(auth.message, decrypt.message);
        assert_eq!(auth.message, OPAQUE_FAILURE);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(ServiceError::Storage(StorageError::Serialization(
            "/data/identities/secret-path.json".into(),
        )));
        assert_eq!(err.message, "internal server error");
    }
}
