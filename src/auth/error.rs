// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::binder::BindError;
use super::jwks::KeyFetchError;
use super::validator::ValidationError;

/// Request-level authentication failure.
///
/// Client-facing messages never include internal detail. Variants that
/// carry a `String` keep it for logging only.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Gateway configuration cannot serve this request
    #[error("Authentication is not configured correctly")]
    Configuration(String),
    /// No assertion header on the request
    #[error("Access assertion header is required")]
    NoAssertion,
    /// Assertion is not a well-formed token
    #[error("Token is malformed")]
    Malformed,
    /// Token algorithm is not accepted
    #[error("Token algorithm is not accepted")]
    UnsupportedAlgorithm,
    /// No signing key for the token could be obtained
    #[error("No signing key available for this token")]
    KeyUnavailable,
    /// Token signature is invalid
    #[error("Token signature is invalid")]
    SignatureInvalid,
    /// Audience or issuer does not match
    #[error("Token {0} is invalid")]
    ClaimMismatch(&'static str),
    /// Token has no subject email
    #[error("Token has no subject email")]
    MissingSubject,
    /// Token has expired
    #[error("Token has expired")]
    Expired,
    /// Token is not yet valid
    #[error("Token is not yet valid")]
    NotYetValid,
    /// Identity store failed or timed out
    #[error("Identity store is temporarily unavailable")]
    StoreUnavailable(String),
    /// Internal error
    #[error("Internal authentication error")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "configuration_error",
            AuthError::NoAssertion => "no_assertion",
            AuthError::Malformed => "malformed_token",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::KeyUnavailable => "key_unavailable",
            AuthError::SignatureInvalid => "invalid_signature",
            AuthError::ClaimMismatch(_) => "claim_mismatch",
            AuthError::MissingSubject => "missing_subject",
            AuthError::Expired => "token_expired",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NoAssertion
            | AuthError::Malformed
            | AuthError::UnsupportedAlgorithm
            | AuthError::KeyUnavailable
            | AuthError::SignatureInvalid
            | AuthError::ClaimMismatch(_)
            | AuthError::MissingSubject
            | AuthError::Expired
            | AuthError::NotYetValid => StatusCode::UNAUTHORIZED,
            AuthError::Configuration(_)
            | AuthError::StoreUnavailable(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal detail for logs, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AuthError::Configuration(detail)
            | AuthError::StoreUnavailable(detail)
            | AuthError::Internal(detail) => Some(detail),
            _ => None,
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Malformed => AuthError::Malformed,
            ValidationError::UnsupportedAlgorithm(_) => AuthError::UnsupportedAlgorithm,
            ValidationError::KeyUnavailable(KeyFetchError::InvalidEndpoint(detail)) => {
                AuthError::Configuration(detail)
            }
            ValidationError::KeyUnavailable(_) => AuthError::KeyUnavailable,
            ValidationError::SignatureInvalid => AuthError::SignatureInvalid,
            ValidationError::ClaimMismatch(claim) => AuthError::ClaimMismatch(claim),
            ValidationError::MissingSubject => AuthError::MissingSubject,
            ValidationError::Expired => AuthError::Expired,
            ValidationError::NotYetValid => AuthError::NotYetValid,
        }
    }
}

impl From<BindError> for AuthError {
    fn from(e: BindError) -> Self {
        match e {
            BindError::StoreUnavailable(detail) => AuthError::StoreUnavailable(detail),
            BindError::Credential => AuthError::Internal(BindError::Credential.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
