// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Assertion verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Parse the header without trusting it (`kid`, `alg`)
//! 2. Reject any algorithm other than RS256, before touching keys
//! 3. Resolve the signing key for `kid`
//! 4. Verify the signature
//! 5. Check audience, issuer, validity window and subject email

use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::claims::{email_local_part, TokenClaims};
use super::jwks::{KeyFetchError, KeyResolver};

/// The only accepted signing algorithm.
pub const EXPECTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Clock skew tolerance for `exp` / `nbf` (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Why an assertion was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("token is malformed")]
    Malformed,
    #[error("token algorithm {0:?} is not accepted")]
    UnsupportedAlgorithm(String),
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(#[from] KeyFetchError),
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token claim `{0}` does not match")]
    ClaimMismatch(&'static str),
    #[error("token carries no subject email")]
    MissingSubject,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
}

/// Header fields read before the signature is checked.
#[derive(Debug, Deserialize)]
struct UntrustedHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Verifies assertions against keys from a [`KeyResolver`].
pub struct AssertionValidator {
    resolver: Arc<KeyResolver>,
    leeway: u64,
}

impl AssertionValidator {
    pub fn new(resolver: Arc<KeyResolver>) -> Self {
        Self {
            resolver,
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    pub fn resolver(&self) -> &Arc<KeyResolver> {
        &self.resolver
    }

    /// Verify `raw_token` as issued by `https://{team_domain}` for
    /// `expected_audience`.
    pub async fn verify(
        &self,
        raw_token: &str,
        team_domain: &str,
        expected_audience: &str,
    ) -> Result<TokenClaims, ValidationError> {
        let header = read_untrusted_header(raw_token)?;

        if header.alg != "RS256" {
            return Err(ValidationError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(ValidationError::Malformed)?;

        let key = self.resolver.resolve(team_domain, &kid).await?;

        let issuer = format!("https://{team_domain}");
        let mut validation = Validation::new(EXPECTED_ALGORITHM);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_audience(&[expected_audience]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let token_data = decode::<Map<String, Value>>(raw_token, &key.public_key, &validation)
            .map_err(|e| map_jwt_error(e.kind()))?;

        claims_from_verified(token_data.claims, expected_audience, Utc::now())
    }
}

/// Decode the JOSE header without verifying anything.
fn read_untrusted_header(token: &str) -> Result<UntrustedHeader, ValidationError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(ValidationError::Malformed);
    };

    let bytes = Base64UrlUnpadded::decode_vec(header).map_err(|_| ValidationError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| ValidationError::Malformed)
}

fn map_jwt_error(kind: &ErrorKind) -> ValidationError {
    match kind {
        ErrorKind::InvalidSignature => ValidationError::SignatureInvalid,
        ErrorKind::InvalidAudience => ValidationError::ClaimMismatch("aud"),
        ErrorKind::InvalidIssuer => ValidationError::ClaimMismatch("iss"),
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => ValidationError::ClaimMismatch("aud"),
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => ValidationError::ClaimMismatch("iss"),
        // An assertion without an expiry is treated as already expired.
        ErrorKind::ExpiredSignature => ValidationError::Expired,
        ErrorKind::MissingRequiredClaim(claim) if claim == "exp" => ValidationError::Expired,
        ErrorKind::ImmatureSignature => ValidationError::NotYetValid,
        _ => ValidationError::Malformed,
    }
}

fn claims_from_verified(
    raw: Map<String, Value>,
    audience: &str,
    verified_at: DateTime<Utc>,
) -> Result<TokenClaims, ValidationError> {
    let subject_email = raw
        .get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or(ValidationError::MissingSubject)?
        .to_string();

    let display_name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| email_local_part(&subject_email))
        .to_string();

    let issued_at = raw
        .get("iat")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(verified_at);

    let issuer = raw.get("iss").and_then(Value::as_str).map(str::to_string);

    Ok(TokenClaims {
        subject_email,
        display_name: Some(display_name),
        issued_at,
        audience: Some(audience.to_string()),
        issuer,
        raw,
    })
}
