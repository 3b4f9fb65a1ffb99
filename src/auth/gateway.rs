// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authentication entry point.
//!
//! [`AccessGateway::authenticate`] turns request headers into a
//! [`RequestContext`]: read the assertion header, verify it, bind the
//! subject to a local identity. In bypass mode the header is ignored and
//! the configured development identity is used instead.

use axum::http::HeaderMap;

use super::binder::IdentityBinder;
use super::bypass::BypassMode;
use super::claims::RequestContext;
use super::error::AuthError;
use super::validator::AssertionValidator;

/// Header carrying the edge provider's signed assertion.
pub const ACCESS_ASSERTION_HEADER: &str = "cf-access-jwt-assertion";

/// How requests are authenticated.
pub enum AuthMode {
    /// Verify the edge assertion against the team's published keys
    Verify {
        validator: AssertionValidator,
        team_domain: String,
        audience: String,
    },
    /// Development bypass; no verification
    Bypass(BypassMode),
}

/// State of the signing key set, for readiness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySetStatus {
    /// Bypass mode does not use keys
    NotRequired,
    /// Keys are cached
    Cached,
    /// Keys were fetched by this check
    Fetched(usize),
    /// Keys could not be fetched
    Unavailable,
}

impl KeySetStatus {
    pub fn is_ready(&self) -> bool {
        !matches!(self, KeySetStatus::Unavailable)
    }
}

/// Authenticates requests and attaches identities.
pub struct AccessGateway {
    mode: AuthMode,
    binder: IdentityBinder,
}

impl AccessGateway {
    pub fn verifying(
        validator: AssertionValidator,
        team_domain: impl Into<String>,
        audience: impl Into<String>,
        binder: IdentityBinder,
    ) -> Self {
        Self {
            mode: AuthMode::Verify {
                validator,
                team_domain: team_domain.into(),
                audience: audience.into(),
            },
            binder,
        }
    }

    pub fn bypassing(bypass: BypassMode, binder: IdentityBinder) -> Self {
        Self {
            mode: AuthMode::Bypass(bypass),
            binder,
        }
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self.mode, AuthMode::Bypass(_))
    }

    pub fn binder(&self) -> &IdentityBinder {
        &self.binder
    }

    /// Authenticate a request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<RequestContext, AuthError> {
        let result = match &self.mode {
            AuthMode::Bypass(bypass) => bypass.bypass(&self.binder).await.map_err(AuthError::from),
            AuthMode::Verify {
                validator,
                team_domain,
                audience,
            } => self.verify(headers, validator, team_domain, audience).await,
        };

        if let Err(ref e) = result {
            match e.detail() {
                Some(detail) => tracing::warn!(
                    error_code = e.error_code(),
                    detail,
                    "Rejected request"
                ),
                None => tracing::warn!(error_code = e.error_code(), "Rejected request"),
            }
        }
        result
    }

    async fn verify(
        &self,
        headers: &HeaderMap,
        validator: &AssertionValidator,
        team_domain: &str,
        audience: &str,
    ) -> Result<RequestContext, AuthError> {
        let token = headers
            .get(ACCESS_ASSERTION_HEADER)
            .ok_or(AuthError::NoAssertion)?
            .to_str()
            .map_err(|_| AuthError::Malformed)?
            .trim();

        if token.is_empty() {
            return Err(AuthError::NoAssertion);
        }

        let claims = validator.verify(token, team_domain, audience).await?;
        let identity = self.binder.bind(&claims).await?;

        tracing::debug!(identity_id = %identity.id, "Authenticated request");
        Ok(RequestContext { identity, claims })
    }

    /// Report key set availability, fetching if nothing is cached.
    pub async fn key_set_status(&self) -> KeySetStatus {
        let AuthMode::Verify {
            validator,
            team_domain,
            ..
        } = &self.mode
        else {
            return KeySetStatus::NotRequired;
        };

        let resolver = validator.resolver();
        if resolver.is_cached(team_domain).await {
            return KeySetStatus::Cached;
        }

        match resolver.refresh(team_domain).await {
            Ok(count) => KeySetStatus::Fetched(count),
            Err(_) => KeySetStatus::Unavailable,
        }
    }
}
