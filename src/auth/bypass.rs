// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Non-production authentication bypass.
//!
//! WARNING: bypass mode performs no cryptographic verification. It exists
//! for local development without an edge provider in front of the API.
//!
//! A [`BypassMode`] value can only be obtained from
//! [`BypassMode::from_flags`], which requires BOTH a development
//! environment AND an explicit opt-in. A production deployment cannot hold
//! one, whatever else is misconfigured.

use chrono::Utc;

use super::binder::{BindError, IdentityBinder};
use super::claims::{RequestContext, TokenClaims};

/// Default identity used by bypass mode.
pub const DEFAULT_BYPASS_EMAIL: &str = "dev@example.com";
pub const DEFAULT_BYPASS_NAME: &str = "Dev User";

/// Deployment environment.
///
/// Anything other than an explicit `development` is production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "development" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Enabled bypass mode with its configured identity.
#[derive(Debug, Clone)]
pub struct BypassMode {
    email: String,
    name: String,
}

impl BypassMode {
    /// Enable bypass only for a development environment with an explicit
    /// opt-in. Returns `None` in every other combination.
    pub fn from_flags(
        environment: Environment,
        opt_in: bool,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Option<Self> {
        match (environment, opt_in) {
            (Environment::Development, true) => Some(Self {
                email: email.into(),
                name: name.into(),
            }),
            _ => None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find or create the configured identity and attach synthetic claims.
    pub async fn bypass(&self, binder: &IdentityBinder) -> Result<RequestContext, BindError> {
        tracing::warn!(email = %self.email, "DEV MODE: bypassing edge access authentication");

        let identity = binder.find_or_create(&self.email, &self.name).await?;
        let claims = TokenClaims::synthetic(identity.email.clone(), Utc::now());
        Ok(RequestContext { identity, claims })
    }
}
