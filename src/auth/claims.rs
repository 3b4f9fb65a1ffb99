// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims and the per-request identity context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::Identity;

/// Claims from a verified assertion (or synthesized by bypass mode).
///
/// Produced once per request and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TokenClaims {
    /// Subject email, the correlation key to the local identity
    pub subject_email: String,

    /// Provider-supplied display name, or the email local part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// `iat` claim, or the verification time when absent
    pub issued_at: DateTime<Utc>,

    /// Audience the token was accepted for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Issuer the token was accepted from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Every field the provider put in the token
    pub raw: Map<String, Value>,
}

impl TokenClaims {
    /// Synthetic claims for bypass mode: subject email and timestamp only.
    pub fn synthetic(subject_email: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        let subject_email = subject_email.into();
        let mut raw = Map::new();
        raw.insert("email".to_string(), Value::String(subject_email.clone()));
        raw.insert("iat".to_string(), Value::from(issued_at.timestamp()));

        Self {
            subject_email,
            display_name: None,
            issued_at,
            audience: None,
            issuer: None,
            raw,
        }
    }

    /// Display name to use when provisioning an identity for these claims.
    pub fn display_name_or_default(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| email_local_part(&self.subject_email).to_string())
    }
}

/// The part of an email address before the `@`.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Identity and claims attached to an authenticated request.
///
/// Inserted into request extensions by the access middleware and read by
/// the [`Authenticated`](super::Authenticated) extractor.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub claims: TokenClaims,
}
