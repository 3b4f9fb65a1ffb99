// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Model
//!
//! [`Identity`] is the durable local user record that an edge assertion is
//! bound to. Identities are created once per distinct email and never
//! modified by the gateway afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;
use uuid::Uuid;

/// Opaque identifier of a local identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new() -> Self {
        IdentityId(Uuid::new_v4())
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local user record correlated to the provider by email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Identity {
    /// Unique identity ID
    pub id: IdentityId,
    /// Display name captured on first sight
    pub display_name: String,
    /// Normalized email (unique)
    pub email: String,
    /// Whether the identity was provisioned from an edge assertion
    pub external_auth: bool,
    /// When the identity was created
    pub created_at: DateTime<Utc>,
}

/// Canonical form of an email used as the correlation key.
///
/// Trims surrounding whitespace, applies Unicode NFC and lower-cases.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfc().collect::<String>().to_lowercase()
}
