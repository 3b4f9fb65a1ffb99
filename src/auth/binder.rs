// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binding verified claims to local identities.
//!
//! The subject email is the only correlation key. An existing identity is
//! returned untouched; an unknown email provisions a new one. Concurrent
//! first-sight requests are settled by the store's email uniqueness: the
//! loser of a create race re-reads the winner's record.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ring::rand::SystemRandom;

use super::claims::TokenClaims;
use crate::models::{normalize_email, Identity, IdentityId};
use crate::store::{LocalCredential, NewUser, StoreError, UserStore};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("could not generate a local credential")]
    Credential,
}

impl From<StoreError> for BindError {
    fn from(e: StoreError) -> Self {
        BindError::StoreUnavailable(e.to_string())
    }
}

/// Maps subject emails to identities, creating them on first sight.
pub struct IdentityBinder {
    store: Arc<dyn UserStore>,
    timeout: Duration,
    rng: SystemRandom,
}

impl IdentityBinder {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
            rng: SystemRandom::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the identity for verified claims.
    pub async fn bind(&self, claims: &TokenClaims) -> Result<Identity, BindError> {
        self.find_or_create(&claims.subject_email, &claims.display_name_or_default())
            .await
    }

    /// Look up `email`, creating an external identity named `display_name`
    /// if none exists.
    pub async fn find_or_create(&self, email: &str, display_name: &str) -> Result<Identity, BindError> {
        let email = normalize_email(email);

        if let Some(existing) = self.bounded(self.store.find_by_email(&email)).await? {
            return Ok(existing);
        }

        let credential = LocalCredential::generate(&self.rng).map_err(|_| BindError::Credential)?;
        let new_user = NewUser {
            display_name: display_name.to_string(),
            email: email.clone(),
            credential,
            external_auth: true,
        };

        match self.bounded(self.store.create(new_user)).await {
            Ok(identity) => {
                tracing::info!(identity_id = %identity.id, "Provisioned identity on first sight");
                Ok(identity)
            }
            Err(StoreError::DuplicateEmail(_)) => {
                tracing::debug!("Lost identity create race, re-reading existing record");
                self.bounded(self.store.find_by_email(&email))
                    .await?
                    .ok_or_else(|| {
                        BindError::StoreUnavailable(
                            "identity vanished after duplicate email".to_string(),
                        )
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read an identity by id under the same store bound as binding.
    pub async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, BindError> {
        Ok(self.bounded(self.store.find_by_id(id)).await?)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}
