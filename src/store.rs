// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User record store contract and an in-memory implementation.
//!
//! The gateway only needs three operations from a user store:
//! lookup by email, lookup by id, and create. Email uniqueness MUST be
//! enforced by the store itself; a create that loses a race reports
//! [`StoreError::DuplicateEmail`] so the caller can re-read the winner.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ring::rand::SecureRandom;
use tokio::sync::RwLock;

use crate::models::{Identity, IdentityId};

/// Length of a generated local credential in bytes.
pub const LOCAL_CREDENTIAL_LEN: usize = 32;

/// Error type for user store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another record already owns this email
    #[error("an identity with email {0} already exists")]
    DuplicateEmail(String),
    /// The store could not be reached or failed internally
    #[error("user store unavailable: {0}")]
    Unavailable(String),
    /// The store did not answer in time
    #[error("user store timed out after {0:?}")]
    Timeout(Duration),
}

/// Random credential attached to auto-provisioned records.
///
/// It is never used for login and never leaves the store: no `Serialize`,
/// and `Debug` output is redacted.
pub struct LocalCredential([u8; LOCAL_CREDENTIAL_LEN]);

impl LocalCredential {
    /// Fill a new credential from a CSPRNG.
    pub fn generate(rng: &dyn SecureRandom) -> Result<Self, ring::error::Unspecified> {
        let mut bytes = [0u8; LOCAL_CREDENTIAL_LEN];
        rng.fill(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw bytes, for stores that persist the credential.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for LocalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LocalCredential([redacted])")
    }
}

/// Fields for a new user record.
#[derive(Debug)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub credential: LocalCredential,
    pub external_auth: bool,
}

/// Durable user record store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError>;

    /// Create a record, failing with [`StoreError::DuplicateEmail`] if the
    /// email is taken.
    async fn create(&self, new_user: NewUser) -> Result<Identity, StoreError>;
}

struct StoredUser {
    identity: Identity,
    credential: LocalCredential,
}

#[derive(Default)]
struct Records {
    users: HashMap<IdentityId, StoredUser>,
    by_email: HashMap<String, IdentityId>,
}

/// Process-local user store.
///
/// Uniqueness is enforced under the write lock, so concurrent creates for
/// one email produce exactly one record.
#[derive(Default)]
pub struct InMemoryUserStore {
    records: RwLock<Records>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities.
    pub async fn len(&self) -> usize {
        self.records.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the record for `id` holds a non-zero local credential.
    pub async fn has_local_credential(&self, id: IdentityId) -> bool {
        self.records
            .read()
            .await
            .users
            .get(&id)
            .is_some_and(|user| user.credential.as_bytes().iter().any(|b| *b != 0))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .by_email
            .get(email)
            .and_then(|id| records.users.get(id))
            .map(|user| user.identity.clone()))
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Identity>, StoreError> {
        let records = self.records.read().await;
        Ok(records.users.get(&id).map(|user| user.identity.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<Identity, StoreError> {
        let mut records = self.records.write().await;

        if records.by_email.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateEmail(new_user.email));
        }

        let identity = Identity {
            id: IdentityId::new(),
            display_name: new_user.display_name,
            email: new_user.email,
            external_auth: new_user.external_auth,
            created_at: Utc::now(),
        };

        records.by_email.insert(identity.email.clone(), identity.id);
        records.users.insert(
            identity.id,
            StoredUser {
                identity: identity.clone(),
                credential: new_user.credential,
            },
        );

        Ok(identity)
    }
}
