// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use url::Url;

use crate::auth::clock::ManualClock;
use crate::auth::jwks::{KeyFetchError, KeyResolver, KeySetFetcher};
use crate::auth::{AccessGateway, AssertionValidator, IdentityBinder};
use crate::state::AppState;
use crate::store::InMemoryUserStore;

pub const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
pub const FOREIGN_KEY_PEM: &str = include_str!("../tests/fixtures/foreign_key.pem");
pub const ACCESS_CERTS_JSON: &str = include_str!("../tests/fixtures/access_certs.json");

pub const TEST_KEY_ID: &str = "test-key-1";
pub const TEAM_DOMAIN: &str = "acme.cloudflareaccess.com";
pub const AUDIENCE: &str = "4714c1358e65fe4b408ad6d432a5f878f08194bdb4752441fd56faefa9b2b6f2";

pub fn published_key_set() -> JwkSet {
    serde_json::from_str(ACCESS_CERTS_JSON).expect("fixture key set parses")
}

/// Claims shaped like a Cloudflare Access application token.
pub fn access_claims(email: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "aud": [AUDIENCE],
        "email": email,
        "exp": now + 3600,
        "iat": now,
        "nbf": now,
        "iss": format!("https://{TEAM_DOMAIN}"),
        "type": "app",
        "identity_nonce": "6ei69kawdKzMIAPF",
        "sub": "7335d417-61da-459d-899c-0a01c76a2f94",
        "country": "US"
    })
}

pub fn sign_with(claims: &Value, pem: &str, key_id: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key_id.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture PEM parses");
    encode(&header, claims, &key).expect("token encodes")
}

/// Token signed by the published test key.
pub fn signed_token(claims: &Value) -> String {
    sign_with(claims, SIGNING_KEY_PEM, TEST_KEY_ID)
}

/// Token with an arbitrary header and a junk signature.
pub fn token_with_header(header: &Value, claims: &Value) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header_b64}.{claims_b64}.c2lnbmF0dXJl")
}

/// Key set fetcher that serves a fixed set and counts requests.
pub struct StaticKeySetFetcher {
    key_set: Mutex<Option<JwkSet>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    last_endpoint: Mutex<Option<Url>>,
}

impl StaticKeySetFetcher {
    pub fn new(key_set: JwkSet) -> Self {
        Self {
            key_set: Mutex::new(Some(key_set)),
            delay: None,
            fetches: AtomicUsize::new(0),
            last_endpoint: Mutex::new(None),
        }
    }

    /// Fetcher whose provider is unreachable.
    pub fn failing() -> Self {
        Self {
            key_set: Mutex::new(None),
            delay: None,
            fetches: AtomicUsize::new(0),
            last_endpoint: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_key_set(&self, key_set: JwkSet) {
        *self.key_set.lock().unwrap() = Some(key_set);
    }

    pub fn set_failing(&self) {
        *self.key_set.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_endpoint(&self) -> Option<Url> {
        self.last_endpoint.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeySetFetcher for StaticKeySetFetcher {
    async fn fetch(&self, endpoint: &Url) -> Result<JwkSet, KeyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_endpoint.lock().unwrap() = Some(endpoint.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.key_set
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KeyFetchError::Transport("connection refused".to_string()))
    }
}

/// Resolver over the published fixture key set.
pub fn fixture_resolver() -> (Arc<KeyResolver>, Arc<StaticKeySetFetcher>) {
    let fetcher = Arc::new(StaticKeySetFetcher::new(published_key_set()));
    let resolver = KeyResolver::new(fetcher.clone(), Arc::new(ManualClock::new()));
    (Arc::new(resolver), fetcher)
}

/// Verifying application state over the fixture keys and an empty store.
pub fn test_state() -> (AppState, Arc<StaticKeySetFetcher>) {
    let (resolver, fetcher) = fixture_resolver();
    let gateway = AccessGateway::verifying(
        AssertionValidator::new(resolver),
        TEAM_DOMAIN,
        AUDIENCE,
        IdentityBinder::new(Arc::new(InMemoryUserStore::new())),
    );
    (AppState::new(gateway), fetcher)
}
