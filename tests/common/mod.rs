// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use edge_access_gateway::api::router;
use edge_access_gateway::auth::{
    AccessGateway, AssertionValidator, IdentityBinder, KeyFetchError, KeyResolver, KeySetFetcher,
    ManualClock, ACCESS_ASSERTION_HEADER,
};
use edge_access_gateway::state::AppState;
use edge_access_gateway::store::InMemoryUserStore;

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const FOREIGN_KEY_PEM: &str = include_str!("../fixtures/foreign_key.pem");
pub const ACCESS_CERTS_JSON: &str = include_str!("../fixtures/access_certs.json");

pub const TEST_KEY_ID: &str = "test-key-1";
pub const TEAM_DOMAIN: &str = "acme.cloudflareaccess.com";
pub const AUDIENCE: &str = "4714c1358e65fe4b408ad6d432a5f878f08194bdb4752441fd56faefa9b2b6f2";
pub const FRONTEND_URL: &str = "http://localhost:3000";

/// Serves the fixture key set and counts fetches.
#[derive(Default)]
pub struct FixtureFetcher {
    fetches: AtomicUsize,
}

impl FixtureFetcher {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for FixtureFetcher {
    async fn fetch(&self, _endpoint: &Url) -> Result<JwkSet, KeyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        serde_json::from_str(ACCESS_CERTS_JSON).map_err(|e| KeyFetchError::Parse(e.to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub fetcher: Arc<FixtureFetcher>,
    pub store: Arc<InMemoryUserStore>,
}

/// Router verifying assertions against the fixture keys.
pub fn verifying_app() -> TestApp {
    let store = Arc::new(InMemoryUserStore::new());
    let (router, fetcher) = verifying_router(IdentityBinder::new(store.clone()));
    TestApp {
        router,
        fetcher,
        store,
    }
}

/// Verifying router that binds identities through `binder`.
pub fn verifying_router(binder: IdentityBinder) -> (Router, Arc<FixtureFetcher>) {
    let fetcher = Arc::new(FixtureFetcher::default());
    let resolver = KeyResolver::new(fetcher.clone(), Arc::new(ManualClock::new()));
    let gateway = AccessGateway::verifying(
        AssertionValidator::new(Arc::new(resolver)),
        TEAM_DOMAIN,
        AUDIENCE,
        binder,
    );
    (router(AppState::new(gateway), FRONTEND_URL), fetcher)
}

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

pub fn signed_token(claims: &Value) -> String {
    sign_with(claims, SIGNING_KEY_PEM, TEST_KEY_ID)
}

/// Send a GET, optionally with an assertion, and return status and JSON body.
pub async fn get(router: &Router, uri: &str, assertion: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(assertion) = assertion {
        request = request.header(ACCESS_ASSERTION_HEADER, assertion);
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
