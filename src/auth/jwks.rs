// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key discovery and caching.
//!
//! ## Behaviour
//!
//! - Key sets are fetched over HTTPS from `https://{team_domain}{certs_path}`
//! - One cached key set per team domain, replaced wholesale on refresh
//! - A set older than the cache lifetime (24h by default) is refetched
//! - An unknown key id on a fresh set triggers one refresh, at most once
//!   per cooldown window per domain
//! - Fetch failures fail closed: the caller gets [`KeyFetchError`] and the
//!   request is rejected
//!
//! No lock is held while a fetch is in flight. Two requests that miss at
//! the same time may both fetch; the last write wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;
use url::Url;

use super::clock::{Clock, SystemClock};

/// Default key set lifetime (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum spacing between refreshes caused by unknown key ids.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Upper bound on a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default key discovery path appended to the team domain.
pub const DEFAULT_CERTS_PATH: &str = "/well-known-keys";

/// Failure to obtain a signing key.
#[derive(Debug, thiserror::Error)]
pub enum KeyFetchError {
    #[error("invalid key discovery endpoint for team domain {0:?}")]
    InvalidEndpoint(String),
    #[error("key set request failed: {0}")]
    Transport(String),
    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),
    #[error("key set response could not be parsed: {0}")]
    Parse(String),
    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("no signing key with id {0:?}")]
    UnknownKeyId(String),
}

/// A provider public key, addressed by key id.
#[derive(Clone)]
pub struct SigningKey {
    pub key_id: String,
    pub public_key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Source of key sets. The HTTP implementation is [`HttpKeySetFetcher`].
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self, endpoint: &Url) -> Result<JwkSet, KeyFetchError>;
}

/// Fetches key sets with `reqwest`.
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpKeySetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, endpoint: &Url) -> Result<JwkSet, KeyFetchError> {
        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(KeyFetchError::Status(response.status().as_u16()));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            if e.is_timeout() {
                KeyFetchError::Timeout(self.timeout)
            } else {
                KeyFetchError::Parse(e.to_string())
            }
        })
    }
}

impl HttpKeySetFetcher {
    fn transport_error(&self, e: reqwest::Error) -> KeyFetchError {
        if e.is_timeout() {
            KeyFetchError::Timeout(self.timeout)
        } else {
            KeyFetchError::Transport(e.to_string())
        }
    }
}

/// Build the key discovery URL for a team domain.
///
/// The team domain must be a bare host (optionally with a port): no scheme
/// other than the implied `https`, no credentials, path, query or fragment.
pub fn key_discovery_url(team_domain: &str, certs_path: &str) -> Result<Url, KeyFetchError> {
    let invalid = || KeyFetchError::InvalidEndpoint(team_domain.to_string());

    if team_domain.is_empty() || team_domain.contains(['/', '?', '#', '@']) {
        return Err(invalid());
    }

    let mut url = Url::parse(&format!("https://{team_domain}")).map_err(|_| invalid())?;
    if url.host_str().is_none() {
        return Err(invalid());
    }
    url.set_path(certs_path);
    Ok(url)
}

/// One team domain's key set.
struct CachedKeySet {
    keys: HashMap<String, SigningKey>,
    fetched_at: Instant,
}

/// Resolves key ids to signing keys, caching key sets per team domain.
///
/// Owned by the application state; the fetcher and clock are injected so
/// tests can substitute fakes.
pub struct KeyResolver {
    certs_path: String,
    cache_ttl: Duration,
    refresh_cooldown: Duration,
    fetch_timeout: Duration,
    fetcher: Arc<dyn KeySetFetcher>,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<String, Arc<CachedKeySet>>>,
}

impl KeyResolver {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            certs_path: DEFAULT_CERTS_PATH.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetcher,
            clock,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver backed by HTTPS and the system clock.
    pub fn over_https(fetch_timeout: Duration) -> Result<Self, KeyFetchError> {
        let fetcher = HttpKeySetFetcher::new(fetch_timeout)?;
        Ok(Self::new(Arc::new(fetcher), Arc::new(SystemClock)).with_fetch_timeout(fetch_timeout))
    }

    pub fn with_certs_path(mut self, certs_path: impl Into<String>) -> Self {
        self.certs_path = certs_path.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Look up `key_id` for `team_domain`, refreshing the key set when it is
    /// missing, expired, or lacks the key id.
    pub async fn resolve(&self, team_domain: &str, key_id: &str) -> Result<SigningKey, KeyFetchError> {
        let now = self.clock.now();
        let cached = self.cache.read().await.get(team_domain).cloned();

        if let Some(entry) = cached {
            let age = now.saturating_duration_since(entry.fetched_at);
            if age < self.cache_ttl {
                if let Some(key) = entry.keys.get(key_id) {
                    return Ok(key.clone());
                }
                if age < self.refresh_cooldown {
                    tracing::debug!(
                        team_domain,
                        key_id,
                        "Unknown key id within refresh cooldown, not refetching"
                    );
                    return Err(KeyFetchError::UnknownKeyId(key_id.to_string()));
                }
                tracing::info!(team_domain, key_id, "Unknown key id, refreshing key set");
            }
        }

        let entry = self.fetch_and_store(team_domain).await?;
        entry
            .keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| KeyFetchError::UnknownKeyId(key_id.to_string()))
    }

    /// Force a refresh of the key set for `team_domain`.
    ///
    /// Returns the number of usable keys in the new set.
    pub async fn refresh(&self, team_domain: &str) -> Result<usize, KeyFetchError> {
        let entry = self.fetch_and_store(team_domain).await?;
        Ok(entry.keys.len())
    }

    /// Whether a non-expired key set is cached for `team_domain`.
    pub async fn is_cached(&self, team_domain: &str) -> bool {
        let now = self.clock.now();
        self.cache
            .read()
            .await
            .get(team_domain)
            .is_some_and(|entry| now.saturating_duration_since(entry.fetched_at) < self.cache_ttl)
    }

    async fn fetch_and_store(&self, team_domain: &str) -> Result<Arc<CachedKeySet>, KeyFetchError> {
        let endpoint = key_discovery_url(team_domain, &self.certs_path)?;

        let jwks = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&endpoint))
            .await
            .map_err(|_| KeyFetchError::Timeout(self.fetch_timeout))?
            .inspect_err(|e| {
                tracing::warn!(team_domain, endpoint = %endpoint, error = %e, "Signing key fetch failed");
            })?;

        let entry = Arc::new(CachedKeySet {
            keys: build_key_map(&jwks),
            fetched_at: self.clock.now(),
        });
        tracing::info!(
            team_domain,
            key_count = entry.keys.len(),
            "Signing key set refreshed"
        );

        self.cache
            .write()
            .await
            .insert(team_domain.to_string(), Arc::clone(&entry));
        Ok(entry)
    }
}

/// Index the usable keys of a key set by key id.
fn build_key_map(jwks: &JwkSet) -> HashMap<String, SigningKey> {
    jwks.keys
        .iter()
        .filter_map(|jwk| match jwk_to_signing_key(jwk) {
            Ok(key) => Some((key.key_id.clone(), key)),
            Err(reason) => {
                tracing::debug!(key_id = ?jwk.common.key_id, reason, "Skipping key");
                None
            }
        })
        .collect()
}

/// Convert an RS256 JWK into a signing key.
fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, &'static str> {
    let key_id = jwk.common.key_id.clone().ok_or("missing kid")?;

    match jwk.common.key_algorithm {
        None | Some(KeyAlgorithm::RS256) => {}
        Some(_) => return Err("algorithm is not RS256"),
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let public_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| "invalid RSA components")?;
            Ok(SigningKey { key_id, public_key })
        }
        _ => Err("not an RSA key"),
    }
}
