// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS only when derived from the configured domain
//! - Every fetch is bounded by a timeout
//! - The cached set is replaced wholesale; readers never see a partial set
//! - A failed refresh keeps the previous set in place
//!
//! ## Refresh Policy
//!
//! The set is memoized until explicitly invalidated (or until the optional max
//! age elapses). When a token names a key id the cached set does not contain,
//! the resolver asks for a forced refresh. Forced refreshes are coalesced:
//! callers that saw the same stale set wait on a single refresh lock, and
//! whoever gets there after the set was replaced reuses it instead of fetching
//! again. Forced fetches are also spaced at least `min_refresh_interval`
//! apart so a stream of bogus key ids cannot hammer the trust authority.
//!
//! Cold reads queue on the same lock. A reader that waited through a failed
//! attempt gets that attempt's error instead of starting another fetch, so an
//! outage costs one fetch per wave of callers, not one per caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::Jwk;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::error::KeyFetchError;

/// Default timeout for a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum spacing between forced refreshes.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Well-known path of the key set below the trust authority domain.
const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Build the JWKS endpoint URL for a trust authority domain.
pub fn jwks_url_for_domain(domain: &str) -> Result<Url, url::ParseError> {
    let domain = domain.trim().trim_end_matches('/');
    Url::parse(&format!("https://{domain}{JWKS_PATH}"))
}

/// Immutable set of published signing keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

impl KeySet {
    /// Parse a JWKS document.
    ///
    /// The document must contain a `keys` array. Individual entries that have
    /// no `kid` or that the JWK model cannot represent are skipped, so one
    /// exotic key does not take down verification for the others.
    pub fn from_json(bytes: &[u8]) -> Result<Self, KeyFetchError> {
        let raw: RawKeySet =
            serde_json::from_slice(bytes).map_err(|e| KeyFetchError::Malformed(e.to_string()))?;

        let mut keys = Vec::with_capacity(raw.keys.len());
        for value in raw.keys {
            match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) if jwk.common.key_id.as_deref().is_some_and(|kid| !kid.is_empty()) => {
                    keys.push(jwk)
                }
                Ok(_) => tracing::debug!("Skipping JWK without kid"),
                Err(e) => tracing::debug!(error = %e, "Skipping JWK that cannot be parsed"),
            }
        }

        Ok(Self { keys })
    }

    /// Find a key by exact key id.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(|k| k.common.key_id.as_deref())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Future returned by [`KeySetSource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<KeySet, KeyFetchError>> + Send + 'a>>;

/// Remote origin of the key set.
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set.
    fn fetch(&self) -> FetchFuture<'_>;

    /// Human-readable location, for logs.
    fn endpoint(&self) -> &str;
}

/// Fetches the key set from a JWKS endpoint over HTTP.
pub struct HttpKeySetSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Source for `https://{domain}/.well-known/jwks.json`.
    ///
    /// The client refuses plain-HTTP URLs, including redirects to them.
    pub fn for_domain(domain: &str, timeout: Duration) -> Result<Self, KeyFetchError> {
        let url = jwks_url_for_domain(domain)
            .map_err(|e| KeyFetchError::Client(format!("invalid trust authority domain: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .https_only(true)
            .build()
            .map_err(|e| KeyFetchError::Client(e.to_string()))?;
        Ok(Self { url, client })
    }

    /// Source for an explicit JWKS URL, plain HTTP allowed.
    #[cfg(test)]
    pub fn with_url(url: Url, timeout: Duration) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyFetchError::Client(e.to_string()))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch_key_set(&self) -> Result<KeySet, KeyFetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KeyFetchError::Timeout
                } else {
                    KeyFetchError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(KeyFetchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                KeyFetchError::Timeout
            } else {
                KeyFetchError::Transport(e.to_string())
            }
        })?;

        KeySet::from_json(&body)
    }
}

impl KeySetSource for HttpKeySetSource {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.fetch_key_set())
    }

    fn endpoint(&self) -> &str {
        self.url.as_str()
    }
}

/// Key set cache entry.
struct CacheEntry {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Bookkeeping guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    /// Stamped before a forced fetch starts, so failures are spaced too.
    last_forced_attempt: Option<Instant>,
    /// Error of the most recent attempt; cleared by a successful fetch.
    last_failure: Option<KeyFetchError>,
}

/// Single-slot key set cache.
///
/// One instance is created at startup and shared by every verification.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    slot: RwLock<Option<CacheEntry>>,
    refresh: Mutex<RefreshState>,
    /// Completed fetch attempts, readable without the refresh lock.
    attempts: AtomicU64,
    fetch_timeout: Duration,
    min_refresh_interval: Duration,
    max_age: Option<Duration>,
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            max_age: None,
        }
    }

    /// Upper bound on a single fetch, independent of the source's own timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Minimum spacing between forced refreshes.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Treat a cached set older than `max_age` as absent.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.source.endpoint()
    }

    /// Get the key set, fetching it if nothing usable is cached.
    pub async fn key_set(&self) -> Result<Arc<KeySet>, KeyFetchError> {
        if let Some(keys) = self.current().await {
            return Ok(keys);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;
        // Another caller may have filled the slot while we waited.
        if let Some(keys) = self.current().await {
            return Ok(keys);
        }
        // Or failed while we waited: share that outcome.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = &state.last_failure {
                tracing::debug!(error = %err, "Reusing failure of concurrent key set fetch");
                return Err(err.clone());
            }
        }
        self.fetch_and_store(&mut state).await
    }

    /// Refresh after a key id was missing from `stale`.
    ///
    /// Returns the set the caller should retry against. That is either a set
    /// someone else installed after `stale`, a freshly fetched set, or `stale`
    /// itself when a forced refresh ran too recently.
    pub async fn refresh_after_miss(
        &self,
        stale: &Arc<KeySet>,
    ) -> Result<Arc<KeySet>, KeyFetchError> {
        let mut state = self.refresh.lock().await;

        match self.current().await {
            Some(current) if !Arc::ptr_eq(&current, stale) => {
                tracing::debug!("Key set already replaced by a concurrent refresh");
                return Ok(current);
            }
            Some(_) => {
                if let Some(last) = state.last_forced_attempt {
                    if last.elapsed() < self.min_refresh_interval {
                        tracing::debug!(
                            since_last_ms = last.elapsed().as_millis() as u64,
                            "Forced key set refresh suppressed"
                        );
                        return Ok(Arc::clone(stale));
                    }
                }
            }
            // Invalidated or aged out: this is an ordinary miss.
            None => {}
        }

        state.last_forced_attempt = Some(Instant::now());
        self.fetch_and_store(&mut state).await
    }

    /// Drop the cached set; the next lookup fetches.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
        tracing::info!(endpoint = %self.endpoint(), "Key set cache invalidated");
    }

    /// Check if a usable key set is currently cached.
    pub async fn is_cached(&self) -> bool {
        self.current().await.is_some()
    }

    /// Fetch the key set ahead of the first request.
    ///
    /// Failure is logged, not fatal: the first token will retry.
    pub async fn warm(&self) -> bool {
        match self.key_set().await {
            Ok(keys) => {
                tracing::info!(key_count = keys.len(), endpoint = %self.endpoint(), "Key set cache warmed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.endpoint(), "Failed to warm key set cache, will retry on first token");
                false
            }
        }
    }

    async fn current(&self) -> Option<Arc<KeySet>> {
        let slot = self.slot.read().await;
        let entry = slot.as_ref()?;
        if let Some(max_age) = self.max_age {
            if entry.fetched_at.elapsed() >= max_age {
                return None;
            }
        }
        Some(Arc::clone(&entry.keys))
    }

    /// Fetch from the source and swap the slot. Takes the refresh lock's state.
    async fn fetch_and_store(
        &self,
        state: &mut RefreshState,
    ) -> Result<Arc<KeySet>, KeyFetchError> {
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(KeyFetchError::Timeout),
        };
        self.attempts.fetch_add(1, Ordering::AcqRel);

        let keys = match fetched {
            Ok(keys) => {
                state.last_failure = None;
                Arc::new(keys)
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.endpoint(), "Failed to fetch key set");
                state.last_failure = Some(e.clone());
                return Err(e);
            }
        };

        tracing::info!(key_count = keys.len(), endpoint = %self.endpoint(), "Key set refreshed");

        *self.slot.write().await = Some(CacheEntry {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("endpoint", &self.endpoint())
            .field("fetch_timeout", &self.fetch_timeout)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("max_age", &self.max_age)
            .finish()
    }
}
