// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::error::KeyFetchError;
use crate::auth::jwks::{HttpKeySetSource, KeySetCache};
use crate::auth::resolver::KeyResolver;
use crate::auth::verifier::{ClaimPolicy, TokenVerifier};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::storage::{IdentityDatabase, IdentityDbError, IdentityStore};
use crate::store::InMemoryIdentityStore;

/// Shared application state.
///
/// Built once at startup; every field is immutable or internally
/// synchronized.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    /// Same cache the authenticator verifies against; used by readiness.
    pub key_cache: Arc<KeySetCache>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to set up key set source: {0}")]
    KeySource(#[from] KeyFetchError),

    #[error("failed to open identity database: {0}")]
    IdentityDatabase(#[from] IdentityDbError),
}

impl AppState {
    pub fn new(key_cache: Arc<KeySetCache>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            key_cache,
        }
    }

    /// Wire the cache, resolver, verifier, and identity store from config.
    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        let source = HttpKeySetSource::for_domain(&config.domain, config.fetch_timeout)?;

        let mut cache = KeySetCache::new(Arc::new(source))
            .with_fetch_timeout(config.fetch_timeout)
            .with_min_refresh_interval(config.min_refresh_interval);
        if let Some(max_age) = config.max_age {
            cache = cache.with_max_age(max_age);
        }
        let key_cache = Arc::new(cache);

        let identities: Arc<dyn IdentityStore> = match config.identity_db_path() {
            Some(path) => Arc::new(IdentityDatabase::open(&path)?),
            None => {
                tracing::warn!("DATA_DIR not set, identities are kept in memory only");
                Arc::new(InMemoryIdentityStore::new())
            }
        };

        let resolver = KeyResolver::new(Arc::clone(&key_cache), config.algorithms.clone());
        let policy =
            ClaimPolicy::new(&config.issuer, &config.audience).with_leeway(config.leeway_secs);
        let authenticator = Authenticator::new(TokenVerifier::new(resolver, policy), identities);

        Ok(Self::new(key_cache, Arc::new(authenticator)))
    }
}
