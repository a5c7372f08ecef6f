//! Read-through cache front.
//!
//! [`TtlCache`] wraps a [`CacheBackend`] and implements the read-through
//! contract: on a hit return the cached value, on a miss call the source,
//! store the result, and return it.
//!
//! Failure semantics are asymmetric on purpose:
//!
//! - A cache-layer failure (unreadable entry, unwritable store, corrupt
//!   JSON) is absorbed here, logged at warn, and treated as a miss. The
//!   caller sees the same result it would have seen with no cache at all.
//! - A source failure propagates unmodified, and nothing is stored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eggrate_core::{Dataset, EggRateResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::{CacheKey, CacheParams};
use super::traits::CacheBackend;

/// Configuration for the TTL cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one. 24 hours: rates change
    /// daily.
    pub default_ttl: Duration,
    /// Maximum size of the backing store in megabytes.
    pub max_size_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 60 * 60),
            max_size_mb: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum backing-store size.
    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }
}

/// Source of truth invoked on cache miss.
///
/// This is the `compute` seam of the read-through contract; the router's
/// fallback read implements it for rate queries.
#[async_trait]
pub trait RateSource<T>: Send + Sync {
    /// Load the value from the underlying store.
    async fn load(&self) -> EggRateResult<T>;
}

/// Read-through TTL cache over a pluggable backend.
pub struct TtlCache<C: CacheBackend> {
    backend: Arc<C>,
    config: CacheConfig,
}

impl<C: CacheBackend> TtlCache<C> {
    /// Create a new cache front over a backend.
    pub fn new(backend: Arc<C>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Create a cache front with default configuration.
    pub fn with_defaults(backend: Arc<C>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the backend.
    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Get a cached value, absorbing every cache-layer failure into a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.backend.get_raw(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(key = %key, %error, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key = %key, %error, "corrupt cache entry, treating as miss");
                // Drop the entry so the next read does not re-parse it.
                let _ = self.backend.delete(key).await;
                None
            }
        }
    }

    /// Store a value. Advisory: failures are logged and swallowed, the
    /// value is still usable by the caller.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(key = %key, %error, "cache serialization failed, skipping store");
                return;
            }
        };

        if let Err(error) = self.backend.put_raw(key, &bytes, ttl).await {
            tracing::warn!(key = %key, %error, "cache write failed, value not stored");
        }
    }

    /// Read-through composite: get, or compute-store-return on miss.
    ///
    /// The source is called at most once. If it fails, nothing is stored
    /// and the failure propagates to the caller unmodified.
    pub async fn get_or_compute<T, S>(
        &self,
        dataset: Dataset,
        logical_name: &str,
        params: &CacheParams,
        ttl: Option<Duration>,
        source: &S,
    ) -> EggRateResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        S: RateSource<T>,
    {
        let key = CacheKey::derive(dataset, logical_name, params);

        if let Some(cached) = self.get::<T>(&key).await {
            return Ok(cached);
        }

        let value = source.load().await?;
        self.put(&key, &value, ttl).await;
        Ok(value)
    }

    /// Delete one entry.
    pub async fn invalidate(&self, key: &CacheKey) -> EggRateResult<()> {
        self.backend.delete(key).await
    }

    /// Delete every entry. Returns the count removed.
    pub async fn invalidate_all(&self) -> EggRateResult<u64> {
        self.backend.invalidate_all().await
    }

    /// Delete every entry in one dataset. Returns the count removed.
    pub async fn invalidate_dataset(&self, dataset: Dataset) -> EggRateResult<u64> {
        self.backend.invalidate_dataset(dataset).await
    }
}

impl<C: CacheBackend> Clone for TtlCache<C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}
