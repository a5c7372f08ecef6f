//! Cache backend trait and statistics.
//!
//! Backends store opaque byte values with an expiry timestamp. Expiry is
//! lazy: an expired entry is treated as absent and cleaned up on the read
//! that finds it, so no background sweep is required.

use async_trait::async_trait;
use eggrate_core::{Dataset, EggRateResult};
use std::time::Duration;

use super::key::CacheKey;

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe, must write each value atomically as
/// a whole unit, and must treat expired entries as absent.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the raw value for a key.
    ///
    /// Returns `Ok(None)` for a missing entry, an expired entry, or an
    /// entry whose stored form is shorter than the expiry header. Expired
    /// entries SHOULD be deleted as a side effect.
    async fn get_raw(&self, key: &CacheKey) -> EggRateResult<Option<Vec<u8>>>;

    /// Store a value with `expires_at = now + ttl`, fully overwriting any
    /// previous entry for the key.
    async fn put_raw(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> EggRateResult<()>;

    /// Delete one entry. Deleting a non-existent key is not an error.
    async fn delete(&self, key: &CacheKey) -> EggRateResult<()>;

    /// Delete every entry the cache manages. Returns the count removed.
    async fn invalidate_all(&self) -> EggRateResult<u64>;

    /// Delete every entry belonging to one dataset. Returns the count
    /// removed.
    async fn invalidate_dataset(&self, dataset: Dataset) -> EggRateResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> EggRateResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including expired entries).
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of expired entries removed lazily on read.
    pub expired_evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty = CacheStats::default();
        assert!((empty.hit_rate() - 0.0).abs() < 0.001);
    }
}
