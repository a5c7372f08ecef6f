//! EGGRATE Storage - TTL Cache and Dual-Path Query Router
//!
//! Two cooperating components sit behind the request handlers:
//!
//! - [`cache`] - a durable key/value cache with derived keys and TTL expiry,
//!   used read-through in front of aggregate rate queries. Caching is
//!   advisory: a cache-layer fault degrades to a miss, never to a changed
//!   result.
//! - [`router`] - a query-execution policy over two storage shapes. Reads
//!   prefer the normalized shape and fall back to the legacy shape; writes
//!   land in both shapes inside one transaction or not at all.
//!
//! [`service::RateService`] wires the two together: reads derive a cache key
//! and fill the cache from the router on miss, writes go through the router
//! and then invalidate.

pub mod cache;
pub mod router;
pub mod service;

pub use cache::{
    CacheBackend, CacheConfig, CacheKey, CacheParams, CacheStats, LmdbCacheBackend,
    LmdbCacheError, RateSource, TtlCache,
};
pub use router::{DualPathBackend, DualPathTransaction, FallbackRouter, MemoryBackend};
pub use service::RateService;
