//! TTL cache with derived keys and advisory failure semantics.
//!
//! # Design Philosophy
//!
//! The cache is a read-through front over expensive aggregate queries. Two
//! rules shape everything here:
//!
//! - **Absence is normal.** A miss, an expired entry, and an unreadable
//!   entry all come back as `None`; no error type exists for "not cached".
//! - **Caching is advisory.** A fault in the cache layer must never change
//!   a caller-visible result, only its latency. [`TtlCache`] absorbs cache
//!   errors (logging them) and degrades to a miss; compute failures, by
//!   contrast, propagate unmodified and store nothing.
//!
//! # Key Derivation
//!
//! Keys are derived, not chosen: a logical name plus a canonicalized
//! parameter set hashes to a fixed 128-bit digest, prefixed with a dataset
//! byte so one dataset can be invalidated without touching the rest. See
//! [`CacheKey`].

pub mod key;
pub mod lmdb_backend;
pub mod read_through;
pub mod traits;

pub use key::{CacheKey, CacheParams};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use read_through::{CacheConfig, RateSource, TtlCache};
pub use traits::{CacheBackend, CacheStats};
