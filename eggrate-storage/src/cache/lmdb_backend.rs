//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped
//! key-value store. LMDB gives us the two properties the cache contract
//! needs from its persistence medium:
//!
//! - atomic write-of-whole-value (every put commits in its own write
//!   transaction), and
//! - cheap enumeration of all keys under the cache's namespace, for bulk
//!   invalidation.
//!
//! # On-Disk Value Format
//!
//! `[expires_at_millis: 8 bytes LE][json value bytes]`
//!
//! The format is an implementation detail, not a compatibility contract; it
//! only has to reconstruct the value and check freshness. Entries too short
//! to carry the header are treated as corrupt and dropped on read.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use eggrate_core::{CacheError, Dataset, EggRateResult};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::key::CacheKey;
use super::traits::{CacheBackend, CacheStats};

/// Expiry header length at the front of every stored value.
const EXPIRY_HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for eggrate_core::EggRateError {
    fn from(e: LmdbCacheError) -> Self {
        eggrate_core::EggRateError::Cache(CacheError::Unavailable {
            reason: e.to_string(),
        })
    }
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// use eggrate_storage::cache::{CacheBackend, CacheKey, CacheParams, LmdbCacheBackend};
/// use eggrate_core::Dataset;
/// use std::time::Duration;
///
/// let backend = LmdbCacheBackend::new("/var/cache/eggrate", 100)?;
/// let key = CacheKey::derive(Dataset::Rates, "rates_by_city", &params);
///
/// backend.put_raw(&key, &bytes, Duration::from_secs(86_400)).await?;
/// let cached = backend.get_raw(&key).await?;
/// ```
pub struct LmdbCacheBackend {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Usage statistics.
    stats: RwLock<CacheStats>,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
        }
    }

    fn record_expired_eviction(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.expired_evictions += 1;
            stats.entry_count = stats.entry_count.saturating_sub(1);
        }
    }

    /// Collect all keys matching a prefix.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        for result in iter {
            match result {
                Ok((key, _)) => {
                    if key.len() >= prefix.len() && &key[0..prefix.len()] == prefix {
                        keys.push(key.to_vec());
                    }
                }
                Err(_) => continue,
            }
        }

        Ok(keys)
    }

    /// Delete a batch of raw keys in one write transaction.
    fn delete_keys(&self, keys: &[Vec<u8>]) -> Result<u64, LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in keys {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(deleted);
        }

        Ok(deleted)
    }

    /// Remove an entry that was found expired on read.
    fn delete_expired(&self, encoded_key: &[u8]) {
        let removed = self
            .env
            .write_txn()
            .ok()
            .and_then(|mut wtxn| {
                let deleted = self.db.delete(&mut wtxn, encoded_key).unwrap_or(false);
                wtxn.commit().ok().map(|_| deleted)
            })
            .unwrap_or(false);

        if removed {
            self.record_expired_eviction();
        }
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get_raw(&self, key: &CacheKey) -> EggRateResult<Option<Vec<u8>>> {
        let encoded_key = key.encode();

        let found = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

            match self.db.get(&rtxn, &encoded_key) {
                Ok(Some(bytes)) => Some(bytes.to_vec()),
                Ok(None) => None,
                Err(e) => return Err(LmdbCacheError::Transaction(e.to_string()).into()),
            }
        };

        let bytes = match found {
            Some(bytes) => bytes,
            None => {
                self.record_miss();
                return Ok(None);
            }
        };

        if bytes.len() < EXPIRY_HEADER_LEN {
            // Corrupt entry: drop it and report a miss.
            self.delete_expired(&encoded_key);
            self.record_miss();
            return Ok(None);
        }

        let header: [u8; EXPIRY_HEADER_LEN] = bytes[0..EXPIRY_HEADER_LEN]
            .try_into()
            .unwrap_or([0u8; EXPIRY_HEADER_LEN]);
        let expires_at_millis = i64::from_le_bytes(header);

        if Utc::now().timestamp_millis() > expires_at_millis {
            self.delete_expired(&encoded_key);
            self.record_miss();
            return Ok(None);
        }

        self.record_hit();
        Ok(Some(bytes[EXPIRY_HEADER_LEN..].to_vec()))
    }

    async fn put_raw(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> EggRateResult<()> {
        let encoded_key = key.encode();

        let expires_at_millis = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        let mut full_bytes = Vec::with_capacity(EXPIRY_HEADER_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at_millis.to_le_bytes());
        full_bytes.extend_from_slice(value);

        // Check existence for entry accounting.
        let is_new = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            self.db.get(&rtxn, &encoded_key).ok().flatten().is_none()
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &encoded_key, &full_bytes)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if is_new {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count += 1;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> EggRateResult<()> {
        let encoded_key = key.encode();

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, &encoded_key)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if deleted {
            if let Ok(mut stats) = self.stats.write() {
                stats.entry_count = stats.entry_count.saturating_sub(1);
            }
        }

        Ok(())
    }

    async fn invalidate_all(&self) -> EggRateResult<u64> {
        let keys = self.collect_keys_with_prefix(&[])?;
        Ok(self.delete_keys(&keys)?)
    }

    async fn invalidate_dataset(&self, dataset: Dataset) -> EggRateResult<u64> {
        let prefix = CacheKey::dataset_prefix(dataset);
        let keys = self.collect_keys_with_prefix(&prefix)?;
        Ok(self.delete_keys(&keys)?)
    }

    async fn stats(&self) -> EggRateResult<CacheStats> {
        Ok(self.stats.read().map(|s| s.clone()).unwrap_or_default())
    }
}
