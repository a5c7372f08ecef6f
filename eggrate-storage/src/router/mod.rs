//! Fallback query router over two storage shapes.
//!
//! During a live migration from the legacy flat schema to the normalized
//! schema, a record may exist in only one shape at a time. Callers should
//! not need to know which, so every read and write goes through
//! [`FallbackRouter`]:
//!
//! - **Reads** execute against the normalized shape first and fall back to
//!   the legacy shape when the primary errors or matches zero rows. The
//!   normalized shape wins whenever it has any rows at all - even one -
//!   because it is assumed to be a superset once populated.
//! - **Writes** are validated up front and then applied to both shapes
//!   inside a single transaction, normalized first. Any failure rolls the
//!   whole write back; no caller ever observes a write applied to only one
//!   shape.

pub mod memory;
pub mod traits;

pub use memory::MemoryBackend;
pub use traits::{DualPathBackend, DualPathTransaction};

use std::sync::Arc;

use chrono::NaiveDate;
use eggrate_core::{EggRateResult, NewRate, RateFilter, RateId, RateRecord, RateValue};

/// Query router presenting one logical interface over both shapes.
pub struct FallbackRouter<B: DualPathBackend> {
    backend: Arc<B>,
}

impl<B: DualPathBackend> FallbackRouter<B> {
    /// Create a router over an explicitly constructed backend handle.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Get a reference to the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch rate records, preferring the normalized shape.
    ///
    /// Zero rows from both shapes is an empty result, never an error. A
    /// primary-path error is logged and absorbed as long as the fallback
    /// succeeds; if both paths fail, the fallback's error propagates.
    pub async fn fetch_rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>> {
        match self.backend.normalized_rates(filter).await {
            Ok(rows) if !rows.is_empty() => Ok(rows),
            Ok(_) => self.backend.legacy_rates(filter).await,
            Err(error) => {
                tracing::warn!(%error, "normalized read failed, falling back to legacy shape");
                self.backend.legacy_rates(filter).await
            }
        }
    }

    /// Upsert a rate into both shapes atomically.
    ///
    /// Order within the transaction: resolve state, resolve city, upsert
    /// the normalized rate, mirror into the legacy shape. Any failure
    /// rolls back every prior step and propagates; validation failures
    /// reject the input before any storage I/O.
    pub async fn upsert_rate(&self, input: &NewRate) -> EggRateResult<RateId> {
        input.validate()?;
        let city = input.city.trim();
        let state = input.state.trim();

        let mut txn = self.backend.begin().await?;
        match apply_upsert(txn.as_mut(), city, state, input.date, input.rate).await {
            Ok(rate_id) => {
                txn.commit().await?;
                Ok(rate_id)
            }
            Err(error) => {
                if let Err(rollback_error) = txn.rollback().await {
                    tracing::warn!(%rollback_error, "rollback failed after upsert error");
                }
                Err(error)
            }
        }
    }
}

async fn apply_upsert(
    txn: &mut dyn DualPathTransaction,
    city: &str,
    state: &str,
    date: NaiveDate,
    rate: RateValue,
) -> EggRateResult<RateId> {
    let state_id = txn.resolve_state(state).await?;
    let city_id = txn.resolve_city(state_id, city).await?;
    let rate_id = txn.upsert_normalized_rate(city_id, date, rate).await?;
    txn.upsert_legacy_rate(city, state, date, rate).await?;
    Ok(rate_id)
}

impl<B: DualPathBackend> Clone for FallbackRouter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}
