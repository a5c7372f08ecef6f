//! Dual-path storage abstraction.
//!
//! The router never talks to a concrete store; it works against these two
//! traits. A backend handle is constructed by the caller and passed in
//! explicitly - there is no global connection singleton.
//!
//! Reads come in two flavors, one per storage shape, and return the same
//! unified [`RateRecord`] shape. Writes go through an explicit transaction
//! with begin/commit/rollback, because an accepted upsert must land in both
//! shapes or neither.

use async_trait::async_trait;
use chrono::NaiveDate;
use eggrate_core::{CityId, EggRateResult, RateFilter, RateId, RateRecord, RateValue, StateId};

/// Backend over the two storage shapes.
#[async_trait]
pub trait DualPathBackend: Send + Sync {
    /// Query the normalized shape (surrogate-keyed states/cities referenced
    /// by id). Zero matches is `Ok(vec![])`, not an error.
    async fn normalized_rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>>;

    /// Query the legacy shape (flat rows carrying city/state names
    /// directly).
    async fn legacy_rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>>;

    /// Begin a write transaction spanning both shapes.
    ///
    /// Transactions serialize against each other: two concurrent upserts of
    /// the same natural key commit in some order and the later one wins.
    async fn begin(&self) -> EggRateResult<Box<dyn DualPathTransaction>>;
}

/// One atomic dual-shape write.
///
/// Every mutation made through a transaction becomes visible only at
/// `commit`. Dropping a transaction without committing is equivalent to
/// `rollback`.
#[async_trait]
pub trait DualPathTransaction: Send {
    /// Get or create the state row for a name.
    ///
    /// Idempotent: the same name always resolves to the same id, and the
    /// row is created at most once per unique name.
    async fn resolve_state(&mut self, name: &str) -> EggRateResult<StateId>;

    /// Get or create the city row for a name within a state. Idempotent
    /// like [`resolve_state`](Self::resolve_state).
    async fn resolve_city(&mut self, state_id: StateId, name: &str) -> EggRateResult<CityId>;

    /// Insert-or-update the normalized rate row keyed by `(city_id, date)`.
    /// Returns the surrogate id of the row (existing id on update).
    async fn upsert_normalized_rate(
        &mut self,
        city_id: CityId,
        date: NaiveDate,
        rate: RateValue,
    ) -> EggRateResult<RateId>;

    /// Insert-or-update the legacy flat row keyed by `(city, state, date)`.
    async fn upsert_legacy_rate(
        &mut self,
        city: &str,
        state: &str,
        date: NaiveDate,
        rate: RateValue,
    ) -> EggRateResult<()>;

    /// Make every mutation in this transaction visible atomically.
    async fn commit(self: Box<Self>) -> EggRateResult<()>;

    /// Discard every mutation in this transaction.
    async fn rollback(self: Box<Self>) -> EggRateResult<()>;
}
