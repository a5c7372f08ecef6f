//! In-memory dual-path backend.
//!
//! Holds both storage shapes behind one lock and implements real
//! transaction semantics: a transaction works on a clone of the data and
//! `commit` swaps the clone in whole. A failed or dropped transaction
//! leaves the shared state untouched.
//!
//! A writer mutex is held from `begin` until the transaction ends, so
//! concurrent upserts of the same natural key serialize and the last
//! committed write wins.
//!
//! Exposes count and point-query accessors plus fault-injection flags so
//! tests can verify dual-shape consistency and rollback behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use eggrate_core::{
    CityId, EggRateError, EggRateResult, RateFilter, RateId, RateRecord, RateValue, StateId,
    StorageError, Timestamp,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::traits::{DualPathBackend, DualPathTransaction};

/// Normalized city row.
#[derive(Debug, Clone)]
struct CityRow {
    state_id: StateId,
    name: String,
}

/// Normalized rate row.
#[derive(Debug, Clone)]
struct NormalizedRateRow {
    rate_id: RateId,
    rate: RateValue,
    updated_at: Timestamp,
}

/// Legacy flat row.
#[derive(Debug, Clone)]
struct LegacyRateRow {
    rate: RateValue,
    updated_at: Timestamp,
}

/// Both shapes. Cloned wholesale by transactions.
#[derive(Debug, Clone, Default)]
struct DualPathData {
    /// state name -> id (unique constraint on name).
    state_ids: HashMap<String, StateId>,
    /// state id -> name.
    states: HashMap<StateId, String>,
    /// (state id, city name) -> id (unique constraint).
    city_ids: HashMap<(StateId, String), CityId>,
    /// city id -> row.
    cities: HashMap<CityId, CityRow>,
    /// (city id, date) -> rate row (natural uniqueness).
    rates: HashMap<(CityId, NaiveDate), NormalizedRateRow>,
    /// (city, state, date) -> flat row (natural uniqueness).
    legacy: HashMap<(String, String, NaiveDate), LegacyRateRow>,
}

impl DualPathData {
    fn normalized_records(&self, filter: &RateFilter) -> Vec<RateRecord> {
        let mut records: Vec<RateRecord> = self
            .rates
            .iter()
            .filter_map(|((city_id, date), row)| {
                let city = self.cities.get(city_id)?;
                let state = self.states.get(&city.state_id)?;
                Some(RateRecord {
                    city: city.name.clone(),
                    state: state.clone(),
                    date: *date,
                    rate: row.rate,
                    updated_at: row.updated_at,
                })
            })
            .filter(|record| filter_matches(filter, record))
            .collect();
        sort_records(&mut records);
        records
    }

    fn legacy_records(&self, filter: &RateFilter) -> Vec<RateRecord> {
        let mut records: Vec<RateRecord> = self
            .legacy
            .iter()
            .map(|((city, state, date), row)| RateRecord {
                city: city.clone(),
                state: state.clone(),
                date: *date,
                rate: row.rate,
                updated_at: row.updated_at,
            })
            .filter(|record| filter_matches(filter, record))
            .collect();
        sort_records(&mut records);
        records
    }
}

fn filter_matches(filter: &RateFilter, record: &RateRecord) -> bool {
    match filter {
        RateFilter::All => true,
        RateFilter::State { state } => record.state == *state,
        RateFilter::City { state, city } => record.state == *state && record.city == *city,
        RateFilter::Date { date } => record.date == *date,
    }
}

/// Stable output order: newest date first, then state, then city.
fn sort_records(records: &mut [RateRecord]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.state.cmp(&b.state))
            .then_with(|| a.city.cmp(&b.city))
    });
}

/// In-memory dual-path backend with transactional writes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<DualPathData>>,
    /// Serializes writers from `begin` to transaction end.
    writer: Arc<Mutex<()>>,
    /// Fault injection: legacy-shape writes fail.
    fail_legacy_writes: Arc<AtomicBool>,
    /// Fault injection: normalized-shape reads fail.
    fail_normalized_reads: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every legacy-shape write fail until cleared.
    pub fn fail_legacy_writes(&self, fail: bool) {
        self.fail_legacy_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every normalized-shape read fail until cleared.
    pub fn fail_normalized_reads(&self, fail: bool) {
        self.fail_normalized_reads.store(fail, Ordering::SeqCst);
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = DualPathData::default();
    }

    /// Count of state rows in the normalized shape.
    pub fn state_count(&self) -> usize {
        self.read_data().states.len()
    }

    /// Count of city rows in the normalized shape.
    pub fn city_count(&self) -> usize {
        self.read_data().cities.len()
    }

    /// Count of rate rows in the normalized shape.
    pub fn normalized_rate_count(&self) -> usize {
        self.read_data().rates.len()
    }

    /// Count of rows in the legacy shape.
    pub fn legacy_rate_count(&self) -> usize {
        self.read_data().legacy.len()
    }

    /// Point query against the normalized shape only.
    pub fn normalized_rate(&self, city: &str, state: &str, date: NaiveDate) -> Option<RateValue> {
        let data = self.read_data();
        let state_id = data.state_ids.get(state)?;
        let city_id = data.city_ids.get(&(*state_id, city.to_string()))?;
        data.rates.get(&(*city_id, date)).map(|row| row.rate)
    }

    /// Point query against the legacy shape only.
    pub fn legacy_rate(&self, city: &str, state: &str, date: NaiveDate) -> Option<RateValue> {
        self.read_data()
            .legacy
            .get(&(city.to_string(), state.to_string(), date))
            .map(|row| row.rate)
    }

    fn read_data(&self) -> std::sync::RwLockReadGuard<'_, DualPathData> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DualPathBackend for MemoryBackend {
    async fn normalized_rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>> {
        if self.fail_normalized_reads.load(Ordering::SeqCst) {
            return Err(EggRateError::Storage(StorageError::Unavailable {
                reason: "normalized shape unavailable (injected)".to_string(),
            }));
        }
        Ok(self.read_data().normalized_records(filter))
    }

    async fn legacy_rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>> {
        Ok(self.read_data().legacy_records(filter))
    }

    async fn begin(&self) -> EggRateResult<Box<dyn DualPathTransaction>> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.read_data().clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.data),
            working,
            fail_legacy_writes: Arc::clone(&self.fail_legacy_writes),
            _guard: guard,
        }))
    }
}

/// A transaction over a working copy of the data.
struct MemoryTransaction {
    shared: Arc<RwLock<DualPathData>>,
    working: DualPathData,
    fail_legacy_writes: Arc<AtomicBool>,
    /// Held until the transaction ends; serializes writers.
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl DualPathTransaction for MemoryTransaction {
    async fn resolve_state(&mut self, name: &str) -> EggRateResult<StateId> {
        if let Some(id) = self.working.state_ids.get(name) {
            return Ok(*id);
        }
        let id = StateId::new();
        self.working.state_ids.insert(name.to_string(), id);
        self.working.states.insert(id, name.to_string());
        Ok(id)
    }

    async fn resolve_city(&mut self, state_id: StateId, name: &str) -> EggRateResult<CityId> {
        let key = (state_id, name.to_string());
        if let Some(id) = self.working.city_ids.get(&key) {
            return Ok(*id);
        }
        if !self.working.states.contains_key(&state_id) {
            return Err(EggRateError::Storage(StorageError::InsertFailed {
                shape: "normalized".to_string(),
                reason: format!("no state row for id {state_id}"),
            }));
        }
        let id = CityId::new();
        self.working.city_ids.insert(key, id);
        self.working.cities.insert(
            id,
            CityRow {
                state_id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn upsert_normalized_rate(
        &mut self,
        city_id: CityId,
        date: NaiveDate,
        rate: RateValue,
    ) -> EggRateResult<RateId> {
        if !self.working.cities.contains_key(&city_id) {
            return Err(EggRateError::Storage(StorageError::InsertFailed {
                shape: "normalized".to_string(),
                reason: format!("no city row for id {city_id}"),
            }));
        }
        let row = self
            .working
            .rates
            .entry((city_id, date))
            .or_insert_with(|| NormalizedRateRow {
                rate_id: RateId::new(),
                rate,
                updated_at: Utc::now(),
            });
        row.rate = rate;
        row.updated_at = Utc::now();
        Ok(row.rate_id)
    }

    async fn upsert_legacy_rate(
        &mut self,
        city: &str,
        state: &str,
        date: NaiveDate,
        rate: RateValue,
    ) -> EggRateResult<()> {
        if self.fail_legacy_writes.load(Ordering::SeqCst) {
            return Err(EggRateError::Storage(StorageError::InsertFailed {
                shape: "legacy".to_string(),
                reason: "legacy shape unavailable (injected)".to_string(),
            }));
        }
        self.working.legacy.insert(
            (city.to_string(), state.to_string(), date),
            LegacyRateRow {
                rate,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EggRateResult<()> {
        let mut shared = self.shared.write().map_err(|_| {
            EggRateError::Storage(StorageError::LockPoisoned)
        })?;
        *shared = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EggRateResult<()> {
        // Working copy is simply dropped.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn rate(s: &str) -> RateValue {
        RateValue::parse(s).expect("valid rate")
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let backend = MemoryBackend::new();

        let mut txn = backend.begin().await.expect("begin should succeed");
        let state_id = txn.resolve_state("Maharashtra").await.unwrap();
        let city_id = txn.resolve_city(state_id, "Pune").await.unwrap();
        txn.upsert_normalized_rate(city_id, date(2025, 1, 1), rate("6.35"))
            .await
            .unwrap();
        txn.upsert_legacy_rate("Pune", "Maharashtra", date(2025, 1, 1), rate("6.35"))
            .await
            .unwrap();
        txn.commit().await.expect("commit should succeed");

        assert_eq!(backend.state_count(), 1);
        assert_eq!(backend.city_count(), 1);
        assert_eq!(backend.normalized_rate_count(), 1);
        assert_eq!(backend.legacy_rate_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let backend = MemoryBackend::new();

        let mut txn = backend.begin().await.expect("begin should succeed");
        let state_id = txn.resolve_state("Maharashtra").await.unwrap();
        let city_id = txn.resolve_city(state_id, "Pune").await.unwrap();
        txn.upsert_normalized_rate(city_id, date(2025, 1, 1), rate("6.35"))
            .await
            .unwrap();
        txn.rollback().await.expect("rollback should succeed");

        assert_eq!(backend.state_count(), 0);
        assert_eq!(backend.normalized_rate_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_a_rollback() {
        let backend = MemoryBackend::new();

        {
            let mut txn = backend.begin().await.expect("begin should succeed");
            txn.resolve_state("Haryana").await.unwrap();
            // Dropped without commit.
        }

        assert_eq!(backend.state_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_same_key_updates_in_place() {
        let backend = MemoryBackend::new();

        let mut txn = backend.begin().await.unwrap();
        let state_id = txn.resolve_state("Maharashtra").await.unwrap();
        let city_id = txn.resolve_city(state_id, "Pune").await.unwrap();
        let first_id = txn
            .upsert_normalized_rate(city_id, date(2025, 1, 1), rate("6.35"))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let mut txn = backend.begin().await.unwrap();
        let state_id = txn.resolve_state("Maharashtra").await.unwrap();
        let city_id = txn.resolve_city(state_id, "Pune").await.unwrap();
        let second_id = txn
            .upsert_normalized_rate(city_id, date(2025, 1, 1), rate("6.50"))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(first_id, second_id, "update keeps the surrogate id");
        assert_eq!(backend.normalized_rate_count(), 1);
        assert_eq!(
            backend.normalized_rate("Pune", "Maharashtra", date(2025, 1, 1)),
            Some(rate("6.50"))
        );
    }

    #[tokio::test]
    async fn test_resolve_city_requires_state_row() {
        let backend = MemoryBackend::new();

        let mut txn = backend.begin().await.unwrap();
        let result = txn.resolve_city(StateId::new(), "Pune").await;
        assert!(result.is_err());
        txn.rollback().await.unwrap();
    }
}
