//! Request-handler facade over the cache and the router.
//!
//! Read path: derive a cache key from the filter, return the cached rows on
//! a hit, otherwise fetch through the router and store the result with the
//! configured TTL. Write path: upsert through the router, then invalidate
//! the cache.
//!
//! Invalidation is deliberately coarse: any accepted write clears the whole
//! cache, because a single rate touches many derived read views (per-city,
//! per-state, per-date listings). Callers needing precision can invalidate
//! a single dataset through [`TtlCache::invalidate_dataset`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eggrate_core::{Dataset, EggRateResult, NewRate, RateFilter, RateId, RateRecord};

use crate::cache::{CacheBackend, CacheParams, RateSource, TtlCache};
use crate::router::{DualPathBackend, FallbackRouter};

/// In-process API for the rate endpoints.
pub struct RateService<B: DualPathBackend, C: CacheBackend> {
    router: FallbackRouter<B>,
    cache: TtlCache<C>,
    /// TTL for rate read views; `None` uses the cache default (24h).
    rates_ttl: Option<Duration>,
}

impl<B: DualPathBackend, C: CacheBackend> RateService<B, C> {
    /// Create a service over explicitly constructed components.
    pub fn new(router: FallbackRouter<B>, cache: TtlCache<C>) -> Self {
        Self {
            router,
            cache,
            rates_ttl: None,
        }
    }

    /// Override the TTL used for rate read views.
    pub fn with_rates_ttl(mut self, ttl: Duration) -> Self {
        self.rates_ttl = Some(ttl);
        self
    }

    /// Get a reference to the router.
    pub fn router(&self) -> &FallbackRouter<B> {
        &self.router
    }

    /// Get a reference to the cache front.
    pub fn cache(&self) -> &TtlCache<C> {
        &self.cache
    }

    /// Read rate records through the cache.
    pub async fn rates(&self, filter: &RateFilter) -> EggRateResult<Vec<RateRecord>> {
        let (logical_name, params) = cache_query(filter);
        let source = RouterSource {
            router: &self.router,
            filter,
        };
        self.cache
            .get_or_compute(Dataset::Rates, logical_name, &params, self.rates_ttl, &source)
            .await
    }

    /// Upsert a rate and invalidate derived read views.
    ///
    /// The write must succeed for the call to succeed; the invalidation is
    /// advisory like every other cache operation, so a cache fault after a
    /// committed write is logged and absorbed.
    pub async fn upsert_rate(&self, input: &NewRate) -> EggRateResult<RateId> {
        let rate_id = self.router.upsert_rate(input).await?;

        if let Err(error) = self.cache.invalidate_all().await {
            tracing::warn!(%error, "cache invalidation failed after committed write");
        }

        Ok(rate_id)
    }
}

/// Map a read filter to its logical cache name and parameter set.
fn cache_query(filter: &RateFilter) -> (&'static str, CacheParams) {
    match filter {
        RateFilter::All => ("rates_all", CacheParams::new()),
        RateFilter::State { state } => ("rates_by_state", CacheParams::new().with("state", state)),
        RateFilter::City { state, city } => (
            "rates_by_city",
            CacheParams::new().with("state", state).with("city", city),
        ),
        RateFilter::Date { date } => (
            "rates_by_date",
            CacheParams::new().with("date", date.to_string()),
        ),
    }
}

/// Adapts a router read into the cache's compute seam.
struct RouterSource<'a, B: DualPathBackend> {
    router: &'a FallbackRouter<B>,
    filter: &'a RateFilter,
}

#[async_trait]
impl<B: DualPathBackend> RateSource<Vec<RateRecord>> for RouterSource<'_, B> {
    async fn load(&self) -> EggRateResult<Vec<RateRecord>> {
        self.router.fetch_rates(self.filter).await
    }
}
