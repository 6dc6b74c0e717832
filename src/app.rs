//! Application façade: owns the shared reference cache, sequences
//! dataset refreshes, and exposes the surface the presentation shell
//! consumes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::{compute_fare, FareError, Location, SurchargeRule};
use crate::infra::cache::{Dataset, ReferenceCache, StoreError};
use crate::infra::remote::{DatasetClient, FetchError};
use crate::util::format_amount;

/// Shared freshness window before a dataset refresh is triggered.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Quiet period coalescing rapid recalculation triggers.
pub const RECALC_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// What the display layer renders after a calculation: the raw total,
/// its formatted form, and a user-facing message. Failures come back
/// with the total reset to zero, never as an error.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationView {
    pub ok: bool,
    pub total: f64,
    pub formatted: String,
    pub message: String,
}

impl CalculationView {
    fn success(total: f64) -> Self {
        let formatted = format_amount(total);
        let message = format!("Valor calculado: R$ {formatted}");
        Self {
            ok: true,
            total,
            formatted,
            message,
        }
    }

    fn failure(error: &FareError) -> Self {
        Self {
            ok: false,
            total: 0.0,
            formatted: format_amount(0.0),
            message: error.to_string(),
        }
    }
}

pub struct FareApp {
    cache: Arc<Mutex<ReferenceCache>>,
    client: DatasetClient,
    initialized: bool,
}

impl FareApp {
    pub fn new(cache: ReferenceCache, client: DatasetClient) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
            client: client.with_ttl(CACHE_TTL),
            initialized: false,
        }
    }

    /// Bring every dataset to a usable state. The required datasets
    /// refresh sequentially (locations, then routes) and a failure
    /// blocks readiness; the surcharge catalog is best-effort.
    pub async fn initialize(&mut self) -> Result<(), FetchError> {
        let mut cache = self.cache.lock().await;
        self.client
            .ensure_fresh(&mut cache, Dataset::Locations)
            .await?;
        self.client.ensure_fresh(&mut cache, Dataset::Routes).await?;
        self.client
            .ensure_fresh(&mut cache, Dataset::Surcharges)
            .await?;
        drop(cache);
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Manual "update data" action. True when every dataset is fresh
    /// afterwards.
    pub async fn refresh_all(&self) -> bool {
        let mut cache = self.cache.lock().await;
        for dataset in Dataset::ALL {
            if let Err(err) = self.client.ensure_fresh(&mut cache, dataset).await {
                warn!(%dataset, %err, "manual refresh failed");
                return false;
            }
        }
        true
    }

    pub async fn locations(&self) -> Vec<Location> {
        self.cache.lock().await.locations().to_vec()
    }

    /// Destination options for an origin, restricted to destinations
    /// that resolve to a known location.
    pub async fn destinations_for(&self, origin_id: &str) -> Vec<Location> {
        let cache = self.cache.lock().await;
        let Some(entry) = cache
            .routes()
            .iter()
            .find(|route| route.origin_id == origin_id)
        else {
            return Vec::new();
        };
        cache
            .locations()
            .iter()
            .filter(|location| entry.destinations.contains_key(&location.id))
            .cloned()
            .collect()
    }

    /// The surcharge catalog, in checklist order. Selections index into
    /// this list.
    pub async fn surcharge_catalog(&self) -> Vec<SurchargeRule> {
        self.cache.lock().await.surcharges().to_vec()
    }

    /// Compute and format a fare for display.
    pub async fn calculate(
        &self,
        origin_id: &str,
        destination_id: &str,
        selected: &[usize],
    ) -> CalculationView {
        let cache = self.cache.lock().await;
        match compute_fare(
            cache.routes(),
            cache.surcharges(),
            origin_id,
            destination_id,
            selected,
        ) {
            Ok(total) => CalculationView::success(total),
            Err(err) => {
                warn!(%err, origin_id, destination_id, "fare calculation failed");
                CalculationView::failure(&err)
            }
        }
    }

    /// Drop all cached reference data. The next initialize re-fetches
    /// everything.
    pub async fn clear_everything(&mut self) -> Result<(), StoreError> {
        self.initialized = false;
        self.cache.lock().await.clear_everything()
    }
}

/// Pending-computation slot for recalculation: each trigger overwrites
/// the previous one and only the survivor of the quiet period runs, so
/// at most one computation is ever in flight.
pub struct Debouncer {
    quiet_period: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    pub fn trigger<F>(&mut self, computation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
        let quiet_period = self.quiet_period;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            computation.await;
        }));
    }

    /// Drop the pending computation without running it.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(RECALC_QUIET_PERIOD)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
