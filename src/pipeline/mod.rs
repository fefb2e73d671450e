//! Assembly of the decorator chain.
//!
//! # Data Flow
//! ```text
//! GeocodeConfig
//!     → providers/ (one adapter per [[providers]] entry)
//!     → Throttler per adapter ([providers.throttle])
//!     → LoadBalancer over all throttled adapters ([balancer])
//!     → CachedGeocoder on top ([cache], optional FileStore)
//!     → Pipeline (the Geocoder handed to the HTTP front door)
//! ```
//!
//! # Design Decisions
//! - Composition is by wrapping; no decorator reaches into another's state
//! - Handles to the cache and balancer are kept for introspection only

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;

use crate::cache::{CacheSettings, CacheStore, CachedGeocoder, FileStore};
use crate::config::GeocodeConfig;
use crate::geocoder::{GeocodeError, Geocoder, SearchFuture, SearchOptions};
use crate::load_balancer::{BalancerSettings, LoadBalancer, LoadBalancerStats};
use crate::observability::metrics;
use crate::providers;
use crate::resilience::{QueueSettings, Throttler};

/// Failure to assemble a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSettings {
    pub cache: CacheSettings,
    pub balancer: BalancerSettings,
}

/// Snapshot for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub cache_entries: usize,
    pub cache_pending: usize,
    pub cache_write_failures: u64,
    pub balancer: LoadBalancerStats,
}

/// Cache → LoadBalancer → Fallback chains → Throttlers → providers.
#[derive(Clone)]
pub struct Pipeline {
    cache: Arc<CachedGeocoder>,
    balancer: Arc<LoadBalancer>,
}

impl Pipeline {
    /// Wrap each provider in a throttler with its settings, then balance and cache.
    pub fn new(
        providers: Vec<(Arc<dyn Geocoder>, QueueSettings)>,
        settings: PipelineSettings,
        durable: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self, GeocodeError> {
        let throttled = providers
            .into_iter()
            .map(|(provider, throttle)| Arc::new(Throttler::new(provider, throttle)) as Arc<dyn Geocoder>)
            .collect();
        let balancer = Arc::new(LoadBalancer::new(throttled, settings.balancer)?);

        let mut cache = CachedGeocoder::new(balancer.clone(), settings.cache);
        if let Some(store) = durable {
            cache = cache.with_durable(store);
        }

        Ok(Self {
            cache: Arc::new(cache),
            balancer,
        })
    }

    /// Build adapters, throttles, balancer and cache from validated config.
    pub fn from_config(config: &GeocodeConfig) -> Result<Self, PipelineError> {
        let client = providers::http_client(Duration::from_secs(config.server.request_timeout_secs))?;
        let adapters = config
            .providers
            .iter()
            .map(|provider| {
                (
                    providers::build_provider(provider, client.clone()),
                    provider.throttle.settings(),
                )
            })
            .collect();

        let durable = match &config.cache.file_path {
            Some(path) => Some(
                Arc::new(FileStore::open(path, config.cache.capacity)) as Arc<dyn CacheStore>
            ),
            None => None,
        };

        let settings = PipelineSettings {
            cache: config.cache.settings(),
            balancer: config.balancer.settings(),
        };
        tracing::info!(
            providers = config.providers.len(),
            cache_capacity = settings.cache.capacity,
            durable_cache = config.cache.file_path.is_some(),
            "Building geocoder pipeline"
        );
        Ok(Self::new(adapters, settings, durable)?)
    }

    pub fn cache(&self) -> &CachedGeocoder {
        &self.cache
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            cache_entries: self.cache.len(),
            cache_pending: self.cache.pending_len(),
            cache_write_failures: self.cache.write_failures(),
            balancer: self.balancer.stats(),
        }
    }
}

impl Geocoder for Pipeline {
    fn name(&self) -> &str {
        self.cache.name()
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            let started = Instant::now();
            let result = self.cache.search(query, opts).await;

            let outcome = match &result {
                Ok(Some(_)) => "found",
                Ok(None) => "not_found",
                Err(e) => e.code(),
            };
            metrics::record_search(outcome, started);
            tracing::debug!(query = %query, outcome, elapsed_ms = started.elapsed().as_millis() as u64, "Search finished");
            result
        }
        .boxed()
    }
}
