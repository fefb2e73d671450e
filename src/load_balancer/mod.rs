//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! search(query)
//!     → least_load.rs (pick the slot with the lowest queued + in-flight count)
//!     → admission control (reject if that slot is at max_queue_size)
//!     → slot.rs (enqueue on the slot's own queue)
//!     → slot chain: provider[i] → Fallback → peers in index order
//!     → Return result, count timeouts
//! ```
//!
//! # Design Decisions
//! - Load-based routing, so slow or failing providers are routed around
//! - Every provider keeps its peers as fallbacks
//! - Admission is a hard boundary: a full queue fails fast, never retries
//! - Counters are atomics, readable at any time via `stats()`

pub mod least_load;
pub mod slot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;

use crate::geocoder::{GeocodeError, Geocoder, SearchFuture, SearchOptions};
use crate::observability::metrics;
use crate::resilience::{Fallback, QueueSettings};

pub use least_load::least_loaded;
pub use slot::{ProviderLoad, ProviderSlot};

/// Default admission limit per provider.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 256;

/// Balancer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancerSettings {
    /// Reject once a provider's queued + in-flight count reaches this.
    pub max_queue_size: usize,
    /// Queue applied to each provider slot.
    pub queue: QueueSettings,
}

impl Default for BalancerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            queue: QueueSettings::default(),
        }
    }
}

/// Read-only view of balancer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerStats {
    pub total_requests: u64,
    pub timeouts: u64,
    pub queue_full: u64,
    pub providers: Vec<ProviderLoad>,
}

/// Routes each search to the least-loaded provider.
pub struct LoadBalancer {
    slots: Vec<ProviderSlot>,
    max_queue_size: usize,
    total_requests: AtomicU64,
    timeouts: AtomicU64,
    queue_full: AtomicU64,
}

impl LoadBalancer {
    /// Wrap `providers`; each one gets the others, in index order, as fallbacks.
    pub fn new(
        providers: Vec<Arc<dyn Geocoder>>,
        settings: BalancerSettings,
    ) -> Result<Self, GeocodeError> {
        if providers.is_empty() {
            return Err(GeocodeError::NoProviders);
        }

        let slots = providers
            .iter()
            .enumerate()
            .map(|(i, provider)| {
                let chain = providers
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(provider.clone(), |chain, (_, peer)| {
                        Arc::new(Fallback::new(chain, peer.clone())) as Arc<dyn Geocoder>
                    });
                ProviderSlot::new(provider.name(), chain, settings.queue)
            })
            .collect::<Vec<_>>();

        tracing::info!(
            providers = slots.len(),
            max_queue_size = settings.max_queue_size,
            "Load balancer ready"
        );

        Ok(Self {
            slots,
            max_queue_size: settings.max_queue_size.max(1),
            total_requests: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            queue_full: AtomicU64::new(0),
        })
    }

    pub fn slots(&self) -> &[ProviderSlot] {
        &self.slots
    }

    pub fn stats(&self) -> LoadBalancerStats {
        LoadBalancerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            providers: self.slots.iter().map(ProviderSlot::snapshot).collect(),
        }
    }
}

impl Geocoder for LoadBalancer {
    fn name(&self) -> &str {
        "load_balancer"
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            opts.ensure_active()?;
            self.total_requests.fetch_add(1, Ordering::Relaxed);

            let slot = least_loaded(&self.slots).ok_or(GeocodeError::NoProviders)?;
            let admission = match slot.queue.try_admit(self.max_queue_size) {
                Ok(admission) => admission,
                Err(load) => {
                    self.queue_full.fetch_add(1, Ordering::Relaxed);
                    metrics::record_queue_full(&slot.name);
                    tracing::warn!(
                        provider = %slot.name,
                        load,
                        max = self.max_queue_size,
                        "Provider queue full, rejecting request"
                    );
                    return Err(GeocodeError::QueueFull {
                        provider: slot.name.clone(),
                        load,
                        max: self.max_queue_size,
                    });
                }
            };
            metrics::record_provider_load(&slot.name, slot.load());
            tracing::debug!(provider = %slot.name, load = slot.load(), query = %query, "Routed search");

            let result = slot
                .queue
                .run(admission, opts, || slot.chain.search(query, opts))
                .await;

            if let Err(GeocodeError::Timeout { after, .. }) = &result {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                metrics::record_timeout(&slot.name);
                tracing::warn!(provider = %slot.name, timeout = ?after, query = %query, "Provider call timed out");
            }
            metrics::record_provider_load(&slot.name, slot.load());
            result
        }
        .boxed()
    }
}
