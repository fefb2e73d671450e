//! Provider slot abstraction.
//!
//! # Responsibilities
//! - Represent one provider inside the balancer
//! - Hold the provider's fallback chain (itself first, then its peers)
//! - Own the provider's queue and expose its live load

use std::sync::Arc;

use serde::Serialize;

use crate::geocoder::Geocoder;
use crate::resilience::{QueueSettings, WorkQueue};

/// A single provider as seen by the balancer.
pub struct ProviderSlot {
    /// Name of the provider at the head of the chain.
    pub name: String,
    /// The provider followed by its peers as fallbacks.
    pub chain: Arc<dyn Geocoder>,
    pub queue: WorkQueue,
}

impl ProviderSlot {
    pub fn new(name: impl Into<String>, chain: Arc<dyn Geocoder>, settings: QueueSettings) -> Self {
        let name = name.into();
        Self {
            queue: WorkQueue::new(name.clone(), settings),
            name,
            chain,
        }
    }

    /// Queued plus in-flight requests.
    pub fn load(&self) -> usize {
        self.queue.load()
    }

    pub fn snapshot(&self) -> ProviderLoad {
        let pending = self.queue.running();
        let load = self.queue.load();
        ProviderLoad {
            name: self.name.clone(),
            queued: load.saturating_sub(pending),
            pending,
            load,
        }
    }
}

/// Point-in-time load of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLoad {
    pub name: String,
    /// Admitted, waiting for capacity.
    pub queued: usize,
    /// In flight.
    pub pending: usize,
    pub load: usize,
}
