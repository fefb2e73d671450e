//! Throttler decorator: routes every call through a bounded [`WorkQueue`].

use std::sync::Arc;

use futures_util::FutureExt;

use crate::geocoder::{GeocodeError, Geocoder, SearchFuture, SearchOptions};
use crate::observability::metrics;
use crate::resilience::queue::{QueueSettings, WorkQueue};

/// Bounds concurrency and call rate against a single provider.
pub struct Throttler {
    inner: Arc<dyn Geocoder>,
    queue: WorkQueue,
}

impl Throttler {
    pub fn new(inner: Arc<dyn Geocoder>, settings: QueueSettings) -> Self {
        let queue = WorkQueue::new(inner.name(), settings);
        Self { inner, queue }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }
}

impl Geocoder for Throttler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            opts.ensure_active()?;

            let admission = self.queue.admit();
            let result = self
                .queue
                .run(admission, opts, || self.inner.search(query, opts))
                .await;

            if let Err(GeocodeError::Timeout { provider, after }) = &result {
                tracing::warn!(provider = %provider, timeout = ?after, query = %query, "Throttled call timed out");
                metrics::record_timeout(provider);
            }
            result
        }
        .boxed()
    }
}
