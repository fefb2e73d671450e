//! Bounded work queue in front of a single provider.
//!
//! # Responsibilities
//! - Cap simultaneous in-flight calls (semaphore)
//! - Cap calls per time window (governor rate limiter)
//! - Enforce an optional per-call timeout
//! - Track load (queued + in-flight) for routing and admission control
//!
//! # State Machine
//! ```text
//! admit ──▶ queued ──(permit + rate budget)──▶ running ──▶ resolved | rejected
//!              │                                  │
//!              └──── cancelled (token fired) ◀────┘ (checked once more on dequeue)
//! ```
//!
//! # Design Decisions
//! - Every request is admitted through the queue, even under zero load
//! - Counters are released by an RAII guard on every exit path
//! - No FIFO guarantee beyond the semaphore's fairness

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;

use crate::geocoder::{GeocodeError, SearchOptions};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// At most `cap` calls start within any `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCap {
    pub cap: u32,
    pub interval: Duration,
}

/// Queue limits. The default is unbounded with no timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSettings {
    /// Maximum simultaneous in-flight calls. `None` means unbounded.
    pub concurrency: Option<usize>,
    pub rate: Option<RateCap>,
    pub timeout: Option<Duration>,
}

/// Concurrency/rate-limited queue with live load counters.
pub struct WorkQueue {
    name: String,
    permits: Option<Semaphore>,
    limiter: Option<DirectRateLimiter>,
    timeout: Option<Duration>,
    /// Queued plus running.
    load: AtomicUsize,
    running: AtomicUsize,
}

impl WorkQueue {
    pub fn new(name: impl Into<String>, settings: QueueSettings) -> Self {
        Self {
            name: name.into(),
            permits: settings
                .concurrency
                .map(|limit| Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS))),
            limiter: settings
                .rate
                .map(|rate| RateLimiter::direct(quota_for(rate))),
            timeout: settings.timeout,
            load: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queued plus in-flight.
    pub fn load(&self) -> usize {
        self.load.load(Ordering::Acquire)
    }

    /// In-flight calls.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Admitted but not yet started.
    pub fn queued(&self) -> usize {
        self.load().saturating_sub(self.running())
    }

    /// Admit unconditionally.
    pub fn admit(&self) -> Admission<'_> {
        self.load.fetch_add(1, Ordering::AcqRel);
        Admission {
            queue: self,
            started: false,
        }
    }

    /// Admit only while load is below `max`. On rejection returns the load
    /// that was observed.
    pub fn try_admit(&self, max: usize) -> Result<Admission<'_>, usize> {
        let mut current = self.load.load(Ordering::Acquire);
        loop {
            if current >= max {
                return Err(current);
            }
            match self.load.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        Ok(Admission {
            queue: self,
            started: false,
        })
    }

    /// Wait for capacity, then run `task`.
    ///
    /// Fails with [`GeocodeError::Cancelled`] if the token fires while queued
    /// or has fired by the time the task is dequeued, and with
    /// [`GeocodeError::Timeout`] if the task outlives the configured timeout.
    pub async fn run<T, F, Fut>(
        &self,
        mut admission: Admission<'_>,
        opts: &SearchOptions,
        task: F,
    ) -> Result<T, GeocodeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GeocodeError>>,
    {
        let _permit = match &self.permits {
            Some(permits) => Some(
                opts.race(permits.acquire())
                    .await?
                    .map_err(|_| GeocodeError::Internal(format!("queue '{}' closed", self.name)))?,
            ),
            None => None,
        };

        if let Some(limiter) = &self.limiter {
            opts.race(limiter.until_ready()).await?;
        }

        // A request cancelled while queued never reaches the provider.
        opts.ensure_active()?;
        admission.start();

        match self.timeout {
            Some(after) => match tokio::time::timeout(after, task()).await {
                Ok(result) => result,
                Err(_) => Err(GeocodeError::Timeout {
                    provider: self.name.clone(),
                    after,
                }),
            },
            None => task().await,
        }
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.name)
            .field("load", &self.load())
            .field("running", &self.running())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A slot in a [`WorkQueue`]. Releases its counters on drop.
#[derive(Debug)]
pub struct Admission<'q> {
    queue: &'q WorkQueue,
    started: bool,
}

impl Admission<'_> {
    fn start(&mut self) {
        if !self.started {
            self.started = true;
            self.queue.running.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.started {
            self.queue.running.fetch_sub(1, Ordering::AcqRel);
        }
        self.queue.load.fetch_sub(1, Ordering::AcqRel);
    }
}

fn quota_for(rate: RateCap) -> Quota {
    let cap = NonZeroU32::new(rate.cap).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (rate.interval.as_secs_f64() / f64::from(cap.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(cap))
        .allow_burst(cap)
}
