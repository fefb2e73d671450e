//! Caching decorator.
//!
//! # Data Flow
//! ```text
//! search(query)
//!     → cancelled already? → RequestCancelled
//!     → memory.rs (LRU) → hit / negative hit → return
//!     → durable tier (file.rs) → hit → promote into memory → return
//!     → pending registry → identical search in flight? → join it
//!     → spawn upstream call
//!         → settle: write memory, spawn durable write, leave registry
//!     ← each caller races the shared outcome against its own token
//! ```
//!
//! # Design Decisions
//! - Check-then-insert on the registry happens under one DashMap shard lock
//! - The upstream call runs in its own task, so a caller giving up never
//!   tears down work other callers are waiting on
//! - An entry stays joinable until its call settles, even after every caller
//!   left; there is never more than one upstream call per query
//! - Nothing is written when no caller is left at settle time
//! - Storage failures are logged and counted, never returned

pub mod file;
pub mod memory;
pub mod store;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

use crate::geocoder::{GeocodeError, Geocoder, SearchFuture, SearchOptions, SearchResult};
use crate::observability::metrics;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{CacheStore, CachedResult};

type SharedOutcome = Shared<BoxFuture<'static, SearchResult>>;
type Registry = DashMap<String, PendingSearch>;

/// Cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub capacity: usize,
    /// `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: None,
        }
    }
}

/// Number of callers attached to one in-flight upstream call.
#[derive(Debug)]
struct Waiters(AtomicUsize);

impl Waiters {
    /// Created with its first caller already attached.
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicUsize::new(1)))
    }

    fn join(self: &Arc<Self>) -> WaiterGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        WaiterGuard {
            waiters: Arc::clone(self),
        }
    }

    fn remaining(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Held by each caller for as long as it awaits the shared outcome.
struct WaiterGuard {
    waiters: Arc<Waiters>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.waiters.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct PendingSearch {
    id: u64,
    outcome: SharedOutcome,
    waiters: Arc<Waiters>,
}

/// Removes one registry entry when dropped, including on unwind.
struct Registration {
    pending: Arc<Registry>,
    query: String,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let id = self.id;
        self.pending.remove_if(&self.query, |_, entry| entry.id == id);
    }
}

/// Where settled results go.
#[derive(Clone)]
struct Tiers {
    memory: Arc<MemoryStore>,
    durable: Option<Arc<dyn CacheStore>>,
    ttl: Option<Duration>,
    write_failures: Arc<AtomicU64>,
}

impl Tiers {
    fn write(&self, query: &str, cached: CachedResult) {
        self.memory.put(query.to_string(), cached.clone());

        let Some(durable) = self.durable.clone() else {
            return;
        };
        let key = query.to_string();
        let ttl = self.ttl;
        let write_failures = Arc::clone(&self.write_failures);
        tokio::spawn(async move {
            if let Err(e) = durable.set(&key, cached, ttl).await {
                write_failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_write_failure();
                tracing::warn!(query = %key, error = %e, "Durable cache write failed");
            }
        });
    }
}

/// Two-tier, deduplicating, negative-caching geocoder decorator.
pub struct CachedGeocoder {
    name: String,
    inner: Arc<dyn Geocoder>,
    tiers: Tiers,
    pending: Arc<Registry>,
    next_id: AtomicU64,
}

impl CachedGeocoder {
    pub fn new(inner: Arc<dyn Geocoder>, settings: CacheSettings) -> Self {
        Self {
            name: format!("cache({})", inner.name()),
            inner,
            tiers: Tiers {
                memory: Arc::new(MemoryStore::new(settings.capacity, settings.ttl)),
                durable: None,
                ttl: settings.ttl,
                write_failures: Arc::new(AtomicU64::new(0)),
            },
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Add a durable tier behind memory.
    pub fn with_durable(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.tiers.durable = Some(store);
        self
    }

    /// Entries in the memory tier.
    pub fn len(&self) -> usize {
        self.tiers.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.memory.is_empty()
    }

    /// Distinct queries currently in flight upstream.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Durable writes that failed since startup.
    pub fn write_failures(&self) -> u64 {
        self.tiers.write_failures.load(Ordering::Relaxed)
    }

    /// Drop every memory entry. The durable tier is left alone.
    pub fn clear(&self) {
        self.tiers.memory.clear();
    }

    /// `Some(result)` on a hit in either tier, `None` on a miss.
    async fn lookup(&self, query: &str) -> Option<CachedResult> {
        if let Some(cached) = self.tiers.memory.get(query) {
            metrics::record_cache_lookup(hit_label(&cached));
            tracing::debug!(query = %query, negative = cached.is_negative(), "Cache hit");
            return Some(cached);
        }

        if let Some(durable) = &self.tiers.durable {
            match durable.get(query).await {
                Ok(Some(cached)) => {
                    self.tiers.memory.put(query.to_string(), cached.clone());
                    metrics::record_cache_lookup(hit_label(&cached));
                    tracing::debug!(query = %query, "Promoted durable cache entry");
                    return Some(cached);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Durable cache read failed");
                }
            }
        }

        metrics::record_cache_lookup("miss");
        tracing::debug!(query = %query, "Cache miss");
        None
    }

    /// Join the in-flight search for `query`, or start one.
    fn join_or_start(&self, query: &str) -> (SharedOutcome, WaiterGuard) {
        match self.pending.entry(query.to_string()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.get();
                let guard = entry.waiters.join();
                metrics::record_cache_dedup();
                tracing::debug!(query = %query, "Joined in-flight search");
                (entry.outcome.clone(), guard)
            }
            Entry::Vacant(vacant) => {
                let (pending, guard) = self.start(query);
                let outcome = pending.outcome.clone();
                vacant.insert(pending);
                (outcome, guard)
            }
        }
    }

    fn start(&self, query: &str) -> (PendingSearch, WaiterGuard) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let waiters = Waiters::new();
        let guard = WaiterGuard {
            waiters: Arc::clone(&waiters),
        };

        let registration = Registration {
            pending: Arc::clone(&self.pending),
            query: query.to_string(),
            id,
        };
        let task = settle_upstream(
            registration,
            Arc::clone(&self.inner),
            self.tiers.clone(),
            Arc::clone(&waiters),
        );
        let handle = tokio::spawn(task);
        let outcome = async move {
            handle.await.unwrap_or_else(|e| {
                Err(GeocodeError::Internal(format!("upstream search task failed: {e}")))
            })
        }
        .boxed()
        .shared();

        (
            PendingSearch {
                id,
                outcome,
                waiters,
            },
            guard,
        )
    }
}

fn hit_label(cached: &CachedResult) -> &'static str {
    if cached.is_negative() {
        "negative_hit"
    } else {
        "hit"
    }
}

/// Run the upstream call and record its outcome. The registry entry goes
/// away when `registration` drops, after the memory write.
async fn settle_upstream(
    registration: Registration,
    inner: Arc<dyn Geocoder>,
    tiers: Tiers,
    waiters: Arc<Waiters>,
) -> SearchResult {
    let query = registration.query.as_str();
    let result = inner.search(query, &SearchOptions::default()).await;

    match &result {
        Ok(_) if waiters.remaining() == 0 => {
            tracing::debug!(query = %query, "Search abandoned by every caller, not caching");
        }
        Ok(found) => tiers.write(query, CachedResult::from(found.clone())),
        Err(e) => {
            tracing::debug!(query = %query, error = %e, "Upstream search failed, not caching");
        }
    }

    result
}

impl Geocoder for CachedGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            opts.ensure_active()?;

            if let Some(cached) = self.lookup(query).await {
                return Ok(cached.into_option());
            }
            opts.ensure_active()?;

            let (outcome, _guard) = self.join_or_start(query);
            opts.race(outcome).await?
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::testing::{address, provider_failure, Reply, ScriptedGeocoder};
    use crate::geocoder::{Address, CancellationToken, PlaceType, StorageError};
    use std::sync::atomic::AtomicUsize;

    fn cached(inner: &Arc<ScriptedGeocoder>) -> Arc<CachedGeocoder> {
        Arc::new(CachedGeocoder::new(inner.clone(), CacheSettings::default()))
    }

    /// Durable tier whose writes always fail.
    struct BrokenStore {
        writes: AtomicUsize,
    }

    impl CacheStore for BrokenStore {
        fn get<'a>(
            &'a self,
            _key: &'a str,
        ) -> BoxFuture<'a, Result<Option<CachedResult>, StorageError>> {
            async { Err(StorageError::Io(std::io::Error::other("disk on fire"))) }.boxed()
        }

        fn set<'a>(
            &'a self,
            _key: &'a str,
            _value: CachedResult,
            _ttl: Option<Duration>,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::Io(std::io::Error::other("disk on fire"))) }.boxed()
        }
    }

    #[tokio::test]
    async fn second_search_is_served_from_memory() {
        let inner = Arc::new(
            ScriptedGeocoder::new("osm").reply("paris", Reply::Found(address("osm", "Paris"))),
        );
        let cache = cached(&inner);

        let first = cache.search("paris", &SearchOptions::default()).await.unwrap();
        let second = cache.search("paris", &SearchOptions::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.unwrap().name, "Paris");
        assert_eq!(inner.calls(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test]
    async fn not_found_is_cached_as_negative() {
        let inner = Arc::new(ScriptedGeocoder::new("osm").reply("atlantis", Reply::NotFound));
        let cache = cached(&inner);

        assert_eq!(cache.search("atlantis", &SearchOptions::default()).await, Ok(None));
        assert_eq!(cache.search("atlantis", &SearchOptions::default()).await, Ok(None));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let inner = Arc::new(ScriptedGeocoder::new("osm").reply("x", Reply::Fail(provider_failure("osm"))));
        let cache = cached(&inner);

        assert!(cache.search("x", &SearchOptions::default()).await.is_err());
        assert!(cache.search("x", &SearchOptions::default()).await.is_err());
        assert_eq!(inner.calls(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test]
    async fn already_cancelled_never_reaches_upstream() {
        let inner = Arc::new(ScriptedGeocoder::new("osm"));
        let cache = cached(&inner);
        let token = CancellationToken::new();
        token.cancel();

        let result = cache
            .search("paris", &SearchOptions::with_cancellation(token))
            .await;

        assert_eq!(result, Err(GeocodeError::Cancelled));
        assert_eq!(inner.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_identical_searches_share_one_call() {
        let (inner, gate) = ScriptedGeocoder::new("osm").gated();
        let inner = Arc::new(inner.reply("rome", Reply::Found(address("osm", "Roma"))));
        let cache = cached(&inner);

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.search("rome", &SearchOptions::default()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.pending_len(), 1);

        gate.send_replace(true);
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap().unwrap().name, "Roma");
        }
        assert_eq!(inner.calls(), 1);
        assert_eq!(cache.pending_len(), 0);
    }

    #[tokio::test]
    async fn shared_failure_reaches_every_waiter() {
        let (inner, gate) = ScriptedGeocoder::new("osm").gated();
        let inner = Arc::new(inner.reply("x", Reply::Fail(provider_failure("osm"))));
        let cache = cached(&inner);

        let callers: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.search("x", &SearchOptions::default()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(30)).await;
        gate.send_replace(true);

        for caller in callers {
            assert_eq!(caller.await.unwrap(), Err(provider_failure("osm")));
        }
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn one_caller_cancelling_does_not_affect_the_others() {
        let (inner, gate) = ScriptedGeocoder::new("osm").gated();
        let inner = Arc::new(inner.reply("oslo", Reply::Found(address("osm", "Oslo"))));
        let cache = cached(&inner);
        let token = CancellationToken::new();

        let impatient = {
            let cache = cache.clone();
            let opts = SearchOptions::with_cancellation(token.clone());
            tokio::spawn(async move { cache.search("oslo", &opts).await })
        };
        let patient = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.search("oslo", &SearchOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        token.cancel();
        assert_eq!(impatient.await.unwrap(), Err(GeocodeError::Cancelled));

        gate.send_replace(true);
        assert_eq!(patient.await.unwrap().unwrap().unwrap().name, "Oslo");
        assert_eq!(inner.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_search_is_not_cached() {
        let (inner, gate) = ScriptedGeocoder::new("osm").gated();
        let inner = Arc::new(inner.reply("oslo", Reply::Found(address("osm", "Oslo"))));
        let cache = cached(&inner);
        let token = CancellationToken::new();

        let caller = {
            let cache = cache.clone();
            let opts = SearchOptions::with_cancellation(token.clone());
            tokio::spawn(async move { cache.search("oslo", &opts).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        assert_eq!(caller.await.unwrap(), Err(GeocodeError::Cancelled));

        // The upstream call still finishes, but its result is dropped.
        gate.send_replace(true);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.is_empty());
        assert_eq!(cache.pending_len(), 0);

        // Only once the first call has settled does a new one start.
        let found = cache.search("oslo", &SearchOptions::default()).await.unwrap();
        assert_eq!(found.unwrap().name, "Oslo");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn caller_after_everyone_left_rejoins_the_running_call() {
        let (inner, gate) = ScriptedGeocoder::new("osm").gated();
        let inner = Arc::new(inner.reply("oslo", Reply::Found(address("osm", "Oslo"))));
        let cache = cached(&inner);
        let token = CancellationToken::new();

        let leaver = {
            let cache = cache.clone();
            let opts = SearchOptions::with_cancellation(token.clone());
            tokio::spawn(async move { cache.search("oslo", &opts).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        assert_eq!(leaver.await.unwrap(), Err(GeocodeError::Cancelled));

        let latecomer = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.search("oslo", &SearchOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(inner.calls(), 1);
        assert_eq!(cache.pending_len(), 1);

        gate.send_replace(true);
        assert_eq!(latecomer.await.unwrap().unwrap().unwrap().name, "Oslo");
        assert_eq!(inner.calls(), 1);
        // Someone was waiting when it settled, so it is cached.
        assert_eq!(cache.len(), 1);
    }

    /// Geocoder that panics mid-search.
    struct Panicking;

    impl Geocoder for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn search<'a>(&'a self, _query: &'a str, _opts: &'a SearchOptions) -> SearchFuture<'a> {
            async { panic!("provider bug") }.boxed()
        }
    }

    #[tokio::test]
    async fn panicking_upstream_leaves_no_pending_entry() {
        let cache = CachedGeocoder::new(Arc::new(Panicking), CacheSettings::default());

        let result = cache.search("oslo", &SearchOptions::default()).await;

        assert!(matches!(result, Err(GeocodeError::Internal(_))));
        assert_eq!(cache.pending_len(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn durable_hit_is_promoted_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path().join("cache.json"), 100));
        let lima = Address::new("osm", "Lima", PlaceType::City, 0.7);
        store
            .set("lima", CachedResult::Found(lima.clone()), None)
            .await
            .unwrap();

        let inner = Arc::new(ScriptedGeocoder::new("osm"));
        let cache = CachedGeocoder::new(inner.clone(), CacheSettings::default()).with_durable(store);

        assert_eq!(cache.search("lima", &SearchOptions::default()).await, Ok(Some(lima)));
        assert_eq!(inner.calls(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn results_are_written_to_the_durable_tier() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path().join("cache.json"), 100));
        let inner = Arc::new(ScriptedGeocoder::new("osm").reply("nowhere", Reply::NotFound));
        let cache =
            CachedGeocoder::new(inner.clone(), CacheSettings::default()).with_durable(store.clone());

        assert_eq!(cache.search("nowhere", &SearchOptions::default()).await, Ok(None));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get("nowhere").await.unwrap(), Some(CachedResult::NotFound));
    }

    #[tokio::test]
    async fn broken_storage_never_fails_the_search() {
        let inner = Arc::new(
            ScriptedGeocoder::new("osm").reply("paris", Reply::Found(address("osm", "Paris"))),
        );
        let store = Arc::new(BrokenStore {
            writes: AtomicUsize::new(0),
        });
        let cache = CachedGeocoder::new(inner.clone(), CacheSettings::default())
            .with_durable(store.clone());

        let found = cache.search("paris", &SearchOptions::default()).await.unwrap();
        assert_eq!(found.unwrap().name, "Paris");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.write_failures(), 1);

        // Memory still serves the repeat.
        cache.search("paris", &SearchOptions::default()).await.unwrap();
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn clear_forgets_memory_entries() {
        let inner = Arc::new(ScriptedGeocoder::new("osm").reply("x", Reply::NotFound));
        let cache = cached(&inner);

        cache.search("x", &SearchOptions::default()).await.unwrap();
        cache.clear();
        cache.search("x", &SearchOptions::default()).await.unwrap();

        assert_eq!(inner.calls(), 2);
    }
}
