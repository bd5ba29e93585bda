use std::{
    fmt::Debug,
    future::{Future, ready},
    hash::Hash,
    sync::LazyLock,
};

use axum_prometheus::metrics;
use futures::FutureExt;
use moka::{
    future::Cache,
    ops::compute::{CompResult, Op},
};
use tokio::task::JoinError;

use super::DeferredComputation;

const METRIC_COLLECTION_CACHE_SIZE: &str = "docstore_collection_cache_size";
const METRIC_COLLECTION_CACHE_HITS: &str = "docstore_collection_cache_hits_total";
const METRIC_COLLECTION_CACHE_MISSES: &str = "docstore_collection_cache_misses_total";
const METRIC_COLLECTION_CACHE_REFRESHES: &str = "docstore_collection_cache_refreshes_total";

static METRICS_INITIALIZED: LazyLock<()> = LazyLock::new(|| {
    metrics::describe_gauge!(
        METRIC_COLLECTION_CACHE_SIZE,
        "Current number of entries in the collection caches"
    );
    metrics::describe_counter!(
        METRIC_COLLECTION_CACHE_HITS,
        "Total number of collection cache hits"
    );
    metrics::describe_counter!(
        METRIC_COLLECTION_CACHE_MISSES,
        "Total number of collection cache misses"
    );
    metrics::describe_counter!(
        METRIC_COLLECTION_CACHE_REFRESHES,
        "Total number of collection cache entries replaced by a refresh"
    );
});

/// Per-key memoizing cache where every entry is a [`DeferredComputation`].
///
/// At most one computation per key is in flight. All mutations go through
/// moka's per-key serialized `and_compute_with`, so concurrent installs for the
/// same key never race. Entries are never evicted by size or age; failed
/// entries are dropped once observed so the next caller computes afresh.
pub struct ResolutionCache<K, V, E> {
    name: &'static str,
    entries: Cache<K, DeferredComputation<V, E>>,
}

impl<K, V, E> Clone for ResolutionCache<K, V, E>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: self.entries.clone(),
        }
    }
}

impl<K, V, E> std::fmt::Debug for ResolutionCache<K, V, E>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("name", &self.name)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

impl<K, V, E> ResolutionCache<K, V, E>
where
    K: Clone + Debug + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// Creates an empty cache. `name` labels metrics and logs.
    #[must_use]
    pub fn new(name: &'static str, initial_capacity: usize) -> Self {
        let () = &*METRICS_INITIALIZED;
        Self {
            name,
            entries: Cache::builder()
                .name(name)
                .initial_capacity(initial_capacity)
                .build(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the cached outcome for `key`, computing it if no entry exists.
    ///
    /// Concurrent callers for a key without an entry share one computation.
    ///
    /// # Errors
    /// Returns the error of the computation. The failed entry is removed
    /// afterwards.
    pub async fn get<F, Fut>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(entry) = self.entries.get(key).await {
            tracing::debug!(cache = self.name, "Cache hit for {key:?}");
            metrics::counter!(METRIC_COLLECTION_CACHE_HITS, "cache_type" => self.name)
                .increment(1);
            return self.observe(key, entry).await;
        }

        metrics::counter!(METRIC_COLLECTION_CACHE_MISSES, "cache_type" => self.name).increment(1);
        let result = self
            .entries
            .entry(key.clone())
            .and_compute_with(|current| {
                ready(match current {
                    // Another caller installed an entry since our lookup.
                    Some(_) => Op::Nop,
                    None => Op::Put(DeferredComputation::new(compute())),
                })
            })
            .await;
        let entry = self.installed(key, result);
        self.observe(key, entry).await
    }

    /// Unconditionally replaces the entry for `key` and waits for the new value.
    ///
    /// # Errors
    /// Returns the error of the computation.
    pub async fn refresh<F, Fut>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let result = self
            .entries
            .entry(key.clone())
            .and_compute_with(|_| ready(Op::Put(DeferredComputation::new(compute()))))
            .await;
        metrics::counter!(METRIC_COLLECTION_CACHE_REFRESHES, "cache_type" => self.name)
            .increment(1);
        let entry = self.installed(key, result);
        self.observe(key, entry).await
    }

    /// Replaces the entry for `key` only if its value is stale.
    ///
    /// The current entry is awaited and passed to `is_stale` together with
    /// `stale_hint`. A failed entry is always stale. A new computation is
    /// installed only if the entry is still the one that was judged stale;
    /// if another caller already replaced it, that replacement is awaited
    /// instead. Without an entry this behaves like [`Self::get`].
    ///
    /// # Errors
    /// Returns the error of the awaited computation.
    pub async fn conditional_refresh<H, C, F, Fut>(
        &self,
        key: &K,
        stale_hint: &H,
        is_stale: C,
        compute: F,
    ) -> Result<V, E>
    where
        H: ?Sized + Sync,
        C: FnOnce(&V, &H) -> bool + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let Some(observed) = self.entries.get(key).await else {
            return self.get(key, compute).await;
        };

        if let Ok(current) = observed.get().await
            && !is_stale(&current, stale_hint)
        {
            tracing::debug!(
                cache = self.name,
                "Entry for {key:?} no longer matches the stale hint, skipping refresh"
            );
            metrics::counter!(METRIC_COLLECTION_CACHE_HITS, "cache_type" => self.name)
                .increment(1);
            return Ok(current);
        }

        let result = self
            .entries
            .entry(key.clone())
            .and_compute_with(|current| {
                ready(match current {
                    Some(current) if !current.value().ptr_eq(&observed) => Op::Nop,
                    _ => Op::Put(DeferredComputation::new(compute())),
                })
            })
            .await;
        if matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        ) {
            metrics::counter!(METRIC_COLLECTION_CACHE_REFRESHES, "cache_type" => self.name)
                .increment(1);
        }
        let entry = self.installed(key, result);
        self.observe(key, entry).await
    }

    /// Installs an already resolved value for `key`.
    pub async fn set(&self, key: K, value: V) {
        let result = self
            .entries
            .entry(key)
            .and_compute_with(|_| ready(Op::Put(DeferredComputation::resolved(value))))
            .await;
        if let CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) = result {
            tracing::debug!(cache = self.name, "Seeded entry for {:?}", entry.key());
        }
        self.update_cache_size_metric();
    }

    /// The resolved value for `key`, if any, without computing or waiting.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key).await?;
        entry.get().now_or_never().and_then(Result::ok)
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    fn installed(
        &self,
        key: &K,
        result: CompResult<K, DeferredComputation<V, E>>,
    ) -> DeferredComputation<V, E> {
        match result {
            CompResult::Inserted(entry) => {
                tracing::debug!(cache = self.name, "Installed entry for {key:?}");
                self.update_cache_size_metric();
                entry.into_value()
            }
            CompResult::ReplacedWith(entry) => {
                tracing::debug!(cache = self.name, "Replaced entry for {key:?}");
                entry.into_value()
            }
            CompResult::Unchanged(entry) => entry.into_value(),
            CompResult::StillNone(_) | CompResult::Removed(_) => {
                unreachable!("install operations either put or keep an entry")
            }
        }
    }

    async fn observe(&self, key: &K, entry: DeferredComputation<V, E>) -> Result<V, E> {
        let result = entry.get().await;
        if result.is_err() {
            self.evict_failed(key, &entry).await;
        }
        result
    }

    async fn evict_failed(&self, key: &K, failed: &DeferredComputation<V, E>) {
        let result = self
            .entries
            .entry(key.clone())
            .and_compute_with(|current| {
                ready(match current {
                    Some(current) if current.value().ptr_eq(failed) => Op::Remove,
                    _ => Op::Nop,
                })
            })
            .await;
        if let CompResult::Removed(_) = result {
            tracing::warn!(cache = self.name, "Removed failed entry for {key:?}");
            self.update_cache_size_metric();
        }
    }

    #[inline]
    #[allow(clippy::cast_precision_loss)]
    fn update_cache_size_metric(&self) {
        metrics::gauge!(METRIC_COLLECTION_CACHE_SIZE, "cache_type" => self.name)
            .set(self.entries.entry_count() as f64);
    }
}
