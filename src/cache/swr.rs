//! Stale-while-revalidate cache
//!
//! `SwrCache::watch` hands out a `CacheHandle` per observer. The handle shows the
//! last stored value immediately and revalidates it in the background once it
//! is older than the observer's TTL. Failed fetches are reported alongside the
//! last good value and never replace it, in the session or on disk.

use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, Cacheable};
use super::error::FetchError;
use super::inflight::{InflightRegistry, SharedFetch};
use super::storage::CacheStorage;

/// A zero-argument fetch operation, callable any number of times
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Wraps an async closure returning any displayable error into a `Fetcher`.
pub fn fetcher<T, F, Fut, E>(f: F) -> Fetcher<T>
where
    T: Cacheable,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Arc::new(move || {
        let fut = f();
        async move { fut.await.map_err(FetchError::from_display) }.boxed()
    })
}

/// What an observer of a cache key currently sees
#[derive(Debug, Clone, PartialEq)]
pub struct CacheState<T> {
    /// Last successfully fetched value, if any
    pub data: Option<T>,
    /// True only while there is nothing to show and a fetch is pending
    pub loading: bool,
    /// Error from the most recent failed fetch, cleared by the next success
    pub error: Option<FetchError>,
    /// When `data` was obtained, in epoch milliseconds
    pub updated_at: Option<i64>,
    /// A fetch for this observer is outstanding (also during background refresh)
    pub fetching: bool,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            updated_at: None,
            fetching: false,
        }
    }
}

impl<T> CacheState<T> {
    fn cold() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn cached(data: T, timestamp: i64) -> Self {
        Self {
            data: Some(data),
            updated_at: Some(timestamp),
            ..Self::default()
        }
    }
}

/// Liveness of one observer's load sequence.
///
/// Every new session bumps the shared generation, so tokens from earlier
/// sessions of the same handle (or of a dropped handle) report dead.
#[derive(Debug, Clone)]
struct SessionToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionToken {
    fn is_live(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

/// An entry stamped in the future cannot be trusted and counts as stale
fn is_stale(age_millis: i64, ttl: Duration) -> bool {
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    age_millis < 0 || age_millis > ttl_millis
}

/// Frees an in-flight registry slot once its fetch is done or dropped
struct SlotRelease {
    inflight: Arc<InflightRegistry>,
    key: String,
    id: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.inflight.finish(&self.key, self.id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Keyed stale-while-revalidate cache over a durable string store
///
/// Cheap to clone; all clones share storage, clock and the in-flight registry.
#[derive(Clone)]
pub struct SwrCache {
    storage: Arc<dyn CacheStorage>,
    clock: Arc<dyn Clock>,
    inflight: Arc<InflightRegistry>,
    dedupe: bool,
}

impl fmt::Debug for SwrCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwrCache")
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

impl SwrCache {
    /// Creates a cache over `storage` using the system clock
    pub fn new<S: CacheStorage + 'static>(storage: Arc<S>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            inflight: Arc::new(InflightRegistry::new()),
            dedupe: true,
        }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: Arc<C>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether concurrent observers of one key share a single fetch.
    ///
    /// When disabled every observer fetches on its own and the last write to
    /// storage wins.
    pub fn dedupe_inflight(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Reads and decodes the stored entry for `key`.
    ///
    /// Unreadable, corrupt or schema-mismatched entries count as absent.
    pub fn peek<T: Cacheable>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.storage.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        match CacheEntry::<T>::decode(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "discarding unusable cache entry");
                None
            }
        }
    }

    /// Writes a whole entry. Failures are logged and otherwise ignored.
    fn persist<T: Cacheable>(&self, key: &str, entry: &CacheEntry<T>) {
        let result = entry
            .encode()
            .map_err(Into::into)
            .and_then(|text| self.storage.write(key, &text));
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist cache entry");
        }
    }

    /// Builds the fetch-and-persist future for `key`.
    ///
    /// The entry is written as soon as the fetch succeeds, independently of
    /// whether any observer is still waiting for it. A panicking fetcher
    /// resolves to a `FetchError` and releases its registry slot.
    fn fetch_future<T: Cacheable>(
        &self,
        key: &str,
        fetcher: &Fetcher<T>,
        slot: Option<u64>,
    ) -> BoxFuture<'static, Result<CacheEntry<T>, FetchError>> {
        let cache = self.clone();
        let key = key.to_string();
        let fetcher = Arc::clone(fetcher);
        let release = slot.map(|id| SlotRelease {
            inflight: Arc::clone(&self.inflight),
            key: key.clone(),
            id,
        });
        async move {
            let _release = release;
            let fetched = AssertUnwindSafe(async move { fetcher().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(key = %key, panic = %message, "fetcher panicked");
                    Err(FetchError::new(format!("fetch panicked: {}", message)))
                });
            let outcome = fetched.map(|data| {
                let entry = CacheEntry::new(data, cache.now_millis());
                cache.persist(&key, &entry);
                entry
            });
            if let Err(e) = &outcome {
                warn!(key = %key, error = %e, "fetch failed");
            }
            outcome
        }
        .boxed()
    }

    /// Starts (or joins) a fetch for `key` and drives it to completion on a
    /// background task.
    fn start_fetch<T: Cacheable>(
        &self,
        key: &str,
        fetcher: &Fetcher<T>,
    ) -> SharedFetch<CacheEntry<T>> {
        if !self.dedupe {
            let fetch = self.fetch_future(key, fetcher, None).shared();
            tokio::spawn(fetch.clone());
            return fetch;
        }

        let joined = self
            .inflight
            .join_or_start(key, |id| self.fetch_future(key, fetcher, Some(id)));
        if joined.started {
            tokio::spawn(joined.fetch.clone());
        } else {
            debug!(key, "joining in-flight fetch");
        }
        joined.fetch
    }

    /// Begins observing `key`.
    ///
    /// The returned handle's state is populated synchronously from storage. A
    /// fetch is started in the background when the entry is missing, unusable,
    /// or older than `ttl`. Must be called from within a tokio runtime.
    pub fn watch<T, F, Fut, E>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        fetch: F,
    ) -> CacheHandle<T>
    where
        T: Cacheable,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.watch_with(key, ttl, fetcher(fetch))
    }

    /// Like [`SwrCache::watch`] with an already boxed fetcher
    pub fn watch_with<T: Cacheable>(
        &self,
        key: impl Into<String>,
        ttl: Duration,
        fetcher: Fetcher<T>,
    ) -> CacheHandle<T> {
        let (state_tx, state_rx) = watch::channel(CacheState::default());
        let generation = Arc::new(AtomicU64::new(0));
        let mut handle = CacheHandle {
            cache: self.clone(),
            key: key.into(),
            ttl,
            fetcher,
            state_tx: Arc::new(state_tx),
            state_rx,
            token: SessionToken {
                generation: 0,
                current: generation,
            },
        };
        handle.load();
        handle
    }
}

/// One observer's view of a cache key
///
/// Dropping the handle ends the session: a fetch still running will finish and
/// persist, but it no longer updates this handle's state.
pub struct CacheHandle<T: Cacheable> {
    cache: SwrCache,
    key: String,
    ttl: Duration,
    fetcher: Fetcher<T>,
    state_tx: Arc<watch::Sender<CacheState<T>>>,
    state_rx: watch::Receiver<CacheState<T>>,
    token: SessionToken,
}

impl<T: Cacheable> fmt::Debug for CacheHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("generation", &self.token.generation)
            .finish_non_exhaustive()
    }
}

impl<T: Cacheable> CacheHandle<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot of the current state
    pub fn state(&self) -> CacheState<T> {
        self.state_rx.borrow().clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.state_rx.borrow().fetching
    }

    /// Waits for the next state change and returns the new state
    pub async fn changed(&mut self) -> CacheState<T> {
        // The sender lives as long as this handle, so this only waits
        let _ = self.state_rx.changed().await;
        self.state_rx.borrow_and_update().clone()
    }

    /// Waits until no fetch is outstanding for this handle
    pub async fn settled(&mut self) -> CacheState<T> {
        let settled = self
            .state_rx
            .wait_for(|state| !state.fetching)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Re-runs the access decision for the current key and TTL.
    ///
    /// Adopts a newer stored entry (e.g. written by another observer) and
    /// fetches when the entry is stale or missing. Does nothing while a fetch
    /// for this handle is outstanding.
    pub fn revalidate(&mut self) {
        if self.is_fetching() {
            return;
        }

        let now = self.cache.now_millis();
        match self.cache.peek::<T>(&self.key) {
            Some(entry) => {
                let age = entry.age_millis(now);
                let stale = is_stale(age, self.ttl);
                let CacheEntry { data, timestamp, .. } = entry;
                self.state_tx.send_if_modified(|state| {
                    if state.updated_at.is_some_and(|seen| seen >= timestamp) {
                        return false;
                    }
                    state.data = Some(data);
                    state.updated_at = Some(timestamp);
                    state.loading = false;
                    state.error = None;
                    true
                });
                if stale {
                    info!(
                        key = %self.key,
                        age_ms = age,
                        ttl_ms = ttl_millis(self.ttl),
                        "stale cache, refetching"
                    );
                    self.spawn_fetch();
                }
            }
            None => {
                debug!(key = %self.key, "no cache on revalidate, fetching");
                self.state_tx.send_modify(|state| {
                    if state.data.is_none() {
                        state.loading = true;
                        state.error = None;
                    }
                });
                self.spawn_fetch();
            }
        }
    }

    /// Fetches regardless of the entry's age, keeping the current value on
    /// display meanwhile. Does nothing while a fetch is outstanding.
    pub fn force_refresh(&mut self) {
        if self.is_fetching() {
            return;
        }
        info!(key = %self.key, "forced refresh");
        self.spawn_fetch();
    }

    /// Points the handle at a new key and/or TTL.
    ///
    /// The load sequence only re-runs when the key or TTL actually changed;
    /// the fetcher is replaced either way. Returns whether a reload happened.
    pub fn reconfigure<F, Fut, E>(
        &mut self,
        key: impl Into<String>,
        ttl: Duration,
        fetch: F,
    ) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.reconfigure_with(key, ttl, fetcher(fetch))
    }

    /// Like [`CacheHandle::reconfigure`] with an already boxed fetcher
    pub fn reconfigure_with(
        &mut self,
        key: impl Into<String>,
        ttl: Duration,
        fetcher: Fetcher<T>,
    ) -> bool {
        let key = key.into();
        self.fetcher = fetcher;
        if key == self.key && ttl == self.ttl {
            return false;
        }

        debug!(from = %self.key, to = %key, "reconfiguring cache handle");
        self.key = key;
        self.ttl = ttl;
        self.begin_session();
        self.load();
        true
    }

    /// Invalidates the current session token and issues a new one
    fn begin_session(&mut self) {
        let generation = self.token.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.token = SessionToken {
            generation,
            current: Arc::clone(&self.token.current),
        };
    }

    /// Initial load for the current key: show what storage has, fetch if needed
    fn load(&mut self) {
        let now = self.cache.now_millis();
        match self.cache.peek::<T>(&self.key) {
            Some(entry) => {
                let age = entry.age_millis(now);
                let stale = is_stale(age, self.ttl);
                self.state_tx
                    .send_replace(CacheState::cached(entry.data, entry.timestamp));
                if stale {
                    info!(
                        key = %self.key,
                        age_ms = age,
                        ttl_ms = ttl_millis(self.ttl),
                        "stale cache, refetching"
                    );
                    self.spawn_fetch();
                } else {
                    debug!(key = %self.key, age_ms = age, "using fresh cache");
                }
            }
            None => {
                info!(key = %self.key, "no cache, fetching");
                self.state_tx.send_replace(CacheState::cold());
                self.spawn_fetch();
            }
        }
    }

    fn spawn_fetch(&mut self) {
        self.state_tx.send_modify(|state| state.fetching = true);

        let fetch = self.cache.start_fetch(&self.key, &self.fetcher);
        let token = self.token.clone();
        let state_tx = Arc::clone(&self.state_tx);
        let key = self.key.clone();

        tokio::spawn(async move {
            let outcome = fetch.await;
            // The liveness check runs under the channel's write lock, so a
            // concurrent reconfigure either sees this update or replaces it.
            let committed = state_tx.send_if_modified(move |state| {
                if !token.is_live() {
                    return false;
                }
                state.fetching = false;
                state.loading = false;
                match outcome {
                    Ok(entry) => {
                        state.data = Some(entry.data);
                        state.updated_at = Some(entry.timestamp);
                        state.error = None;
                    }
                    Err(e) => state.error = Some(e),
                }
                true
            });
            if !committed {
                debug!(key = %key, "observer gone, fetch result not applied");
            }
        });
    }
}

impl<T: Cacheable> Drop for CacheHandle<T> {
    fn drop(&mut self) {
        self.token.current.fetch_add(1, Ordering::AcqRel);
    }
}
