//! Registry of fetches currently running, keyed by cache key
//!
//! Lets concurrent observers of one key await a single shared fetch instead of
//! issuing duplicate requests.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::error::FetchError;

/// A fetch that any number of observers can await
pub type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, FetchError>>>;

struct Slot {
    id: u64,
    fetch: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct InflightRegistry {
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
}

/// Result of asking the registry for a fetch
pub struct Joined<V> {
    pub fetch: SharedFetch<V>,
    /// Slot id, used to clear the slot once the fetch finishes
    pub id: u64,
    /// Whether this caller created the fetch (and must drive it)
    pub started: bool,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the fetch running for `key`, or registers the one built by `start`.
    ///
    /// A running fetch registered under a different value type is not joined;
    /// the caller's fetch replaces it in the registry.
    pub fn join_or_start<V, S>(&self, key: &str, start: S) -> Joined<V>
    where
        V: Clone + Send + Sync + 'static,
        S: FnOnce(u64) -> BoxFuture<'static, Result<V, FetchError>>,
    {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(slot) = slots.get(key) {
            if let Some(fetch) = slot.fetch.downcast_ref::<SharedFetch<V>>() {
                return Joined {
                    fetch: fetch.clone(),
                    id: slot.id,
                    started: false,
                };
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fetch = start(id).shared();
        let replaced = slots.insert(
            key.to_string(),
            Slot {
                id,
                fetch: Box::new(fetch.clone()),
            },
        );
        // A replaced fetch may release its slot on drop, which takes the lock
        drop(slots);
        drop(replaced);
        Joined {
            fetch,
            id,
            started: true,
        }
    }

    /// Removes the slot for `key` if it still belongs to fetch `id`
    pub fn finish(&self, key: &str, id: u64) {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        let removed = if slots.get(key).is_some_and(|slot| slot.id == id) {
            slots.remove(key)
        } else {
            None
        };
        drop(slots);
        drop(removed);
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_second_caller_joins_running_fetch() {
        let registry = InflightRegistry::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let make = |starts: Arc<AtomicUsize>| {
            move |_id: u64| {
                starts.fetch_add(1, Ordering::SeqCst);
                async { Ok::<i64, FetchError>(7) }.boxed()
            }
        };

        let first = registry.join_or_start::<i64, _>("x", make(starts.clone()));
        let second = registry.join_or_start::<i64, _>("x", make(starts.clone()));

        assert!(first.started);
        assert!(!second.started);
        assert_eq!(first.id, second.id);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(first.fetch.await, Ok(7));
        assert_eq!(second.fetch.await, Ok(7));
    }

    #[tokio::test]
    async fn test_finish_clears_only_matching_slot() {
        let registry = InflightRegistry::new();
        let joined =
            registry.join_or_start::<i64, _>("x", |_| async { Ok::<i64, FetchError>(1) }.boxed());
        assert!(registry.is_running("x"));

        registry.finish("x", joined.id + 1);
        assert!(registry.is_running("x"));

        registry.finish("x", joined.id);
        assert!(!registry.is_running("x"));
    }

    #[tokio::test]
    async fn test_different_value_type_is_not_joined() {
        let registry = InflightRegistry::new();
        let a = registry.join_or_start::<i64, _>("x", |_| {
            async { Ok::<i64, FetchError>(1) }.boxed()
        });
        let b = registry.join_or_start::<String, _>("x", |_| {
            async { Ok::<String, FetchError>("one".to_string()) }.boxed()
        });
        assert!(a.started);
        assert!(b.started);
        assert_ne!(a.id, b.id);
    }

    struct FinishOnDrop {
        registry: Arc<InflightRegistry>,
        id: u64,
    }

    impl Drop for FinishOnDrop {
        fn drop(&mut self) {
            self.registry.finish("x", self.id);
        }
    }

    #[tokio::test]
    async fn test_replacing_abandoned_fetch_releases_lock_first() {
        let registry = Arc::new(InflightRegistry::new());

        let owner = registry.clone();
        let abandoned = registry.join_or_start::<i64, _>("x", move |id| {
            let guard = FinishOnDrop { registry: owner, id };
            async move {
                let _guard = guard;
                futures::future::pending::<()>().await;
                Ok::<i64, FetchError>(1)
            }
            .boxed()
        });
        let abandoned_id = abandoned.id;
        // The registry now holds the only reference to the pending fetch
        drop(abandoned);

        let replacement = registry.join_or_start::<String, _>("x", |_| {
            async { Ok::<String, FetchError>("two".to_string()) }.boxed()
        });
        assert_ne!(replacement.id, abandoned_id);
        assert!(registry.is_running("x"));
    }
}
