use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::observability::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

struct Stamped<T> {
    value: Arc<T>,
    stored_at: Instant,
    invalidated: bool,
}

struct Slot<T> {
    entry: Option<Stamped<T>>,
    // Bumped by `set` and `invalidate`; `fill` only stores when it is
    // unchanged since the miss that triggered the build.
    generation: u64,
}

/// Result of a cache read. `value` may be present on a miss when the
/// entry exists but has aged past the window or was invalidated.
pub struct CacheRead<T> {
    pub value: Option<Arc<T>>,
    pub hit: bool,
    pub generation: u64,
}

/// A single value with a freshness window. The whole value is replaced on
/// every refresh; there is no per-key invalidation.
pub struct TtlCache<T> {
    name: &'static str,
    window: Duration,
    slot: RwLock<Slot<T>>,
}

impl<T> TtlCache<T> {
    pub fn new(name: &'static str, window: Duration) -> Self {
        Self {
            name,
            window,
            slot: RwLock::new(Slot {
                entry: None,
                generation: 0,
            }),
        }
    }

    fn is_fresh(&self, stamped: &Stamped<T>) -> bool {
        !stamped.invalidated && stamped.stored_at.elapsed() < self.window
    }

    pub async fn get(&self) -> CacheRead<T> {
        let slot = self.slot.read().await;
        let read = CacheRead {
            value: slot.entry.as_ref().map(|stamped| stamped.value.clone()),
            hit: slot.entry.as_ref().is_some_and(|stamped| self.is_fresh(stamped)),
            generation: slot.generation,
        };
        drop(slot);

        if read.hit {
            metrics::counter!(CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
        } else {
            metrics::counter!(CACHE_MISSES_TOTAL, "cache" => self.name).increment(1);
        }
        read
    }

    pub async fn set(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        slot.entry = Some(Stamped {
            value: value.clone(),
            stored_at: Instant::now(),
            invalidated: false,
        });
        value
    }

    /// Store a value built after a miss seen at `generation`.
    ///
    /// If another task refreshed the entry meanwhile, the existing fresh
    /// value wins and `value` is dropped. If the cache was invalidated or
    /// overwritten since the miss, `value` is handed back uncached.
    pub async fn fill(&self, generation: u64, value: T) -> Arc<T> {
        let mut slot = self.slot.write().await;
        if slot.generation != generation {
            tracing::debug!(cache = self.name, "cache changed during build, result not stored");
            return Arc::new(value);
        }
        if let Some(stamped) = slot.entry.as_ref()
            && self.is_fresh(stamped)
        {
            tracing::debug!(cache = self.name, "refresh race lost, keeping existing value");
            return stamped.value.clone();
        }
        let value = Arc::new(value);
        slot.entry = Some(Stamped {
            value: value.clone(),
            stored_at: Instant::now(),
            invalidated: false,
        });
        value
    }

    /// Mark the stored value stale. It stays readable for degraded reads,
    /// and builds started before this call will not be stored.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        if let Some(stamped) = slot.entry.as_mut() {
            stamped.invalidated = true;
        }
    }
}
