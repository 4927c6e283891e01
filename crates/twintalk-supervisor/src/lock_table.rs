//! Per-twin serialization primitive (§5): a sharded lock table with lazy
//! creation and idle eviction, generalizing the core's own
//! `DashMap<TwinId, Arc<ActiveTwin>>` + `last_accessed` shape from "evict
//! idle twin instances" to "evict idle twin locks".
//!
//! Holding a twin's lock for the duration of both ingestion evaluation and
//! a façade `UpdateTwin` call is what makes the *current definition* either
//! wholly pre- or wholly post-update to a racing evaluator.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use twintalk_core::TwinId;

struct TwinLock {
    mutex: Arc<Mutex<()>>,
    last_accessed_millis: AtomicU64,
}

impl TwinLock {
    fn new(epoch: Instant) -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            last_accessed_millis: AtomicU64::new(epoch.elapsed().as_millis() as u64),
        }
    }

    fn touch(&self, epoch: Instant) {
        self.last_accessed_millis
            .store(epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    fn idle_for(&self, epoch: Instant) -> Duration {
        let last = self.last_accessed_millis.load(Ordering::Relaxed);
        epoch.elapsed().saturating_sub(Duration::from_millis(last))
    }

    /// A second live reference to `mutex` (held inside an outstanding
    /// `OwnedMutexGuard`) pushes this above 1 — the signal `evict_idle` uses
    /// to leave a currently-held lock alone.
    fn is_held(&self) -> bool {
        Arc::strong_count(&self.mutex) > 1
    }
}

pub struct TwinLockTable {
    locks: DashMap<TwinId, Arc<TwinLock>>,
    idle_timeout: Duration,
    epoch: Instant,
}

impl TwinLockTable {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            idle_timeout,
            epoch: Instant::now(),
        }
    }

    /// Acquire the lock for `twin_id`, creating its entry on first use.
    /// Hold the returned guard for the whole critical section (ingestion
    /// evaluation, or a façade update) before dropping it.
    pub async fn acquire(&self, twin_id: &TwinId) -> OwnedMutexGuard<()> {
        let handle = self
            .locks
            .entry(twin_id.clone())
            .or_insert_with(|| Arc::new(TwinLock::new(self.epoch)))
            .clone();
        handle.touch(self.epoch);
        handle.mutex.clone().lock_owned().await
    }

    /// Drop entries idle longer than `idle_timeout` and not currently held.
    pub fn evict_idle(&self) -> usize {
        let mut to_evict = Vec::new();
        for entry in self.locks.iter() {
            let handle = entry.value();
            if handle.idle_for(self.epoch) > self.idle_timeout && !handle.is_held() {
                to_evict.push(entry.key().clone());
            }
        }
        let count = to_evict.len();
        for twin_id in to_evict {
            self.locks.remove(&twin_id);
        }
        count
    }

    /// Spawn the background sweep. Stops when `shutdown` is cancelled.
    pub fn spawn_eviction_task(
        self: Arc<Self>,
        sweep_interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle();
                        if evicted > 0 {
                            tracing::debug!(evicted, "evicted idle twin locks");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!("twin lock eviction task shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
