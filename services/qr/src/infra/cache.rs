use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::domain::repository::QrCachePort;
use crate::domain::types::{CacheEntry, CacheStats, QrFormat, QrVariant};

pub fn cache_key(student_id: Uuid, variant: QrVariant, format: QrFormat) -> String {
    format!(
        "student:{student_id}:{}:{}",
        variant.as_str(),
        format.as_str()
    )
}

fn student_prefix(student_id: Uuid) -> String {
    format!("student:{student_id}:")
}

struct Slot {
    entry: CacheEntry,
    deadline: Instant,
}

struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// TTL cache of rendered QR images.
///
/// An entry is served only while `now < deadline`; `get` drops expired entries
/// itself, so the background sweeper only reclaims memory.
#[derive(Clone)]
pub struct QrCache {
    inner: Arc<Inner>,
}

impl QrCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                ttl,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut slots = self.slots();
        match slots.get_mut(key) {
            Some(slot) if now < slot.deadline => {
                slot.entry.access_count += 1;
                slot.entry.last_accessed = Some(Utc::now());
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(slot.entry.clone())
            }
            Some(_) => {
                slots.remove(key);
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace. `expires_at` is overwritten from the cache TTL.
    pub fn set(&self, key: &str, mut entry: CacheEntry) {
        let ttl = self.inner.ttl;
        entry.expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let slot = Slot {
            entry,
            deadline: Instant::now() + ttl,
        };
        self.slots().insert(key.to_owned(), slot);
    }

    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(prefix));
        before - slots.len()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut slots = self.slots();
            let n = slots.len();
            slots.clear();
            n
        };
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        removed
    }

    /// `entries` counts stored slots, including expired ones not yet swept.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.slots().len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| now < slot.deadline);
        before - slots.len()
    }

    /// Purge expired entries every `interval` until the handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "purged expired QR cache entries");
                }
            }
        })
    }
}

impl QrCachePort for QrCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        QrCache::get(self, key)
    }

    async fn set(&self, key: &str, entry: CacheEntry) {
        QrCache::set(self, key, entry);
    }

    async fn invalidate_student(&self, student_id: Uuid) {
        let removed = self.remove_prefix(&student_prefix(student_id));
        debug!(%student_id, removed, "invalidated cached QR renderings");
    }
}
