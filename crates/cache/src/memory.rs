use crate::events::{CacheEvent, EVENT_CHANNEL_CAPACITY};
use crate::CacheStats;
use fetchkit_core::DEFAULT_CACHE_CAPACITY;
use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Stored response with the instant it was fetched.
///
/// Entries are replaced wholesale on every write and never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: Instant,
}

impl CacheEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    /// Time since the entry was written
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Fresh while strictly younger than `ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Statistics for tracking store usage
#[derive(Debug, Clone, Default)]
struct CacheStatistics {
    hits: u64,
    misses: u64,
    expired: u64,
    writes: u64,
    evictions: u64,
    invalidations: u64,
}

/// Keyed response store with TTL-aware reads.
///
/// The store is an explicitly constructed value meant to be shared behind an
/// `Arc`; every holder sees the same entries. Reads never purge: an expired
/// entry is reported as absent but stays in place (and stays visible through
/// [`peek`](Self::peek) and [`snapshot`](Self::snapshot)) until it is
/// overwritten, invalidated, purged or evicted.
pub struct CacheStore {
    entries: RwLock<LruCache<String, CacheEntry>>,
    capacity: usize,
    stats: RwLock<CacheStatistics>,
    events: broadcast::Sender<CacheEvent>,
    disposed: AtomicBool,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl CacheStore {
    /// Create a store holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        debug!(capacity = capacity.get(), "Creating response cache store");

        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            stats: RwLock::new(CacheStatistics::default()),
            events,
            disposed: AtomicBool::new(false),
        }
    }

    /// Return the entry for `key` if it is younger than `ttl`
    pub async fn read(&self, key: &str, ttl: Duration) -> Option<CacheEntry> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        match entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => {
                trace!(key = %key, "Cache hit");
                stats.hits += 1;
                Some(entry.clone())
            }
            Some(_) => {
                trace!(key = %key, "Cache entry expired");
                stats.expired += 1;
                stats.misses += 1;
                None
            }
            None => {
                trace!(key = %key, "Cache miss");
                stats.misses += 1;
                None
            }
        }
    }

    /// Typed [`read`](Self::read); a value that does not deserialize as `T` is a miss
    pub async fn read_as<T>(&self, key: &str, ttl: Duration) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let entry = self.read(key, ttl).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has an unexpected shape, ignoring it");
                None
            }
        }
    }

    /// Insert or replace the entry for `key`, stamped with the current instant
    pub async fn write(&self, key: impl Into<String>, value: Value) {
        let key = key.into();

        let evicted = {
            let mut entries = self.entries.write().await;
            // Checked under the lock so a concurrent dispose cannot be outrun
            if self.is_disposed() {
                warn!(key = %key, "Ignoring write to a disposed cache store");
                return;
            }
            entries
                .push(key.clone(), CacheEntry::new(value))
                .map(|(old_key, _)| old_key)
                .filter(|old_key| *old_key != key)
        };

        {
            let mut stats = self.stats.write().await;
            stats.writes += 1;
            if evicted.is_some() {
                stats.evictions += 1;
            }
        }

        debug!(key = %key, "Cache entry written");
        self.publish(CacheEvent::Written { key });

        if let Some(evicted) = evicted {
            trace!(key = %evicted, "Cache eviction occurred due to capacity limit");
            self.publish(CacheEvent::Evicted { key: evicted });
        }
    }

    /// Serialize `value` and [`write`](Self::write) it
    pub async fn write_as<T>(&self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(value)?;
        self.write(key, value).await;
        Ok(())
    }

    /// Remove the entry for `key`; returns whether one was present
    pub async fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().await.pop(key).is_some();

        if removed {
            self.stats.write().await.invalidations += 1;
            debug!(key = %key, "Cache entry invalidated");
            self.publish(CacheEvent::Invalidated {
                key: key.to_string(),
            });
        } else {
            trace!(key = %key, "Invalidation of absent key ignored");
        }

        removed
    }

    /// Remove all entries; returns how many were removed
    pub async fn clear(&self) -> usize {
        let count = {
            let mut entries = self.entries.write().await;
            let count = entries.len();
            entries.clear();
            count
        };

        debug!("Cleared {} entries from cache store", count);
        self.publish(CacheEvent::Cleared { count });
        count
    }

    /// Clear the store and refuse further writes
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.entries.write().await.clear();
        debug!("Cache store disposed");
        self.publish(CacheEvent::Disposed);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Entry for `key` regardless of age, without touching recency or stats
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.peek(key).cloned()
    }

    /// Typed [`peek`](Self::peek)
    pub async fn peek_as<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let entry = self.peek(key).await?;
        serde_json::from_value(entry.value).ok()
    }

    /// Read-only copy of every entry, fresh or not
    pub async fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Check for a fresh entry without counting a hit or miss
    pub async fn contains(&self, key: &str, ttl: Duration) -> bool {
        self.entries
            .read()
            .await
            .peek(key)
            .is_some_and(|entry| entry.is_fresh(ttl))
    }

    /// Remove entries that are not fresh under `ttl`
    pub async fn purge_expired(&self, ttl: Duration) -> usize {
        let count = {
            let mut entries = self.entries.write().await;
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| !entry.is_fresh(ttl))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                entries.pop(key);
            }
            expired.len()
        };

        if count > 0 {
            debug!("Purged {} expired entries from cache store", count);
            self.publish(CacheEvent::Purged { count });
        }
        count
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let stats = self.stats.read().await;

        CacheStats {
            hits: stats.hits,
            misses: stats.misses,
            expired: stats.expired,
            writes: stats.writes,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            size: entries.len(),
            capacity: self.capacity,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn publish(&self, event: CacheEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}
