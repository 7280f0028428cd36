// Rendered-feed cache keyed by slug, with a single global TTL

use crate::clock::Clock;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

// Live counters, updated without taking the map locks
#[derive(Debug, Default)]
pub struct CacheStats {
    pub size_bytes: AtomicUsize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub eviction_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub rejected_count: AtomicUsize,
}

// Point-in-time copy of the counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub size_bytes: usize,
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub eviction_count: usize,
    pub expired_count: usize,
    pub rejected_count: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Upper bound on stored bytes; 0 disables the bound.
    pub max_size_mb: usize,
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size_mb: 0,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

pub trait FeedCache: Send + Sync + 'static {
    fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self
    where
        Self: Sized;

    // Returns the stored document unless it is absent or its TTL has elapsed
    fn get(&self, key: &str) -> Option<Bytes>;

    // Overwrites any existing value and restarts its TTL.
    // Returns false if the value alone exceeds the size bound.
    fn set(&self, key: &str, value: Bytes) -> bool;

    // Drops every entry whose TTL has elapsed, returning how many went
    fn purge_expired(&self) -> usize;

    fn stats(&self) -> CacheStatsReport;
}

pub fn calculate_item_size(key: &str, data: &[u8]) -> usize {
    key.len() + data.len() + 2 * std::mem::size_of::<DateTime<Utc>>()
}

struct CacheEntry {
    data: Bytes,
    inserted_at: DateTime<Utc>,
    // None when the TTL does not fit in a timestamp
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

pub struct ExpiringFeedCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl ExpiringFeedCache {
    fn max_size_bytes(&self) -> Option<usize> {
        (self.config.max_size_mb > 0).then(|| self.config.max_size_mb * 1024 * 1024)
    }

    fn expiry_for(&self, inserted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.config.ttl)
            .ok()
            .and_then(|ttl| inserted_at.checked_add_signed(ttl))
    }

    fn evict_oldest_entry(&self) -> bool {
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        match oldest_key {
            Some(key) => {
                if let Some((key, removed)) = self.entries.remove(&key) {
                    self.stats
                        .size_bytes
                        .fetch_sub(calculate_item_size(&key, &removed.data), Ordering::SeqCst);
                    self.stats.eviction_count.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(slug = %key, "evicted oldest cache entry");
                }
                true
            }
            None => false,
        }
    }
}

impl FeedCache for ExpiringFeedCache {
    fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock,
            stats: CacheStats::default(),
        }
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // A concurrent set may already have replaced the stale entry
            if let Some((key, removed)) = self.entries.remove_if(key, |_, e| e.is_expired(now)) {
                self.stats
                    .size_bytes
                    .fetch_sub(calculate_item_size(&key, &removed.data), Ordering::SeqCst);
                self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        None
    }

    fn set(&self, key: &str, value: Bytes) -> bool {
        let item_size = calculate_item_size(key, &value);

        if let Some(max_size_bytes) = self.max_size_bytes() {
            if item_size > max_size_bytes {
                tracing::warn!(
                    slug = key,
                    item_size,
                    max_size_bytes,
                    "feed document larger than the whole cache, not storing"
                );
                self.stats.rejected_count.fetch_add(1, Ordering::SeqCst);
                return false;
            }

            while self.stats.size_bytes.load(Ordering::SeqCst) + item_size > max_size_bytes {
                if !self.evict_oldest_entry() {
                    break;
                }
            }
        }

        let now = self.clock.now();
        let entry = CacheEntry {
            data: value,
            inserted_at: now,
            expires_at: self.expiry_for(now),
        };

        // Count the bytes before the entry becomes visible so a racing
        // removal never subtracts more than was added.
        self.stats.size_bytes.fetch_add(item_size, Ordering::SeqCst);
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            self.stats
                .size_bytes
                .fetch_sub(calculate_item_size(key, &previous.data), Ordering::SeqCst);
        }

        true
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;

        self.entries.retain(|key, entry| {
            if entry.is_expired(now) {
                self.stats
                    .size_bytes
                    .fetch_sub(calculate_item_size(key, &entry.data), Ordering::SeqCst);
                purged += 1;
                false
            } else {
                true
            }
        });

        self.stats.expired_count.fetch_add(purged, Ordering::SeqCst);
        purged
    }

    fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            size_bytes: self.stats.size_bytes.load(Ordering::SeqCst),
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            eviction_count: self.stats.eviction_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            rejected_count: self.stats.rejected_count.load(Ordering::SeqCst),
        }
    }
}

/// Periodically drops expired entries so that documents for slugs nobody
/// asks for again do not linger until the next lookup.
pub fn spawn_janitor<C>(cache: Arc<C>, every: Duration) -> JoinHandle<()>
where
    C: FeedCache + ?Sized,
{
    let every = every.max(MIN_CLEANUP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "purged expired feed documents");
            }
        }
    })
}
