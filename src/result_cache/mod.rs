//! ResultCache - Verification Result Cache
//!
//! ## Responsibilities
//!
//! - Store the last boolean health result per device-channel key
//! - TTL by result polarity, escalated for chronically failing cameras
//! - Consecutive-failure counters on a coarser property+camera key, so
//!   they survive cache-key churn from inventory reload
//! - Throttled time-based pruning, independent of cycle boundaries
//!
//! Expiry is checked at lookup time against entry age; nothing expires
//! actively. Clock-sensitive operations take an explicit `now` in their
//! `*_at` variants for deterministic tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// ResultCache configuration
#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    /// TTL for a positive (online) result
    pub ttl_online: Duration,
    /// TTL for a negative (offline) result
    pub ttl_offline: Duration,
    /// Consecutive-failure count above which the negative TTL doubles,
    /// trading freshness for reduced load against dead cameras
    pub escalation_threshold: u32,
    /// Prune entries older than this, regardless of polarity
    pub prune_max_age: Duration,
    /// Minimum interval between prune sweeps
    pub prune_min_interval: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        let ttl_online = Duration::from_secs(30);
        Self {
            ttl_online,
            ttl_offline: Duration::from_secs(120),
            escalation_threshold: 3,
            prune_max_age: ttl_online * 2,
            prune_min_interval: Duration::from_secs(300),
        }
    }
}

/// Cached verification result
struct CacheEntry {
    result: bool,
    stored_at: Instant,
}

/// Cache key: stable camera identity within a property
pub fn cache_key(property: &str, camera: &str, ip: &str, channel: &str, protocol: &str) -> String {
    format!("{}_{}_{}_{}_{}", property, camera, ip, channel, protocol)
}

/// Failure-counter key: deliberately coarser than the cache key
pub fn failure_key(property: &str, camera: &str) -> String {
    format!("{}_{}", property, camera)
}

/// ResultCache instance
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    failures: RwLock<HashMap<String, u32>>,
    last_prune: RwLock<Instant>,
    config: ResultCacheConfig,
}

impl ResultCache {
    pub fn new(config: ResultCacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            last_prune: RwLock::new(Instant::now()),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ResultCacheConfig::default())
    }

    /// Get a still-valid cached result, or None on miss/expiry
    pub async fn lookup(&self, key: &str, failure_key: &str) -> Option<bool> {
        self.lookup_at(key, failure_key, Instant::now()).await
    }

    pub async fn lookup_at(&self, key: &str, failure_key: &str, now: Instant) -> Option<bool> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        let ttl = if entry.result {
            self.config.ttl_online
        } else if self.failure_count(failure_key).await > self.config.escalation_threshold {
            self.config.ttl_offline * 2
        } else {
            self.config.ttl_offline
        };

        if now.duration_since(entry.stored_at) < ttl {
            Some(entry.result)
        } else {
            None
        }
    }

    /// Store a fresh probe result
    pub async fn store(&self, key: &str, result: bool) {
        self.store_at(key, result, Instant::now()).await;
    }

    pub async fn store_at(&self, key: &str, result: bool, now: Instant) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                result,
                stored_at: now,
            },
        );
    }

    /// Update the consecutive-failure counter for a camera: increments
    /// on a negative outcome, resets on any positive one
    pub async fn record_outcome(&self, failure_key: &str, online: bool) {
        let mut failures = self.failures.write().await;
        if online {
            failures.insert(failure_key.to_string(), 0);
        } else {
            *failures.entry(failure_key.to_string()).or_insert(0) += 1;
        }
    }

    pub async fn failure_count(&self, failure_key: &str) -> u32 {
        self.failures
            .read()
            .await
            .get(failure_key)
            .copied()
            .unwrap_or(0)
    }

    /// Sweep entries older than `prune_max_age`, at most once per
    /// `prune_min_interval`. Returns the number of entries removed.
    pub async fn prune(&self) -> usize {
        self.prune_at(Instant::now()).await
    }

    pub async fn prune_at(&self, now: Instant) -> usize {
        {
            let last = self.last_prune.read().await;
            if now.duration_since(*last) < self.config.prune_min_interval {
                return 0;
            }
        }

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.stored_at) <= self.config.prune_max_age);
        let removed = before - entries.len();

        *self.last_prune.write().await = now;

        if removed > 0 {
            tracing::info!(removed = removed, remaining = entries.len(), "Cache prune");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}
