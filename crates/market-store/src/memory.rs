//! In-process TTL cache for global signals and adaptive weights.
//!
//! One instance is held by the scheduler and shared across per-symbol
//! workers: repeated scans and multiple symbols reuse a single fetch.
//! Readers are lock-free via the concurrent map; refreshes go through a
//! per-key writer guard with a double-check so concurrent misses do the
//! work once.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fusion_core::SignalError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

struct CacheEntry {
    data: serde_json::Value,
    cached_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<(String, String), CacheEntry>,
    writers: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(class: &str, key: &str) -> (String, String) {
        (class.to_string(), key.to_string())
    }

    /// Fresh value for (class, key), or None when absent/expired.
    pub fn get<T: DeserializeOwned>(&self, class: &str, key: &str, ttl_minutes: i64) -> Option<T> {
        let entry = self.entries.get(&Self::cache_key(class, key))?;
        if Utc::now() - entry.cached_at > Duration::minutes(ttl_minutes) {
            return None;
        }
        serde_json::from_value(entry.data.clone()).ok()
    }

    pub fn put<T: Serialize>(&self, class: &str, key: &str, value: &T) {
        if let Ok(data) = serde_json::to_value(value) {
            self.entries.insert(
                Self::cache_key(class, key),
                CacheEntry {
                    data,
                    cached_at: Utc::now(),
                },
            );
        }
    }

    /// Return the cached value or compute and store a fresh one. The
    /// per-key writer lock serialises concurrent refreshes; the state is
    /// re-checked after acquiring it so only the first waiter computes.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        class: &str,
        key: &str,
        ttl_minutes: i64,
        compute: F,
    ) -> Result<T, SignalError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SignalError>>,
    {
        if let Some(value) = self.get::<T>(class, key, ttl_minutes) {
            return Ok(value);
        }

        let guard = self
            .writers
            .entry(Self::cache_key(class, key))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _lock = guard.lock().await;

        if let Some(value) = self.get::<T>(class, key, ttl_minutes) {
            return Ok(value);
        }

        let value = compute().await?;
        self.put(class, key, &value);
        Ok(value)
    }

    /// Drop every entry of one class (e.g. after a settings change)
    pub fn invalidate_class(&self, class: &str) {
        self.entries.retain(|(c, _), _| c != class);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
