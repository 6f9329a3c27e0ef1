//! Read-through cache of rendered JSON views.
//!
//! Entries are dropped when a store mutation reports their [`ViewKey`] and
//! expire after a fixed TTL otherwise, which bounds how long time-dependent
//! views (upcoming vs. history) can lag behind the clock.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use courtside_models::{Result, UserId, ViewInvalidator, ViewKey};
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

/// A view plus the user it was rendered for, when it differs per viewer.
type CacheKey = (ViewKey, Option<UserId>);

struct Entry {
    stored: Instant,
    value: Value,
}

pub struct ViewCache {
    entries: DashMap<CacheKey, Entry>,
    ttl: Duration,
    /// Bumped by every invalidation. A load that straddles one is not stored.
    generation: AtomicU64,
    created: Instant,
    /// Milliseconds after `created` of the last sweep for expired entries.
    swept_at: AtomicU64,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
            created: Instant::now(),
            swept_at: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: ViewKey, viewer: Option<UserId>) -> Option<Value> {
        let entry = self.entries.get(&(key, viewer))?;
        if entry.stored.elapsed() < self.ttl {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries
            .remove_if(&(key, viewer), |_, e| e.stored.elapsed() >= self.ttl);
        None
    }

    /// Return the cached view, or render it with `load` and keep the result.
    pub async fn read_through<F, Fut>(&self, key: ViewKey, viewer: Option<UserId>, load: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(hit) = self.get(key, viewer) {
            debug!(?key, ?viewer, "View cache hit");
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = load().await?;
        if self.generation.load(Ordering::Acquire) == generation {
            let entry = Entry { stored: Instant::now(), value: value.clone() };
            self.entries.insert((key, viewer), entry);
        }
        self.sweep_expired();
        Ok(value)
    }

    /// Drop every expired entry, at most once per TTL. Keys nobody reads
    /// again would otherwise stay in the map.
    fn sweep_expired(&self) {
        let now = self.created.elapsed().as_millis() as u64;
        let last = self.swept_at.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.ttl.as_millis() as u64 {
            return;
        }
        if self
            .swept_at
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, e| e.stored.elapsed() < self.ttl);
        debug!(removed = before.saturating_sub(self.entries.len()), "Swept expired views");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ViewInvalidator for ViewCache {
    fn invalidate(&self, keys: &[ViewKey]) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.retain(|(key, _), _| !keys.contains(key));
        debug!(?keys, "Views invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> ViewCache {
        ViewCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = cache();
        let first = cache
            .read_through(ViewKey::Game(1), None, || async { Ok(json!({ "n": 1 })) })
            .await
            .unwrap();
        let second = cache
            .read_through(ViewKey::Game(1), None, || async { Ok(json!({ "n": 2 })) })
            .await
            .unwrap();

        assert_eq!(first, json!({ "n": 1 }));
        assert_eq!(second, json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn invalidation_drops_every_viewer_of_a_key() {
        let cache = cache();
        for viewer in [Some(1), Some(2)] {
            cache
                .read_through(ViewKey::Dashboard, viewer, || async { Ok(json!(1)) })
                .await
                .unwrap();
        }
        cache
            .read_through(ViewKey::Court(9), None, || async { Ok(json!(1)) })
            .await
            .unwrap();

        cache.invalidate(&[ViewKey::Dashboard]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(ViewKey::Court(9), None).is_some());
        assert!(cache.get(ViewKey::Dashboard, Some(1)).is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_reloaded() {
        let cache = ViewCache::new(Duration::ZERO);
        cache
            .read_through(ViewKey::Profile(4), None, || async { Ok(json!("old")) })
            .await
            .unwrap();
        let fresh = cache
            .read_through(ViewKey::Profile(4), None, || async { Ok(json!("new")) })
            .await
            .unwrap();

        assert_eq!(fresh, json!("new"));
    }

    #[tokio::test]
    async fn expired_entries_nobody_reads_are_swept() {
        let cache = ViewCache::new(Duration::from_millis(200));
        for id in [1, 2] {
            cache
                .read_through(ViewKey::Game(id), None, move || async move { Ok(json!(id)) })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        cache
            .read_through(ViewKey::Court(3), None, || async { Ok(json!(3)) })
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get(ViewKey::Court(3), None).is_some());
    }

    #[tokio::test]
    async fn load_racing_an_invalidation_is_not_kept() {
        let cache = cache();
        let shared = &cache;
        let value = cache
            .read_through(ViewKey::Game(5), None, move || async move {
                shared.invalidate(&[ViewKey::Game(5)]);
                Ok(json!("stale"))
            })
            .await
            .unwrap();

        assert_eq!(value, json!("stale"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failed_loads_are_not_cached() {
        let cache = cache();
        let err = cache
            .read_through(ViewKey::Court(1), None, || async {
                Err(courtside_models::Error::not_found("court", 1))
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "court 1 not found");
        assert!(cache.is_empty());
    }
}
