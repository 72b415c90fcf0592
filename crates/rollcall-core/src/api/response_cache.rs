use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// A GET body younger than this is served without contacting the server.
const FRESH_FOR_SECS: i64 = 60;

/// When the server cannot be reached, bodies up to a week old are still served.
const MAX_STALE_DAYS: i64 = 7;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: String,
    stored_at: DateTime<Utc>,
}

/// In-process cache of raw GET response bodies keyed by URL.
///
/// This sits below the sync layer: it only decides whether a request can be
/// answered without a round-trip, it never reconciles entities.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
    fresh_for: Duration,
    max_stale: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(
            Duration::seconds(FRESH_FOR_SECS),
            Duration::days(MAX_STALE_DAYS),
        )
    }
}

impl ResponseCache {
    pub fn new(fresh_for: Duration, max_stale: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fresh_for,
            max_stale,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, url: &str, max_age: Duration, now: DateTime<Utc>) -> Option<String> {
        let entries = self.lock();
        let entry = entries.get(url)?;
        if now - entry.stored_at <= max_age {
            Some(entry.body.clone())
        } else {
            None
        }
    }

    /// Body young enough to skip the network entirely.
    pub fn fresh(&self, url: &str) -> Option<String> {
        self.lookup(url, self.fresh_for, Utc::now())
    }

    /// Body still acceptable when the network request failed.
    pub fn stale(&self, url: &str) -> Option<String> {
        self.lookup(url, self.max_stale, Utc::now())
    }

    pub fn store(&self, url: &str, body: &str) {
        self.store_at(url, body, Utc::now());
    }

    fn store_at(&self, url: &str, body: &str, stored_at: DateTime<Utc>) {
        self.lock().insert(
            url.to_string(),
            CachedResponse {
                body: body.to_string(),
                stored_at,
            },
        );
    }

    /// Drop every entry whose URL starts with `prefix`. Called after writes
    /// so the next read of the resource goes to the server.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|url, _| !url.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "Invalidated cached responses");
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://host/api/course";

    #[test]
    fn test_fresh_entry_served() {
        let cache = ResponseCache::default();
        assert_eq!(cache.fresh(URL), None);

        cache.store(URL, "[]");
        assert_eq!(cache.fresh(URL).as_deref(), Some("[]"));
        assert_eq!(cache.stale(URL).as_deref(), Some("[]"));
    }

    #[test]
    fn test_expired_entry_only_served_stale() {
        let cache = ResponseCache::default();
        cache.store_at(URL, "[1]", Utc::now() - Duration::minutes(5));
        assert_eq!(cache.fresh(URL), None);
        assert_eq!(cache.stale(URL).as_deref(), Some("[1]"));

        cache.store_at(URL, "[2]", Utc::now() - Duration::days(8));
        assert_eq!(cache.stale(URL), None);
    }

    #[test]
    fn test_invalidate_prefix() {
        let cache = ResponseCache::default();
        cache.store("http://host/api/student", "[]");
        cache.store("http://host/api/student/course/2", "[]");
        cache.store(URL, "[]");

        cache.invalidate_prefix("http://host/api/student");
        assert_eq!(cache.fresh("http://host/api/student"), None);
        assert_eq!(cache.fresh("http://host/api/student/course/2"), None);
        assert!(cache.fresh(URL).is_some());

        cache.clear();
        assert!(cache.fresh(URL).is_none());
    }
}
