//! TTL cache for aggregate results
//!
//! Aggregations are slow and read-only, so identical (user, range) queries
//! within the TTL are answered from memory. Failures are never cached.

use async_trait::async_trait;
use dashmap::DashMap;
use replyrate_core::{AggregateCounts, AggregateSource, PeriodQuery, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Wraps an [`AggregateSource`] with a per-query TTL cache
pub struct CachedSource {
    inner: Arc<dyn AggregateSource>,
    ttl: Duration,
    entries: DashMap<PeriodQuery, (Instant, AggregateCounts)>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn AggregateSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until the next insert
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `counts` and drop every entry past the TTL; date ranges roll
    /// over, so stale keys are never looked up again
    fn store(&self, query: &PeriodQuery, counts: AggregateCounts) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        self.entries.insert(*query, (Instant::now(), counts));
    }

    fn lookup(&self, query: &PeriodQuery) -> Option<AggregateCounts> {
        let entry = self.entries.get(query)?;
        let (stored_at, counts) = *entry;
        drop(entry);

        if stored_at.elapsed() < self.ttl {
            Some(counts)
        } else {
            self.entries.remove(query);
            None
        }
    }
}

#[async_trait]
impl AggregateSource for CachedSource {
    async fn fetch_counts(&self, query: &PeriodQuery) -> Result<AggregateCounts> {
        if self.ttl.is_zero() {
            return self.inner.fetch_counts(query).await;
        }

        if let Some(counts) = self.lookup(query) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {} {}", query.user_id, query.range);
            return Ok(counts);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let counts = self.inner.fetch_counts(query).await?;
        self.store(query, counts);
        Ok(counts)
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn shutdown(&self) -> Result<()> {
        self.entries.clear();
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use replyrate_core::{DateRange, Error};
    use std::sync::atomic::AtomicU32;
    use uuid::Uuid;

    struct CountingSource {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl AggregateSource for CountingSource {
        async fn fetch_counts(&self, _query: &PeriodQuery) -> Result<AggregateCounts> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Source("boom".to_string()));
            }
            Ok(AggregateCounts {
                email_success: u64::from(n),
                ..Default::default()
            })
        }
    }

    fn query(day: u32) -> PeriodQuery {
        PeriodQuery {
            user_id: Uuid::nil(),
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, day + 7).unwrap(),
            ),
        }
    }

    fn source(fail: bool) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let inner = source(false);
        let cache = CachedSource::new(inner.clone(), Duration::from_secs(60));

        let first = cache.fetch_counts(&query(1)).await.unwrap();
        let second = cache.fetch_counts(&query(1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });

        // Different range is a different key
        cache.fetch_counts(&query(8)).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let inner = source(false);
        let cache = CachedSource::new(inner.clone(), Duration::ZERO);

        cache.fetch_counts(&query(1)).await.unwrap();
        cache.fetch_counts(&query(1)).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let inner = source(false);
        let cache = CachedSource::new(inner.clone(), Duration::from_millis(20));

        cache.fetch_counts(&query(1)).await.unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let refreshed = cache.fetch_counts(&query(1)).await.unwrap();
        assert_eq!(refreshed.email_success, 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_insert_prunes_expired_keys() {
        let inner = source(false);
        let cache = CachedSource::new(inner.clone(), Duration::from_millis(20));

        cache.fetch_counts(&query(1)).await.unwrap();
        cache.fetch_counts(&query(2)).await.unwrap();
        assert_eq!(cache.len(), 2);

        std::thread::sleep(Duration::from_millis(30));
        cache.fetch_counts(&query(8)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 3);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = source(true);
        let cache = CachedSource::new(inner.clone(), Duration::from_secs(60));

        assert!(cache.fetch_counts(&query(1)).await.is_err());
        assert!(cache.fetch_counts(&query(1)).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
