use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a cache has been serving its callers.
///
/// All counters are atomics updated with `Relaxed` ordering; they are for
/// monitoring and never used for coordination.
///
/// # Counters
///
/// * `hits` - Calls answered from a fresh value
/// * `stale_hits` - Calls answered with a stale value (a refresh was due or running)
/// * `misses` - Calls that found the cache empty and had to wait for a populate
/// * `refreshes` - Fetch executions that succeeded, the first populate included
/// * `failures` - Fetch executions that failed
///
/// # Examples
///
/// ```
/// use memoflight_core::CacheStats;
///
/// let stats = CacheStats::new();
/// stats.record_hit();
/// stats.record_stale_hit();
/// stats.record_miss();
///
/// assert_eq!(stats.total_accesses(), 3);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    failures: AtomicU64,
}

impl CacheStats {
    /// Creates a new `CacheStats` instance with zero counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call answered from a fresh value.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a call answered with a stale value.
    #[inline]
    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a call that found the cache empty and waited for a populate.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful fetch, whether it populated an empty cache or refreshed a stale one.
    #[inline]
    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed fetch, on the populate or the background path.
    #[inline]
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of calls answered from a fresh value.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of calls answered with a stale value.
    #[inline]
    pub fn stale_hits(&self) -> u64 {
        self.stale_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of calls that had to wait for a populate.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of successful fetches.
    ///
    /// The populate of an empty cache counts as well as background refreshes.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::CacheStats;
    ///
    /// let stats = CacheStats::new();
    /// stats.record_refresh();
    /// assert_eq!(stats.refreshes(), 1);
    /// ```
    #[inline]
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Returns the number of failed fetches.
    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the total number of calls served (fresh, stale and missed).
    #[inline]
    pub fn total_accesses(&self) -> u64 {
        self.hits() + self.stale_hits() + self.misses()
    }

    /// Returns the share of calls that did not have to wait, between 0.0 and 1.0.
    ///
    /// Stale hits count as hits: the caller got an answer immediately.
    /// Returns 0.0 when there have been no accesses.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::CacheStats;
    ///
    /// let stats = CacheStats::new();
    /// assert_eq!(stats.hit_rate(), 0.0);
    ///
    /// stats.record_hit();
    /// stats.record_miss();
    /// assert_eq!(stats.hit_rate(), 0.5);
    /// ```
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            (self.hits() + self.stale_hits()) as f64 / total as f64
        }
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.stale_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.refreshes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} stale_hits={} misses={} refreshes={} failures={} hit_rate={:.2}%",
            self.hits(),
            self.stale_hits(),
            self.misses(),
            self.refreshes(),
            self.failures(),
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stats_basic() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_refresh();

        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.refreshes(), 1);
        assert_eq!(stats.failures(), 0);
        assert_eq!(stats.total_accesses(), 3);
    }

    #[test]
    fn test_stats_reset() {
        let stats = CacheStats::new();
        stats.record_stale_hit();
        stats.record_failure();
        stats.reset();

        assert_eq!(stats.stale_hits(), 0);
        assert_eq!(stats.failures(), 0);
        assert_eq!(stats.total_accesses(), 0);
    }

    #[test]
    fn test_stats_concurrent() {
        let stats = Arc::new(CacheStats::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_hit();
                        stats.record_stale_hit();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.hits(), 1000);
        assert_eq!(stats.stale_hits(), 1000);
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();

        let text = stats.to_string();
        assert!(text.contains("hits=1"));
        assert!(text.contains("misses=1"));
        assert!(text.contains("hit_rate=50.00%"));
    }
}
