use memoflight::{CacheState, SingleFlightCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for_refresh<T>(cache: &SingleFlightCache<T>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while cache.is_refreshing() {
        assert!(Instant::now() < deadline, "background refresh did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}

fn counting_fetch(
    calls: &Arc<AtomicUsize>,
    value: &'static str,
    delay: Duration,
) -> impl FnOnce() -> Result<&'static str, String> + Send + 'static {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(delay);
        Ok(value)
    }
}

#[test]
fn test_fresh_stale_refresh_sequence() {
    let cache = SingleFlightCache::new(Duration::from_secs(1));
    let calls = Arc::new(AtomicUsize::new(0));

    // t=0: empty, the fetch runs
    let call1 = cache.get_or_refresh(counting_fetch(&calls, "A", Duration::ZERO));
    assert_eq!(call1.unwrap(), "A");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t=0.5s: fresh, no fetch
    thread::sleep(Duration::from_millis(500));
    let call2 = cache.get_or_refresh(counting_fetch(&calls, "A", Duration::ZERO));
    assert_eq!(call2.unwrap(), "A");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t=2s: stale, the slow refresh runs in the background
    thread::sleep(Duration::from_millis(1500));
    assert_eq!(cache.state(), CacheState::Stale);
    let started = Instant::now();
    let call3 = cache.get_or_refresh(counting_fetch(&calls, "B", Duration::from_millis(400)));
    assert_eq!(call3.unwrap(), "A");
    assert!(started.elapsed() < Duration::from_millis(200));

    // t=2.1s: refresh still running, stale value again and no second fetch
    thread::sleep(Duration::from_millis(100));
    assert_eq!(cache.state(), CacheState::Refreshing);
    let call4 = cache.get_or_refresh(counting_fetch(&calls, "C", Duration::ZERO));
    assert_eq!(call4.unwrap(), "A");

    wait_for_refresh(&cache);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let call5 = cache.get_or_refresh(counting_fetch(&calls, "D", Duration::ZERO));
    assert_eq!(call5.unwrap(), "B");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalidate_then_get_fetches_synchronously() {
    let cache = SingleFlightCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .get_or_refresh(counting_fetch(&calls, "A", Duration::ZERO))
        .unwrap();
    cache.invalidate();

    let started = Instant::now();
    let value = cache
        .get_or_refresh(counting_fetch(&calls, "B", Duration::from_millis(100)))
        .unwrap();

    // Behaves as empty: the caller waited for the new value
    assert_eq!(value, "B");
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_zero_retention_never_refreshes() {
    let cache = SingleFlightCache::new(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .get_or_refresh(counting_fetch(&calls, "forever", Duration::ZERO))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    for _ in 0..10 {
        let value = cache
            .get_or_refresh(counting_fetch(&calls, "other", Duration::ZERO))
            .unwrap();
        assert_eq!(value, "forever");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.state(), CacheState::Fresh);
}

#[cfg(feature = "stats")]
#[test]
fn test_stats_summary_after_sequence() {
    let cache = SingleFlightCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        cache
            .get_or_refresh(counting_fetch(&calls, "A", Duration::ZERO))
            .unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.misses(), 1);
    assert_eq!(stats.hits(), 3);
    assert_eq!(stats.refreshes(), 1);
    assert_eq!(stats.hit_rate(), 0.75);
}
