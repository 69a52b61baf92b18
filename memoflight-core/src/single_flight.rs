use crate::error::BoxError;
use crate::{CacheConfig, CacheError, TimedValue};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Derived view of what a [`SingleFlightCache`] is doing right now.
///
/// Only `Empty` and `Populating` make callers wait; every other state answers
/// immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing cached and no fetch running.
    Empty,
    /// Nothing cached, a first fetch is running and callers are waiting on it.
    Populating,
    /// A value is cached and within its retention window.
    Fresh,
    /// A value is cached but expired, and no refresh is running.
    Stale,
    /// A stale value is being served while a background refresh runs.
    Refreshing,
}

/// A memoizing cache for one expensive fetch, with time-based expiry and
/// single-flight refresh.
///
/// The cache holds at most one [`TimedValue`]. Callers ask for the current value
/// through [`get_or_refresh`](Self::get_or_refresh) and the cache decides what
/// has to happen:
///
/// - **Fresh**: the cached value is returned. No fetch and no waiting.
/// - **Stale**: the first caller claims the refresh and launches it on a background
///   thread; every caller, the claimant included, returns the stale value right away.
/// - **Empty**: there is nothing safe to return, so one caller fetches while all
///   others wait for its outcome. Everyone gets the same value or the same
///   [`CacheError::FetchFailed`].
///
/// # Guarantees
///
/// - At most one execution of a fetch operation runs at any time, whatever the
///   number of concurrent callers.
/// - The slot is only ever replaced as a whole by a new `TimedValue`; readers
///   see the previous value or the next one, never a mix.
/// - A failed fetch never touches the slot. A failed populate leaves the cache
///   empty so the next call retries; a failed background refresh keeps the stale
///   value and clears the in-progress flag so a later call can retry.
///
/// # Thread Safety
///
/// The handle is cheap to clone; clones share the same state. The slot is a
/// `parking_lot::RwLock` whose read lock is held only long enough to clone an
/// `Arc`, the in-progress flag is an `AtomicBool` claimed with
/// `compare_exchange`, and populate waiters block on a `Condvar`.
///
/// # Stuck fetches
///
/// The cache applies no timeout. A background refresh that never returns keeps
/// the in-progress flag set, and callers are served the last good value until it
/// does. Fetch operations are expected to bound their own running time.
///
/// # Examples
///
/// ```
/// use memoflight_core::SingleFlightCache;
/// use std::time::Duration;
///
/// let cache = SingleFlightCache::new(Duration::from_secs(60));
///
/// let first = cache.get_or_refresh(|| Ok::<_, std::io::Error>(String::from("A")));
/// assert_eq!(first.unwrap(), "A");
///
/// // Fresh: the fetch is not invoked again
/// let second = cache.get_or_refresh(|| -> Result<String, std::io::Error> {
///     unreachable!("value is still fresh")
/// });
/// assert_eq!(second.unwrap(), "A");
/// ```
pub struct SingleFlightCache<T> {
    shared: Arc<Shared<T>>,
}

type Outcome<T> = Result<Arc<TimedValue<T>>, CacheError>;

struct Shared<T> {
    config: CacheConfig,
    slot: RwLock<Option<Arc<TimedValue<T>>>>,
    refreshing: AtomicBool,
    // Held for the whole run of every fetch, populate or background.
    fetch_lock: Mutex<()>,
    flight: Mutex<Option<Arc<Flight<T>>>>,
    last_failure: Mutex<Option<Instant>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<T> SingleFlightCache<T> {
    /// Creates an empty cache whose values stay fresh for `retention`.
    ///
    /// `Duration::ZERO` means fetched values never expire.
    pub fn new(retention: Duration) -> Self {
        Self::with_config(CacheConfig::new(retention))
    }

    /// Creates an empty cache from a full [`CacheConfig`].
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                slot: RwLock::new(None),
                refreshing: AtomicBool::new(false),
                fetch_lock: Mutex::new(()),
                flight: Mutex::new(None),
                last_failure: Mutex::new(None),
                #[cfg(feature = "stats")]
                stats: CacheStats::new(),
            }),
        }
    }

    /// The settings this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Returns the cached value, fresh or not, without fetching.
    pub fn snapshot(&self) -> Option<Arc<TimedValue<T>>> {
        self.shared.snapshot()
    }

    /// Drops the cached value, sending the cache back to `Empty`.
    ///
    /// A refresh already running is not cancelled and may repopulate the cache
    /// when it completes.
    pub fn invalidate(&self) {
        *self.shared.slot.write() = None;
        debug!(cache = %self.shared.config.name, "cache invalidated");
    }

    /// Overwrites the slot with `value`, bypassing the single-flight claim.
    ///
    /// Only meant for tests that need to simulate expiry deterministically.
    #[doc(hidden)]
    pub fn force_replace(&self, value: TimedValue<T>) {
        *self.shared.slot.write() = Some(Arc::new(value));
    }

    /// Returns true while a background refresh holds the in-progress flag.
    pub fn is_refreshing(&self) -> bool {
        self.shared.refreshing.load(Ordering::Acquire)
    }

    /// Returns the current position in the cache state machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::{CacheState, SingleFlightCache};
    /// use std::time::Duration;
    ///
    /// let cache = SingleFlightCache::new(Duration::from_secs(60));
    /// assert_eq!(cache.state(), CacheState::Empty);
    ///
    /// cache.get_or_refresh(|| Ok::<_, String>(1)).unwrap();
    /// assert_eq!(cache.state(), CacheState::Fresh);
    ///
    /// cache.invalidate();
    /// assert_eq!(cache.state(), CacheState::Empty);
    /// ```
    pub fn state(&self) -> CacheState {
        match self.snapshot() {
            None if self.shared.flight.lock().is_some() => CacheState::Populating,
            None => CacheState::Empty,
            Some(current) if current.is_fresh() => CacheState::Fresh,
            Some(_) if self.is_refreshing() => CacheState::Refreshing,
            Some(_) => CacheState::Stale,
        }
    }

    /// Hit/miss/refresh counters for this cache instance.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlightCache<T> {
    /// Returns the current value, refreshing it if necessary.
    ///
    /// The produced value is retained for the configured retention. The fetch
    /// is only invoked when the cache is empty or stale, and never by more than
    /// one caller at a time. It must be `Send + 'static` because a stale cache
    /// runs it on a background thread.
    ///
    /// # Errors
    ///
    /// [`CacheError::FetchFailed`] when nothing has ever been cached (or the cache
    /// was invalidated) and the fetch fails. A stale cache never returns an error.
    pub fn get_or_refresh<F, E>(&self, fetch: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let retention = self.shared.config.retention;
        self.get_or_refresh_timed(move || fetch().map(|value| TimedValue::new(value, retention)))
    }

    /// Like [`get_or_refresh`](Self::get_or_refresh), but the fetch builds the
    /// [`TimedValue`] itself and so chooses the retention of what it produced.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::{SingleFlightCache, TimedValue};
    /// use std::time::Duration;
    ///
    /// let cache = SingleFlightCache::new(Duration::from_secs(1));
    /// let value = cache
    ///     .get_or_refresh_timed(|| Ok::<_, String>(TimedValue::forever("pinned")))
    ///     .unwrap();
    ///
    /// assert_eq!(value, "pinned");
    /// assert_eq!(cache.snapshot().unwrap().retention(), None);
    /// ```
    pub fn get_or_refresh_timed<F, E>(&self, fetch: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Result<TimedValue<T>, E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        match self.snapshot() {
            Some(current) if current.is_fresh() => {
                #[cfg(feature = "stats")]
                self.shared.stats.record_hit();
                Ok(current.raw_value().clone())
            }
            Some(stale) => {
                self.refresh_in_background(fetch);
                #[cfg(feature = "stats")]
                self.shared.stats.record_stale_hit();
                Ok(stale.raw_value().clone())
            }
            None => {
                #[cfg(feature = "stats")]
                self.shared.stats.record_miss();
                self.populate(fetch).map(|value| value.raw_value().clone())
            }
        }
    }

    fn refresh_in_background<F, E>(&self, fetch: F)
    where
        F: FnOnce() -> Result<TimedValue<T>, E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        if self.shared.retry_deferred() {
            debug!(cache = %self.shared.config.name, "refresh deferred after recent failure");
            return;
        }
        let Some(claim) = RefreshClaim::try_acquire(&self.shared) else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(refresh_thread_name(&self.shared.config.name))
            .spawn(move || {
                let _claim = claim;
                shared.refresh(fetch);
            });

        // On error the closure, and with it the claim, has already been dropped.
        if let Err(err) = spawned {
            self.shared.record_failure();
            warn!(
                cache = %self.shared.config.name,
                error = %err,
                "failed to spawn background refresh, serving stale value"
            );
        }
    }

    fn populate<F, E>(&self, fetch: F) -> Outcome<T>
    where
        F: FnOnce() -> Result<TimedValue<T>, E>,
        E: Into<BoxError>,
    {
        let leader = {
            let mut flight = self.shared.flight.lock();
            if let Some(current) = self.shared.snapshot() {
                return Ok(current);
            }
            if let Some(in_flight) = flight.as_ref().map(Arc::clone) {
                drop(flight);
                return in_flight.wait();
            }
            let created = Arc::new(Flight::new());
            *flight = Some(Arc::clone(&created));
            FlightLeader {
                shared: &*self.shared,
                flight: created,
            }
        };

        let outcome = self.shared.fetch_into_empty(fetch);
        leader.publish(outcome.clone());
        outcome
    }
}

impl<T> Shared<T> {
    fn snapshot(&self) -> Option<Arc<TimedValue<T>>> {
        self.slot.read().clone()
    }

    fn store(&self, value: TimedValue<T>) -> Arc<TimedValue<T>> {
        let value = Arc::new(value);
        *self.slot.write() = Some(Arc::clone(&value));
        *self.last_failure.lock() = None;
        #[cfg(feature = "stats")]
        self.stats.record_refresh();
        value
    }

    fn record_failure(&self) {
        *self.last_failure.lock() = Some(Instant::now());
        #[cfg(feature = "stats")]
        self.stats.record_failure();
    }

    fn retry_deferred(&self) -> bool {
        let Some(interval) = self.config.min_retry_interval else {
            return false;
        };
        self.last_failure
            .lock()
            .map_or(false, |failed_at| failed_at.elapsed() < interval)
    }

    fn fetch_into_empty<F, E>(&self, fetch: F) -> Outcome<T>
    where
        F: FnOnce() -> Result<TimedValue<T>, E>,
        E: Into<BoxError>,
    {
        let _fetching = self.fetch_lock.lock();
        // A background refresh may have repopulated the slot while we waited.
        if let Some(current) = self.snapshot() {
            return Ok(current);
        }

        debug!(cache = %self.config.name, "populating empty cache");
        match fetch() {
            Ok(value) => {
                debug!(cache = %self.config.name, "cache populated");
                Ok(self.store(value))
            }
            Err(err) => {
                let err = CacheError::fetch_failed(err);
                self.record_failure();
                debug!(cache = %self.config.name, error = %err, "populate failed");
                Err(err)
            }
        }
    }

    fn refresh<F, E>(&self, fetch: F)
    where
        F: FnOnce() -> Result<TimedValue<T>, E>,
        E: Into<BoxError>,
    {
        let _fetching = self.fetch_lock.lock();
        if self.snapshot().map_or(false, |current| current.is_fresh()) {
            debug!(cache = %self.config.name, "refresh skipped, value already fresh");
            return;
        }

        debug!(cache = %self.config.name, "refreshing stale value");
        match fetch() {
            Ok(value) => {
                self.store(value);
                debug!(cache = %self.config.name, "background refresh completed");
            }
            Err(err) => {
                let err: BoxError = err.into();
                self.record_failure();
                warn!(
                    cache = %self.config.name,
                    error = %err,
                    "background refresh failed, keeping stale value"
                );
            }
        }
    }
}

/// Thread names may not contain NUL, which `CacheConfig::name` allows.
fn refresh_thread_name(cache_name: &str) -> String {
    format!("memoflight-refresh-{}", cache_name.replace('\0', "_"))
}

/// Rendezvous for callers waiting on the populate of an empty cache.
struct Flight<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    done: Condvar,
}

impl<T> Flight<T> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Publishes the outcome once; later calls are ignored.
    fn complete(&self, outcome: Outcome<T>) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.done.notify_all();
        }
    }

    fn is_complete(&self) -> bool {
        self.outcome.lock().is_some()
    }

    fn wait(&self) -> Outcome<T> {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut slot);
        }
    }
}

/// Held by the caller that installed the current [`Flight`].
///
/// Dropping it without publishing (the fetch panicked) hands waiters a failure
/// instead of leaving them blocked.
struct FlightLeader<'a, T> {
    shared: &'a Shared<T>,
    flight: Arc<Flight<T>>,
}

impl<T> FlightLeader<'_, T> {
    fn publish(&self, outcome: Outcome<T>) {
        // Unregister before waking waiters, so that a waiter calling again
        // after a failure starts a new populate instead of rejoining this one.
        {
            let mut current = self.shared.flight.lock();
            if current
                .as_ref()
                .map_or(false, |flight| Arc::ptr_eq(flight, &self.flight))
            {
                *current = None;
            }
        }
        self.flight.complete(outcome);
    }
}

impl<T> Drop for FlightLeader<'_, T> {
    fn drop(&mut self) {
        if !self.flight.is_complete() {
            self.publish(Err(CacheError::fetch_failed("fetch operation panicked")));
        }
    }
}

/// Ownership of the in-progress flag; the flag is cleared when this is dropped.
struct RefreshClaim<T> {
    shared: Arc<Shared<T>>,
}

impl<T> RefreshClaim<T> {
    fn try_acquire(shared: &Arc<Shared<T>>) -> Option<Self> {
        shared
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                shared: Arc::clone(shared),
            })
    }
}

impl<T> Drop for RefreshClaim<T> {
    fn drop(&mut self) {
        self.shared.refreshing.store(false, Ordering::Release);
    }
}

impl<T> Clone for SingleFlightCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for SingleFlightCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
