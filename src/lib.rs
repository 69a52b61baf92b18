//! # Memoflight
//!
//! A thread-safe memoization cache for one expensive fetch: values are kept for a
//! retention window, concurrent callers never trigger redundant fetches, and an
//! expired value keeps being served while exactly one refresh runs in the
//! background.
//!
//! ## Features
//!
//! - **Hot path is a read**: A fresh value costs one short read lock and a clone
//! - **Single-flight**: Concurrent callers on an empty cache share one fetch and its outcome
//! - **Stale-while-refresh**: Expired values are returned immediately while one refresh runs
//! - **Failure-tolerant**: Background refresh failures are logged and the last good value is kept
//! - **Explicit instances**: No global state; each cache is a value you construct and own
//!
//! ## Quick Start
//!
//! ```rust
//! use memoflight::SingleFlightCache;
//! use std::time::Duration;
//!
//! fn load_profile(id: &str) -> Result<String, std::io::Error> {
//!     Ok(format!("Profile #{id}"))
//! }
//!
//! let cache = SingleFlightCache::new(Duration::from_secs(600));
//!
//! // First call fetches and caches
//! let profile = cache.get_or_refresh(|| load_profile("123")).unwrap();
//! assert_eq!(profile, "Profile #123");
//!
//! // Later calls are served from the cache until the retention elapses
//! let again = cache.get_or_refresh(|| load_profile("456")).unwrap();
//! assert_eq!(again, "Profile #123");
//! ```
//!
//! ## Sharing a Cache
//!
//! The cache handle is `Clone`; clones share the same slot. Hand it to whatever
//! component needs it instead of keeping it in a static:
//!
//! ```rust
//! use memoflight::SingleFlightCache;
//! use std::thread;
//! use std::time::Duration;
//!
//! let cache: SingleFlightCache<u64> = SingleFlightCache::new(Duration::from_secs(60));
//!
//! let workers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let cache = cache.clone();
//!         thread::spawn(move || cache.get_or_refresh(|| Ok::<_, String>(42)))
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     assert_eq!(worker.join().unwrap().unwrap(), 42);
//! }
//! ```
//!
//! ## Error Handling
//!
//! A fetch failure only reaches callers when there is nothing cached to fall
//! back on:
//!
//! ```rust
//! use memoflight::{CacheError, SingleFlightCache};
//! use std::time::Duration;
//!
//! let cache: SingleFlightCache<u32> = SingleFlightCache::new(Duration::from_secs(60));
//!
//! let err = cache.get_or_refresh(|| Err::<u32, _>("upstream down")).unwrap_err();
//! assert!(matches!(err, CacheError::FetchFailed(_)));
//!
//! // Nothing was cached, so the next call fetches again
//! assert_eq!(cache.get_or_refresh(|| Ok::<_, String>(1)).unwrap(), 1);
//! ```

pub use memoflight_core::*;
