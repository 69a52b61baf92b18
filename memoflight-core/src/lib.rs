//! # Memoflight Core
//!
//! Building blocks for memoizing one expensive fetch behind a concurrency-safe,
//! self-refreshing cache.
//!
//! ## Features
//!
//! - **Timed values**: Immutable payload snapshots that know when they go stale
//! - **Single-flight**: At most one fetch runs at a time, however many callers ask
//! - **Stale-while-refresh**: Expired values keep being served while one background refresh runs
//! - **Resilient**: A failed fetch never replaces a value that was good
//! - **Statistics**: Optional hit/stale/miss tracking (with `stats` feature)
//!
//! ## Module Organization
//!
//! - [`timed_value`] - Payload wrapper with creation time and retention
//! - [`single_flight`] - The refreshing cache and its state machine
//! - [`config`] - Cache settings
//! - [`error`] - Errors surfaced to callers
//!
pub mod config;
pub mod error;
pub mod single_flight;
pub mod timed_value;

#[cfg(feature = "stats")]
mod stats;

pub use config::{CacheConfig, DEFAULT_RETENTION};
pub use error::{BoxError, CacheError};
pub use single_flight::{CacheState, SingleFlightCache};
pub use timed_value::TimedValue;

#[cfg(feature = "stats")]
pub use stats::CacheStats;
