use std::borrow::Cow;
use std::time::Duration;

/// Retention used by [`CacheConfig::default`].
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Settings for a [`SingleFlightCache`](crate::SingleFlightCache).
///
/// # Fields
///
/// * `retention` - How long a fetched value stays fresh. `Duration::ZERO` never expires.
/// * `min_retry_interval` - Minimum time between a failed background refresh and the
///   next attempt. `None` retries on the very next stale call.
/// * `name` - Label attached to log events and to the refresh thread name.
///
/// # Examples
///
/// ```
/// use memoflight_core::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new(Duration::from_secs(30))
///     .with_min_retry_interval(Duration::from_secs(5))
///     .with_name("profiles");
///
/// assert_eq!(config.retention, Duration::from_secs(30));
/// assert_eq!(config.min_retry_interval, Some(Duration::from_secs(5)));
/// assert_eq!(config.name, "profiles");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub retention: Duration,
    pub min_retry_interval: Option<Duration>,
    pub name: Cow<'static, str>,
}

impl CacheConfig {
    /// Creates a configuration with the given retention and default other settings.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Sets the minimum interval before a failed background refresh is retried.
    pub fn with_min_retry_interval(mut self, interval: Duration) -> Self {
        self.min_retry_interval = Some(interval);
        self
    }

    /// Sets the label used in logs.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            min_retry_interval: None,
            name: Cow::Borrowed("default"),
        }
    }
}
