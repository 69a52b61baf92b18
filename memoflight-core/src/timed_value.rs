use std::time::{Duration, Instant};

/// An immutable snapshot of a computed value together with the moment it was
/// produced and how long it may be served as fresh.
///
/// A `TimedValue` never changes after construction. Refreshing a cache always
/// builds a new `TimedValue` and swaps it in, so any number of threads can hold
/// and read the same instance without locking.
///
/// # Type Parameters
///
/// * `T` - The type of the cached payload
///
/// # Retention
///
/// A retention of [`Duration::ZERO`] means the value never expires, which is
/// also what [`TimedValue::forever`] builds.
///
/// # Examples
///
/// ```
/// use memoflight_core::TimedValue;
/// use std::time::Duration;
///
/// let value = TimedValue::new("profile", Duration::from_secs(60));
/// assert!(value.is_fresh());
/// assert_eq!(value.fresh_value(), Some(&"profile"));
/// assert_eq!(value.raw_value(), &"profile");
/// ```
#[derive(Debug, Clone)]
pub struct TimedValue<T> {
    value: T,
    created_at: Instant,
    retention: Duration,
}

impl<T> TimedValue<T> {
    /// Wraps `value`, stamping it with `Instant::now()`.
    ///
    /// # Arguments
    ///
    /// * `value` - The payload to retain
    /// * `retention` - How long the payload stays fresh, `Duration::ZERO` for ever
    pub fn new(value: T, retention: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            retention,
        }
    }

    /// Wraps `value` so that it never expires.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::TimedValue;
    ///
    /// let value = TimedValue::forever(7);
    /// assert!(value.is_fresh());
    /// assert_eq!(value.retention(), None);
    /// assert_eq!(value.expires_at(), None);
    /// ```
    pub fn forever(value: T) -> Self {
        Self::new(value, Duration::ZERO)
    }

    /// Returns true while the value may still be served as fresh.
    ///
    /// # Returns
    ///
    /// * `true` if retention is zero or the retention window has not elapsed
    /// * `false` once `created_at + retention` has been reached
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight_core::TimedValue;
    /// use std::thread;
    /// use std::time::Duration;
    ///
    /// let value = TimedValue::new("data", Duration::from_millis(20));
    /// assert!(value.is_fresh());
    ///
    /// thread::sleep(Duration::from_millis(40));
    /// assert!(!value.is_fresh());
    /// ```
    pub fn is_fresh(&self) -> bool {
        match self.expires_at() {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }

    /// Returns the payload if it is still fresh, `None` once it has expired.
    ///
    /// Expiry is routine, so this is an `Option` and not an error.
    pub fn fresh_value(&self) -> Option<&T> {
        self.is_fresh().then_some(&self.value)
    }

    /// Returns the payload regardless of freshness.
    ///
    /// Used to serve a stale value while a refresh is running.
    pub fn raw_value(&self) -> &T {
        &self.value
    }

    /// Consumes the wrapper and returns the payload.
    pub fn into_value(self) -> T {
        self.value
    }

    /// The instant the value was produced.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The retention window, `None` if the value never expires.
    pub fn retention(&self) -> Option<Duration> {
        (!self.retention.is_zero()).then_some(self.retention)
    }

    /// The instant from which the value is stale, `None` if it never expires.
    ///
    /// A retention too large to be represented as an `Instant` is treated as
    /// never expiring.
    pub fn expires_at(&self) -> Option<Instant> {
        self.retention()
            .and_then(|retention| self.created_at.checked_add(retention))
    }

    /// Time elapsed since the value was produced.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_value_is_fresh() {
        let value = TimedValue::new(42, Duration::from_secs(10));
        assert!(value.is_fresh());
        assert_eq!(value.fresh_value(), Some(&42));
        assert_eq!(value.raw_value(), &42);
    }

    #[test]
    fn test_value_expiration() {
        let value = TimedValue::new("hello", Duration::from_millis(50));
        thread::sleep(Duration::from_millis(100));

        assert!(!value.is_fresh());
        assert_eq!(value.fresh_value(), None);
        // The payload is still reachable once stale
        assert_eq!(value.raw_value(), &"hello");
    }

    #[test]
    fn test_zero_retention_never_expires() {
        let value = TimedValue::new(100, Duration::ZERO);
        thread::sleep(Duration::from_millis(20));

        assert!(value.is_fresh());
        assert_eq!(value.retention(), None);
        assert_eq!(value.expires_at(), None);
    }

    #[test]
    fn test_expires_at_matches_retention() {
        let value = TimedValue::new((), Duration::from_secs(5));
        assert_eq!(
            value.expires_at(),
            Some(value.created_at() + Duration::from_secs(5))
        );
        assert_eq!(value.retention(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_huge_retention_never_expires() {
        let value = TimedValue::new(1u8, Duration::MAX);
        assert!(value.is_fresh());
        assert_eq!(value.expires_at(), None);
    }

    #[test]
    fn test_age_grows() {
        let value = TimedValue::forever(String::from("x"));
        thread::sleep(Duration::from_millis(10));
        assert!(value.age() >= Duration::from_millis(10));
        assert_eq!(value.into_value(), "x");
    }
}
