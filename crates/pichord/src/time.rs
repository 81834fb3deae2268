use chrono::{DateTime, Utc};

/// A source of wall-clock timestamps.
///
/// Timestamps only stamp records (`assignedAt`, `lastRenderedAt`) and mint
/// cache-busting tokens; they never feed into render geometry. Abstracting the
/// clock lets tests pin or step time.
///
/// # Example
///
/// ```
/// use chrono::{DateTime, Utc};
/// use pichord::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn now(&self) -> DateTime<Utc> {
///         DateTime::from_timestamp_millis(1_234).unwrap()
///     }
/// }
///
/// assert_eq!(FixedTime.now_millis(), 1_234);
/// ```
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
