//! Clock port for run timestamps.

use chrono::{DateTime, Utc};

/// Provides the current wall-clock time.
///
/// Used for `started_at`/`finished_at` stamps and log file names. Elapsed
/// durations are measured with a monotonic timer, not this port.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
