//! Fixed clock.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::lock;
use crate::ports::Clock;

/// Returns a fixed instant that advances one second per call.
#[derive(Clone)]
pub struct FixedClock {
    next: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Starts at `start`.
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { next: Arc::new(Mutex::new(start)) }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = lock(&self.next);
        let now = *next;
        *next = now + Duration::seconds(1);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_one_second_per_call() {
        let clock = FixedClock::default();
        let first = clock.now();
        assert_eq!(first.to_rfc3339(), "2024-06-15T10:30:00+00:00");
        assert_eq!(clock.now() - first, Duration::seconds(1));
    }
}
