//! Session timing.

use chrono::{DateTime, Duration, Utc};

/// Tracks one session's start time and total allotted duration.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    started_at: DateTime<Utc>,
    total: Duration,
}

impl SessionClock {
    pub fn new(started_at: DateTime<Utc>, total_secs: u64) -> Self {
        Self {
            started_at,
            total: Duration::seconds(total_secs as i64),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Seconds elapsed since session start.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Whole seconds remaining, clamped at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.total - (now - self.started_at);
        remaining.num_seconds().max(0) as u64
    }

    /// Whether the allotted duration has fully elapsed.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_remaining_and_expiry() {
        let t0 = Utc::now();
        let clock = SessionClock::new(t0, 100);

        assert_eq!(clock.remaining_secs(t0), 100);
        assert!(!clock.expired(t0));

        let mid = t0 + Duration::seconds(40);
        assert_eq!(clock.remaining_secs(mid), 60);
        assert!((clock.elapsed_secs(mid) - 40.0).abs() < 0.001);

        let end = t0 + Duration::seconds(100);
        assert_eq!(clock.remaining_secs(end), 0);
        assert!(clock.expired(end));

        // Past the deadline stays clamped at zero.
        let past = t0 + Duration::seconds(250);
        assert_eq!(clock.remaining_secs(past), 0);
        assert!(clock.expired(past));
    }
}
