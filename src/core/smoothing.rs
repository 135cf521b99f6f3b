//! Temporal smoothing of instantaneous verdicts.
//!
//! Per-frame verdicts are noisy; a single glance away should not mark a
//! period as cheating. Verdicts are buffered over a trailing time window and
//! only a strict majority of true entries yields a smoothed cheating verdict.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Rolling buffer of (timestamp, instantaneous verdict) pairs.
///
/// Owned exclusively by the session's frame loop; never shared.
#[derive(Debug)]
pub struct VerdictWindow {
    window: Duration,
    buffer: VecDeque<(DateTime<Utc>, bool)>,
}

impl VerdictWindow {
    /// Create a window covering the trailing `window_secs` seconds.
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::seconds(window_secs as i64),
            buffer: VecDeque::new(),
        }
    }

    /// Append a verdict, then evict entries older than the window relative to
    /// the newest entry.
    pub fn insert(&mut self, at: DateTime<Utc>, cheating: bool) {
        self.buffer.push_back((at, cheating));

        // Eviction is anchored on the newest entry, not wall time.
        let newest = self.buffer.back().map(|(t, _)| *t).unwrap_or(at);
        while let Some((oldest, _)) = self.buffer.front() {
            if newest - *oldest > self.window {
                self.buffer.pop_front();
            } else {
                break;
            }
        }
    }

    /// Strict-majority verdict over the current buffer. An empty buffer and a
    /// tie both yield false.
    pub fn majority_verdict(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        let true_count = self.buffer.iter().filter(|(_, v)| *v).count();
        2 * true_count > self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
