//! Re-sort cadence of the pending queues

use std::time::Duration;

use cadence_core::ServerTime;

/// Interval between two re-sorts of the pending queues
pub const BUFFER_TIME: Duration = Duration::from_millis(10);

/// Tracks when the pending queues were last re-sorted
#[derive(Clone, Debug)]
pub struct ResortTimer {
    interval: Duration,
    last: Option<ServerTime>,
}

impl ResortTimer {
    pub fn new(interval: Duration) -> Self {
        ResortTimer {
            interval,
            last: None,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true, and restarts the interval, if a re-sort is due.
    /// The first call is always due.
    pub fn due(&mut self, now: ServerTime) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last re-sort, so the next check is due
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for ResortTimer {
    fn default() -> Self {
        Self::new(BUFFER_TIME)
    }
}
