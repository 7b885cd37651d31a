//! Server clock

use std::time::Duration;

use tokio::time::Instant;

use cadence_core::ServerTime;

/// Monotonic server clock, reading milliseconds since its epoch.
///
/// Backed by `tokio::time::Instant`, so it follows a paused or advanced
/// runtime clock in tests.
#[derive(Clone, Copy, Debug)]
pub struct ServerClock {
    epoch: Instant,
}

impl ServerClock {
    /// Start a clock at zero
    pub fn new() -> Self {
        ServerClock {
            epoch: Instant::now(),
        }
    }

    /// Current server time
    pub fn now(&self) -> ServerTime {
        ServerTime::from_millis(self.epoch.elapsed().as_millis() as u64)
    }

    /// Runtime instant corresponding to `at`
    pub fn instant_at(&self, at: ServerTime) -> Instant {
        self.epoch + Duration::from_millis(at.as_millis())
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}
