//! Time primitives for cadence
//!
//! Two notions of time travel with every message:
//! - the producer's timestamp (`f64` seconds, set at generation, never
//!   trusted for ordering of intake)
//! - server time (`ServerTime`), integer milliseconds on the server's monotonic clock,
//!   stamped exactly once when a message is taken in

use std::ops::{Add, Sub};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server time - milliseconds since the server clock's epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerTime(pub u64);

impl ServerTime {
    pub const ZERO: ServerTime = ServerTime(0);

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        ServerTime(millis)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is later
    #[inline]
    pub fn millis_since(self, earlier: ServerTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for ServerTime {
    type Output = ServerTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        ServerTime(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

impl Sub<ServerTime> for ServerTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: ServerTime) -> Self::Output {
        Duration::from_millis(self.millis_since(rhs))
    }
}

impl std::fmt::Debug for ServerTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({}ms)", self.0)
    }
}

/// Inclusive window over producer timestamps
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        TimeWindow { start, end }
    }

    /// Both ends are inclusive
    #[inline]
    pub fn contains(&self, timestamp: f64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}
