//! Engine configuration

use std::time::Duration;

use cadence_time::{BUFFER_TIME, DEFAULT_MAX_WAIT_TIME, DEFAULT_SAFETY_MARGIN};

/// Engine configuration
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Initial QoS bound, in seconds
    pub max_wait_time: f64,
    /// Margin kept below the QoS bound
    pub safety_margin: Duration,
    /// Re-sort cadence of the pending queues
    pub buffer_time: Duration,
    /// Replies buffered per subscriber before the slowest one lags
    pub reply_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_wait_time: DEFAULT_MAX_WAIT_TIME,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            buffer_time: BUFFER_TIME,
            reply_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Configuration for interactive clients: 100ms QoS bound
    pub fn low_latency() -> Self {
        EngineConfig {
            max_wait_time: 0.1,
            ..Default::default()
        }
    }
}
