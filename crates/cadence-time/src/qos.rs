//! QoS policy and admission gate
//!
//! A queued message is held until `now - arrival >= wait budget`, where the
//! budget is `max_wait_time * 1000 - safety_margin` milliseconds. Holding
//! gives earlier-timestamped messages that arrive late a chance to overtake
//! it; the budget bounds how long that can take.

use std::time::Duration;

use cadence_core::{CadenceError, CadenceResult, ServerTime};

/// Default QoS bound, seconds
pub const DEFAULT_MAX_WAIT_TIME: f64 = 2.0;

/// Default margin kept below the QoS bound
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_millis(50);

/// Decision of the admission gate for the current candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Dequeue and process now
    Admit,
    /// Keep queued; the gate opens after at most this long
    Hold(Duration),
}

/// QoS policy of one engine
#[derive(Clone, Debug, PartialEq)]
pub struct QosPolicy {
    /// Ceiling on commit latency relative to arrival, in seconds
    max_wait_time: f64,
    /// Margin subtracted from the ceiling
    safety_margin: Duration,
}

impl Default for QosPolicy {
    fn default() -> Self {
        QosPolicy {
            max_wait_time: DEFAULT_MAX_WAIT_TIME,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl QosPolicy {
    /// Policy with a custom bound. Rejects negative and non-finite seconds.
    pub fn new(max_wait_time: f64, safety_margin: Duration) -> CadenceResult<Self> {
        let mut policy = QosPolicy {
            safety_margin,
            ..Default::default()
        };
        policy.set_max_wait_time(max_wait_time)?;
        Ok(policy)
    }

    /// Policy for interactive clients: 100ms bound
    pub fn low_latency() -> Self {
        QosPolicy {
            max_wait_time: 0.1,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    #[inline]
    pub fn max_wait_time(&self) -> f64 {
        self.max_wait_time
    }

    #[inline]
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Replace the QoS bound. The policy is left untouched on error.
    pub fn set_max_wait_time(&mut self, seconds: f64) -> CadenceResult<()> {
        if !seconds.is_finite() {
            return Err(CadenceError::NonFiniteWaitTime(seconds));
        }
        if seconds < 0.0 {
            return Err(CadenceError::NegativeWaitTime(seconds));
        }
        self.max_wait_time = seconds;
        Ok(())
    }

    /// `max_wait_time * 1000 - safety_margin`, in milliseconds. May be
    /// negative, in which case every candidate is admitted at once.
    pub fn wait_budget_ms(&self) -> f64 {
        self.max_wait_time * 1000.0 - self.safety_margin.as_millis() as f64
    }

    /// Gate a candidate that arrived at `arrival`
    pub fn admission(&self, arrival: ServerTime, now: ServerTime) -> Admission {
        let elapsed = now.millis_since(arrival) as f64;
        let budget = self.wait_budget_ms();
        if elapsed >= budget {
            Admission::Admit
        } else {
            // Server time is whole milliseconds, so round the wait up
            Admission::Hold(Duration::from_millis((budget - elapsed).ceil() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_budget() {
        let policy = QosPolicy::default();
        assert_eq!(policy.wait_budget_ms(), 1950.0);
        assert_eq!(QosPolicy::low_latency().wait_budget_ms(), 50.0);
    }

    #[test]
    fn test_admission_inequality() {
        let policy = QosPolicy::default();
        let arrival = ServerTime::from_millis(100);

        assert_eq!(
            policy.admission(arrival, ServerTime::from_millis(100)),
            Admission::Hold(Duration::from_millis(1950))
        );
        assert_eq!(
            policy.admission(arrival, ServerTime::from_millis(2049)),
            Admission::Hold(Duration::from_millis(1))
        );
        assert_eq!(policy.admission(arrival, ServerTime::from_millis(2050)), Admission::Admit);
    }

    #[test]
    fn test_negative_budget_admits_immediately() {
        let mut policy = QosPolicy::default();
        policy.set_max_wait_time(0.0).unwrap();
        assert_eq!(policy.wait_budget_ms(), -50.0);
        assert_eq!(
            policy.admission(ServerTime::from_millis(7), ServerTime::from_millis(7)),
            Admission::Admit
        );
    }

    #[test]
    fn test_negative_wait_time_rejected() {
        let mut policy = QosPolicy::default();
        assert!(matches!(
            policy.set_max_wait_time(-1.0),
            Err(CadenceError::NegativeWaitTime(_))
        ));
        assert!(policy.set_max_wait_time(f64::NAN).is_err());
        assert_eq!(policy, QosPolicy::default());
        assert!(QosPolicy::new(-0.5, DEFAULT_SAFETY_MARGIN).is_err());
    }

    #[test]
    fn test_infinite_wait_time_rejected() {
        let mut policy = QosPolicy::default();
        assert!(matches!(
            policy.set_max_wait_time(f64::INFINITY),
            Err(CadenceError::NonFiniteWaitTime(_))
        ));
        assert!(matches!(
            policy.set_max_wait_time(f64::NEG_INFINITY),
            Err(CadenceError::NonFiniteWaitTime(_))
        ));
        assert_eq!(policy, QosPolicy::default());
        assert!(QosPolicy::new(f64::INFINITY, DEFAULT_SAFETY_MARGIN).is_err());
    }

    proptest! {
        #[test]
        fn prop_hold_then_admit(
            wait in 0.0f64..10.0,
            arrival in 0u64..1_000_000,
            elapsed in 0u64..20_000,
        ) {
            let policy = QosPolicy::new(wait, DEFAULT_SAFETY_MARGIN).unwrap();
            let arrival = ServerTime::from_millis(arrival);
            let now = ServerTime::from_millis(arrival.as_millis() + elapsed);
            match policy.admission(arrival, now) {
                Admission::Admit => prop_assert!(elapsed as f64 >= policy.wait_budget_ms()),
                Admission::Hold(remaining) => {
                    prop_assert!((elapsed as f64) < policy.wait_budget_ms());
                    let later = now + remaining;
                    prop_assert_eq!(policy.admission(arrival, later), Admission::Admit);
                }
            }
        }
    }
}
