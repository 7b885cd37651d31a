//! Predictive analytics extension point

use cadence_core::{EntityId, Event, EventValue};

/// Forecasts an entity's next events from its committed history.
///
/// `history` holds only the entity's events, ascending by timestamp.
pub trait Forecaster: Send + Sync {
    fn next_timestamps(&self, entity: EntityId, history: &[Event], n: usize) -> Vec<f64>;

    fn next_values(&self, entity: EntityId, history: &[Event], n: usize) -> Vec<EventValue>;
}

/// Forecaster that predicts nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoForecast;

impl Forecaster for NoForecast {
    fn next_timestamps(&self, _entity: EntityId, _history: &[Event], _n: usize) -> Vec<f64> {
        Vec::new()
    }

    fn next_values(&self, _entity: EntityId, _history: &[Event], _n: usize) -> Vec<EventValue> {
        Vec::new()
    }
}
