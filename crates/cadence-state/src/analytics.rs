//! Read-only queries over the committed history

use std::collections::{HashMap, HashSet};

use cadence_core::{EntityId, Event, TimeWindow};

use crate::History;

impl History {
    /// Events with `start <= timestamp <= end`, in history order
    pub fn events_in_window(&self, window: TimeWindow) -> Vec<Event> {
        self.events()
            .filter(|event| window.contains(event.timestamp()))
            .cloned()
            .collect()
    }

    /// Distinct entities seen in the history
    pub fn entity_ids(&self) -> HashSet<EntityId> {
        self.events().map(|event| event.entity_id()).collect()
    }

    /// The last `n` events ordered by `(timestamp, entity_id)`. Among equal
    /// timestamps the larger entity id counts as later.
    pub fn last_n_events(&self, n: usize) -> Vec<Event> {
        let mut events: Vec<&Event> = self.events().collect();
        events.sort_by(|a, b| {
            a.timestamp()
                .total_cmp(&b.timestamp())
                .then(a.entity_id().cmp(&b.entity_id()))
        });
        let skip = events.len().saturating_sub(n);
        events.into_iter().skip(skip).cloned().collect()
    }

    /// Entity with the most events, ties to the larger id. `None` when the
    /// history is empty.
    pub fn most_active_entity(&self) -> Option<EntityId> {
        let mut counts: HashMap<EntityId, usize> = HashMap::new();
        for event in self.events() {
            *counts.entry(event.entity_id()).or_default() += 1;
        }
        counts
            .into_iter()
            .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then(a.cmp(b)))
            .map(|(entity, _)| entity)
    }

    /// Event with the maximum timestamp; among equals, the last committed
    pub fn latest_event(&self) -> Option<&Event> {
        self.records()
            .iter()
            .max_by(|a, b| {
                a.event
                    .timestamp()
                    .total_cmp(&b.event.timestamp())
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|record| &record.event)
    }
}
