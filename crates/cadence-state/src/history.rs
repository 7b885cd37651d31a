//! Committed history and the filter log
//!
//! INVARIANT: `records` is ascending by event timestamp at all times.
//! INVARIANT: the log holds, in history order, exactly the records that match
//! the active filter and were committed since the filter was installed or the
//! log was last drained.

use cadence_core::{EntityId, Event, Filter};
use tracing::{debug, trace};

/// A committed event with its commit sequence number
#[derive(Clone, Debug)]
pub(crate) struct Record {
    pub(crate) seq: u64,
    pub(crate) event: Event,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct LogEntry {
    seq: u64,
    timestamp: f64,
    entity_id: EntityId,
}

impl LogEntry {
    fn of(record: &Record) -> Self {
        LogEntry {
            seq: record.seq,
            timestamp: record.event.timestamp(),
            entity_id: record.event.entity_id(),
        }
    }
}

#[derive(Clone, Debug)]
struct ActiveFilter {
    filter: Filter,
    /// First sequence number eligible for the log
    since: u64,
}

impl ActiveFilter {
    fn logs(&self, record: &Record) -> bool {
        record.seq >= self.since && self.filter.satisfies(&record.event)
    }
}

/// Where a commit placed its event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Appended at the end of the history
    Appended,
    /// Inserted ahead of `disturbed` later-or-equal events
    Inserted { position: usize, disturbed: usize },
}

/// Ordered history of one client, with its active filter and log buffer
#[derive(Clone, Debug, Default)]
pub struct History {
    records: Vec<Record>,
    log: Vec<LogEntry>,
    active: Option<ActiveFilter>,
    /// Timestamp of the last committed event (not necessarily the maximum)
    recent_timestamp: f64,
    next_seq: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Committed events, ascending by timestamp
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.records.iter().map(|record| &record.event)
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// Timestamp of the most recently committed event. Regresses after an
    /// out-of-order commit.
    #[inline]
    pub fn recent_timestamp(&self) -> f64 {
        self.recent_timestamp
    }

    pub fn active_filter(&self) -> Option<&Filter> {
        self.active.as_ref().map(|active| &active.filter)
    }

    /// Number of events waiting in the log buffer
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Commit an event, keeping the history ordered and the log consistent
    pub fn commit(&mut self, event: Event) -> CommitOutcome {
        let seq = self.next_seq;
        self.next_seq += 1;

        let timestamp = event.timestamp();
        let record = Record { seq, event };

        let in_order = self
            .records
            .last()
            .map_or(true, |last| timestamp >= last.event.timestamp());

        let outcome = if in_order {
            if let Some(active) = &self.active {
                if active.logs(&record) {
                    self.log.push(LogEntry::of(&record));
                }
            }
            self.records.push(record);
            CommitOutcome::Appended
        } else {
            // Walk back to the last event strictly earlier than this one
            let position = self
                .records
                .iter()
                .rposition(|r| r.event.timestamp() < timestamp)
                .map_or(0, |i| i + 1);
            let disturbed = self.records.len() - position;
            self.records.insert(position, record);
            self.repair_log(position);
            CommitOutcome::Inserted { position, disturbed }
        };

        trace!(seq, timestamp, ?outcome, "committed");
        self.recent_timestamp = timestamp;
        outcome
    }

    /// Splice the record inserted at `position` into the log. The log tail
    /// must match the disturbed suffix entry for entry; otherwise the log is
    /// rebuilt from the history.
    fn repair_log(&mut self, position: usize) {
        let Some(active) = &self.active else {
            return;
        };

        let expected: Vec<u64> = self.records[position + 1..]
            .iter()
            .filter(|record| active.logs(record))
            .map(|record| record.seq)
            .collect();

        let repaired = match self.log.len().checked_sub(expected.len()) {
            Some(start)
                if self.log[start..]
                    .iter()
                    .map(|entry| entry.seq)
                    .eq(expected.iter().copied()) =>
            {
                let inserted = &self.records[position];
                if active.logs(inserted) {
                    self.log.insert(start, LogEntry::of(inserted));
                }
                true
            }
            _ => false,
        };

        if !repaired {
            debug!(position, "log tail diverged from history, rebuilding");
            self.rebuild_log();
        }
    }

    fn rebuild_log(&mut self) {
        self.log = match &self.active {
            Some(active) => self
                .records
                .iter()
                .filter(|record| active.logs(record))
                .map(LogEntry::of)
                .collect(),
            None => Vec::new(),
        };
    }

    /// Replace the active filter. Any unread log is discarded.
    pub fn install_filter(&mut self, filter: Filter) {
        debug!(%filter, "installing log filter");
        self.active = Some(ActiveFilter {
            filter,
            since: self.next_seq,
        });
        self.log.clear();
    }

    /// Entity ids in the log, latest timestamp first. Empties the log.
    pub fn drain_logs(&mut self) -> Vec<EntityId> {
        let mut entries = std::mem::take(&mut self.log);
        if let Some(active) = &mut self.active {
            active.since = self.next_seq;
        }
        entries.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        entries.into_iter().map(|entry| entry.entity_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ClientId, DoubleOperator, NumericField};
    use proptest::prelude::*;

    fn sensor(timestamp: f64, entity: u32) -> Event {
        Event::sensor(timestamp, ClientId::new(0), EntityId::new(entity), "TempSensor", 20.0)
    }

    fn timestamps(history: &History) -> Vec<f64> {
        history.events().map(|e| e.timestamp()).collect()
    }

    fn before(bound: f64) -> Filter {
        Filter::numeric(NumericField::Timestamp, DoubleOperator::LessThan, bound)
    }

    #[test]
    fn test_in_order_append() {
        let mut history = History::new();
        assert_eq!(history.commit(sensor(1.0, 1)), CommitOutcome::Appended);
        assert_eq!(history.commit(sensor(1.0, 2)), CommitOutcome::Appended);
        assert_eq!(history.commit(sensor(2.0, 3)), CommitOutcome::Appended);
        assert_eq!(timestamps(&history), vec![1.0, 1.0, 2.0]);
        assert_eq!(history.recent_timestamp(), 2.0);
    }

    #[test]
    fn test_out_of_order_insert_and_log_repair() {
        let mut history = History::new();
        history.install_filter(before(6.0));

        history.commit(sensor(5.0, 50));
        history.commit(sensor(10.0, 100));
        let outcome = history.commit(sensor(3.0, 30));

        assert_eq!(
            outcome,
            CommitOutcome::Inserted {
                position: 0,
                disturbed: 2
            }
        );
        assert_eq!(timestamps(&history), vec![3.0, 5.0, 10.0]);
        assert_eq!(
            history.drain_logs(),
            vec![EntityId::new(50), EntityId::new(30)]
        );
        assert!(history.drain_logs().is_empty());
    }

    #[test]
    fn test_recent_timestamp_regresses() {
        let mut history = History::new();
        history.commit(sensor(5.0, 1));
        history.commit(sensor(10.0, 1));
        history.commit(sensor(3.0, 1));
        assert_eq!(history.recent_timestamp(), 3.0);

        // Still ordered: the next event is placed against the true maximum
        history.commit(sensor(4.0, 1));
        assert_eq!(timestamps(&history), vec![3.0, 4.0, 5.0, 10.0]);
    }

    #[test]
    fn test_insert_lands_after_equal_predecessor() {
        let mut history = History::new();
        history.commit(sensor(1.0, 1));
        history.commit(sensor(2.0, 2));
        history.commit(sensor(2.0, 3));
        history.commit(sensor(4.0, 4));

        let outcome = history.commit(sensor(2.0, 9));
        assert_eq!(
            outcome,
            CommitOutcome::Inserted {
                position: 1,
                disturbed: 3
            }
        );
        let entities: Vec<u32> = history.events().map(|e| e.entity_id().0).collect();
        assert_eq!(entities, vec![1, 9, 2, 3, 4]);
    }

    #[test]
    fn test_install_filter_discards_unread_log() {
        let mut history = History::new();
        history.install_filter(before(100.0));
        history.commit(sensor(1.0, 1));
        assert_eq!(history.log_len(), 1);

        history.install_filter(before(100.0));
        assert_eq!(history.log_len(), 0);

        // Events committed before installation never reach the log
        history.commit(sensor(0.5, 2));
        assert_eq!(history.drain_logs(), vec![EntityId::new(2)]);
    }

    #[test]
    fn test_drained_events_do_not_return() {
        let mut history = History::new();
        history.install_filter(before(6.0));
        history.commit(sensor(5.0, 5));
        assert_eq!(history.drain_logs(), vec![EntityId::new(5)]);

        history.commit(sensor(3.0, 3));
        assert_eq!(history.drain_logs(), vec![EntityId::new(3)]);
    }

    #[test]
    fn test_no_filter_no_log() {
        let mut history = History::new();
        history.commit(sensor(2.0, 1));
        history.commit(sensor(1.0, 2));
        assert!(history.active_filter().is_none());
        assert!(history.drain_logs().is_empty());
    }

    fn arb_commits() -> impl Strategy<Value = Vec<(u8, u32)>> {
        prop::collection::vec((0u8..40, 0u32..6), 0..60)
    }

    proptest! {
        #[test]
        fn prop_history_sorted_and_log_matches_reference(
            commits in arb_commits(),
            install_at in 0usize..60,
            bound in 0u8..40,
        ) {
            let mut history = History::new();
            let filter = before(bound as f64);
            let install_at = install_at.min(commits.len());

            for (i, (ts, entity)) in commits.iter().enumerate() {
                if i == install_at {
                    history.install_filter(filter.clone());
                }
                history.commit(sensor(*ts as f64, *entity));
            }
            if install_at == commits.len() {
                history.install_filter(filter.clone());
            }

            let ts = timestamps(&history);
            prop_assert!(ts.windows(2).all(|w| w[0] <= w[1]));

            let mut reference: Vec<&Record> = history
                .records()
                .iter()
                .filter(|r| r.seq >= install_at as u64 && filter.satisfies(&r.event))
                .collect();
            reference.sort_by(|a, b| b.event.timestamp().total_cmp(&a.event.timestamp()));
            let reference: Vec<EntityId> = reference.iter().map(|r| r.event.entity_id()).collect();

            prop_assert_eq!(history.drain_logs(), reference);
        }
    }
}
