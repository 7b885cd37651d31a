//! Request execution

use cadence_core::{Command, Outcome, Reply, Request};
use tracing::{debug, warn};

use crate::Engine;

impl Engine {
    /// Execute a dequeued request and publish its reply
    pub(crate) fn execute(&self, request: Request) {
        let client_id = request.client_id();
        let request_timestamp = request.timestamp();
        let command = request.request_command();
        debug!(client = %client_id, %command, request_timestamp, "executing request");

        let outcome = match request.into_command() {
            Command::ConfigUpdateMaxWaitTime { seconds } => {
                match self.update_max_wait_time(seconds) {
                    Ok(()) => Outcome::MaxWaitTimeUpdated { seconds },
                    Err(err) => {
                        warn!(client = %client_id, %command, error = %err, "request rejected");
                        Outcome::Rejected {
                            reason: err.to_string(),
                        }
                    }
                }
            }
            Command::ControlSetActuatorState { filter, actuator } => Outcome::Actuator {
                actuator: actuator.id,
                sent: self.set_actuator_state_if(&filter, &actuator),
            },
            Command::ControlToggleActuatorState { filter, actuator } => Outcome::Actuator {
                actuator: actuator.id,
                sent: self.toggle_actuator_state_if(&filter, &actuator),
            },
            Command::ControlNotifyIf { filter } => {
                self.log_if(filter);
                Outcome::LogFilterInstalled
            }
            Command::AnalysisGetEventsInWindow { window } => Outcome::Events {
                events: self.events_in_time_window(window),
            },
            Command::AnalysisGetAllEntities => {
                let mut entity_ids: Vec<_> = self.all_entity_ids().into_iter().collect();
                entity_ids.sort_unstable();
                Outcome::Entities { entity_ids }
            }
            Command::AnalysisGetLatestEvents { n } => Outcome::Events {
                events: self.last_n_events(n),
            },
            Command::AnalysisGetMostActiveEntity => Outcome::MostActiveEntity {
                entity_id: self.most_active_entity(),
            },
            Command::AnalysisReadLogs => Outcome::Logs {
                entity_ids: self.read_logs(),
            },
            Command::PredictNextNTimestamps { entity_id, n } => Outcome::PredictedTimestamps {
                entity_id,
                timestamps: self.predict_next_timestamps(entity_id, n),
            },
            Command::PredictNextNValues { entity_id, n } => Outcome::PredictedValues {
                entity_id,
                values: self.predict_next_values(entity_id, n),
            },
        };

        self.publish(Reply {
            client_id,
            request_timestamp,
            command,
            outcome,
        });
    }
}
