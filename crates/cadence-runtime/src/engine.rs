//! Engine - one client's intake queues, scheduler, history and queries

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cadence_core::{
    ActuatorCommand, ActuatorRef, CadenceError, CadenceResult, ClientId, EntityId, Event,
    EventValue, Filter, Reply, Request, ServerTime, TimeWindow,
};
use cadence_state::History;
use cadence_time::{Admission, QosPolicy, ResortTimer, ServerClock};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, trace};

use crate::{ActuatorControl, EngineConfig, Forecaster, NoForecast};

/// Shortest hold between two scheduling passes
const MIN_HOLD: Duration = Duration::from_millis(1);

/// Everything guarded by the engine lock
struct EngineState {
    pending_events: VecDeque<Event>,
    pending_requests: VecDeque<Request>,
    history: History,
    qos: QosPolicy,
    resort: ResortTimer,
    /// INVARIANT: true iff a processing loop task is alive for this engine
    running: bool,
}

impl EngineState {
    fn sort_pending(&mut self) {
        self.pending_events
            .make_contiguous()
            .sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        self.pending_requests
            .make_contiguous()
            .sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
    }
}

/// Head of the queues, by arrival stamp
#[derive(Clone, Copy)]
enum Candidate {
    Event(Option<ServerTime>),
    Request(Option<ServerTime>),
}

/// Outcome of one scheduling pass
enum Step {
    Idle,
    Committed,
    Execute(Request),
    Hold(Duration),
}

struct Shared {
    client_id: ClientId,
    clock: ServerClock,
    buffer_time: Duration,
    state: Mutex<EngineState>,
    wake: Notify,
    control: Arc<dyn ActuatorControl>,
    forecaster: Arc<dyn Forecaster>,
    replies: broadcast::Sender<Reply>,
    runtime: Handle,
}

/// Processing engine of one client. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("client_id", &self.shared.client_id)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine without forecasting. Must be called from within a
    /// Tokio runtime, which will run the engine's processing loop.
    pub fn new(
        client_id: ClientId,
        config: EngineConfig,
        control: Arc<dyn ActuatorControl>,
    ) -> CadenceResult<Self> {
        Self::with_forecaster(client_id, config, control, Arc::new(NoForecast))
    }

    pub fn with_forecaster(
        client_id: ClientId,
        config: EngineConfig,
        control: Arc<dyn ActuatorControl>,
        forecaster: Arc<dyn Forecaster>,
    ) -> CadenceResult<Self> {
        let runtime = Handle::try_current().map_err(|_| CadenceError::RuntimeUnavailable)?;
        let qos = QosPolicy::new(config.max_wait_time, config.safety_margin)?;
        let (replies, _) = broadcast::channel(config.reply_capacity.max(1));

        info!(client = %client_id, max_wait_time = config.max_wait_time, "engine created");

        Ok(Engine {
            shared: Arc::new(Shared {
                client_id,
                clock: ServerClock::new(),
                buffer_time: config.buffer_time,
                state: Mutex::new(EngineState {
                    pending_events: VecDeque::new(),
                    pending_requests: VecDeque::new(),
                    history: History::new(),
                    qos,
                    resort: ResortTimer::new(config.buffer_time),
                    running: false,
                }),
                wake: Notify::new(),
                control,
                forecaster,
                replies,
                runtime,
            }),
        })
    }

    #[inline]
    pub fn client_id(&self) -> ClientId {
        self.shared.client_id
    }

    /// Current server time on this engine's clock
    pub fn now(&self) -> ServerTime {
        self.shared.clock.now()
    }

    fn check_client(&self, got: ClientId) -> CadenceResult<()> {
        if got != self.shared.client_id {
            return Err(CadenceError::ClientMismatch {
                expected: self.shared.client_id,
                got,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Intake
    // ------------------------------------------------------------------

    /// Queue an event, stamping its arrival time if unset
    pub fn submit_event(&self, mut event: Event) -> CadenceResult<()> {
        self.check_client(event.client_id())?;
        if event.arrival_time().is_none() {
            event.stamp_arrival(self.now())?;
        }
        trace!(
            client = %self.shared.client_id,
            entity = %event.entity_id(),
            timestamp = event.timestamp(),
            "event queued"
        );

        let start = {
            let mut state = self.shared.state.lock();
            state.pending_events.push_back(event);
            !std::mem::replace(&mut state.running, true)
        };
        self.wake_or_start(start);
        Ok(())
    }

    /// Queue a request, stamping its reception time if unset
    pub fn submit_request(&self, mut request: Request) -> CadenceResult<()> {
        self.check_client(request.client_id())?;
        if request.reception_time().is_none() {
            request.stamp_reception(self.now())?;
        }
        trace!(
            client = %self.shared.client_id,
            command = %request.request_command(),
            timestamp = request.timestamp(),
            "request queued"
        );

        let start = {
            let mut state = self.shared.state.lock();
            state.pending_requests.push_back(request);
            !std::mem::replace(&mut state.running, true)
        };
        self.wake_or_start(start);
        Ok(())
    }

    fn wake_or_start(&self, start: bool) {
        if start {
            self.shared.runtime.spawn(self.clone().run());
        } else {
            self.shared.wake.notify_one();
        }
    }

    /// Whether a processing loop is alive
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of queued `(events, requests)`
    pub fn pending(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.pending_events.len(), state.pending_requests.len())
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    async fn run(self) {
        info!(client = %self.shared.client_id, "processing loop started");

        loop {
            match self.next_step() {
                Step::Idle => break,
                Step::Committed => tokio::task::yield_now().await,
                Step::Execute(request) => {
                    self.execute(request);
                    tokio::task::yield_now().await;
                }
                Step::Hold(remaining) => {
                    // Wake at least every buffer_time so a re-sort can change the candidate
                    let wait = remaining.min(self.shared.buffer_time).max(MIN_HOLD);
                    tokio::select! {
                        _ = self.shared.wake.notified() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }

        info!(client = %self.shared.client_id, "processing loop stopped");
    }

    /// One scheduling pass, under the engine lock
    fn next_step(&self) -> Step {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let now = self.shared.clock.now();

        if state.resort.due(now) {
            state.sort_pending();
        }

        let candidate = match (state.pending_events.front(), state.pending_requests.front()) {
            (Some(event), Some(request)) if event.timestamp() <= request.timestamp() => {
                Candidate::Event(event.arrival_time())
            }
            (Some(event), None) => Candidate::Event(event.arrival_time()),
            (_, Some(request)) => Candidate::Request(request.reception_time()),
            (None, None) => {
                state.running = false;
                return Step::Idle;
            }
        };

        let arrival = match candidate {
            Candidate::Event(at) | Candidate::Request(at) => at.unwrap_or(now),
        };
        if let Admission::Hold(remaining) = state.qos.admission(arrival, now) {
            trace!(client = %self.shared.client_id, ?remaining, "candidate held");
            return Step::Hold(remaining);
        }

        match candidate {
            Candidate::Event(_) => {
                if let Some(event) = state.pending_events.pop_front() {
                    let entity = event.entity_id();
                    let timestamp = event.timestamp();
                    let outcome = state.history.commit(event);
                    debug!(
                        client = %self.shared.client_id,
                        %entity,
                        timestamp,
                        ?outcome,
                        "event committed"
                    );
                }
                Step::Committed
            }
            Candidate::Request(_) => state
                .pending_requests
                .pop_front()
                .map_or(Step::Committed, Step::Execute),
        }
    }

    // ------------------------------------------------------------------
    // Configuration and logs
    // ------------------------------------------------------------------

    /// Replace the QoS bound. Rejects negative values, leaving the engine unchanged.
    pub fn update_max_wait_time(&self, seconds: f64) -> CadenceResult<()> {
        self.shared.state.lock().qos.set_max_wait_time(seconds)?;
        info!(client = %self.shared.client_id, seconds, "max wait time updated");
        // A held candidate may be admissible under the new bound
        self.shared.wake.notify_one();
        Ok(())
    }

    pub fn max_wait_time(&self) -> f64 {
        self.shared.state.lock().qos.max_wait_time()
    }

    /// Install `filter` as the active log filter. Unread log entries are discarded.
    pub fn log_if(&self, filter: Filter) {
        self.shared.state.lock().history.install_filter(filter);
    }

    /// Entity ids of logged events, latest first. Empties the log.
    pub fn read_logs(&self) -> Vec<EntityId> {
        self.shared.state.lock().history.drain_logs()
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    pub fn events_in_time_window(&self, window: TimeWindow) -> Vec<Event> {
        self.shared.state.lock().history.events_in_window(window)
    }

    pub fn all_entity_ids(&self) -> HashSet<EntityId> {
        self.shared.state.lock().history.entity_ids()
    }

    pub fn last_n_events(&self, n: usize) -> Vec<Event> {
        self.shared.state.lock().history.last_n_events(n)
    }

    pub fn most_active_entity(&self) -> Option<EntityId> {
        self.shared.state.lock().history.most_active_entity()
    }

    pub fn latest_event(&self) -> Option<Event> {
        self.shared.state.lock().history.latest_event().cloned()
    }

    /// Snapshot of the committed history
    pub fn committed_events(&self) -> Vec<Event> {
        self.shared.state.lock().history.events().cloned().collect()
    }

    pub fn predict_next_timestamps(&self, entity: EntityId, n: usize) -> Vec<f64> {
        let history = self.entity_history(entity);
        self.shared.forecaster.next_timestamps(entity, &history, n)
    }

    pub fn predict_next_values(&self, entity: EntityId, n: usize) -> Vec<EventValue> {
        let history = self.entity_history(entity);
        self.shared.forecaster.next_values(entity, &history, n)
    }

    fn entity_history(&self, entity: EntityId) -> Vec<Event> {
        self.shared
            .state
            .lock()
            .history
            .events()
            .filter(|event| event.entity_id() == entity)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Actuator control
    // ------------------------------------------------------------------

    /// Command `actuator` to switch on if the latest event satisfies `filter`.
    /// Returns the command sent, if any.
    pub fn set_actuator_state_if(
        &self,
        filter: &Filter,
        actuator: &ActuatorRef,
    ) -> Option<ActuatorCommand> {
        self.actuate_if(filter, actuator, ActuatorCommand::SetState { value: true })
    }

    /// Toggle `actuator` if it has reported before and the latest event
    /// satisfies `filter`. Returns the command sent, if any.
    pub fn toggle_actuator_state_if(
        &self,
        filter: &Filter,
        actuator: &ActuatorRef,
    ) -> Option<ActuatorCommand> {
        if !actuator.has_sent_event {
            debug!(actuator = %actuator.id, "actuator has never reported, not toggling");
            return None;
        }
        self.actuate_if(filter, actuator, ActuatorCommand::Toggle)
    }

    fn actuate_if(
        &self,
        filter: &Filter,
        actuator: &ActuatorRef,
        command: ActuatorCommand,
    ) -> Option<ActuatorCommand> {
        if actuator.client_id != self.shared.client_id {
            debug!(
                client = %self.shared.client_id,
                owner = %actuator.client_id,
                actuator = %actuator.id,
                "actuator belongs to another client"
            );
            return None;
        }

        let matched = {
            let state = self.shared.state.lock();
            state
                .history
                .latest_event()
                .is_some_and(|event| filter.satisfies(event))
        };
        if !matched {
            return None;
        }

        info!(
            client = %self.shared.client_id,
            actuator = %actuator.id,
            endpoint = %actuator.control_endpoint(),
            ?command,
            "commanding actuator"
        );
        self.shared.control.send(actuator, command);
        Some(command)
    }

    // ------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------

    /// Receive replies to requests executed from now on
    pub fn subscribe_replies(&self) -> broadcast::Receiver<Reply> {
        self.shared.replies.subscribe()
    }

    pub(crate) fn publish(&self, reply: Reply) {
        if self.shared.replies.send(reply).is_err() {
            trace!(client = %self.shared.client_id, "reply dropped, no subscribers");
        }
    }
}
