//! Routing of inbound messages to per-client engines

use std::collections::HashMap;
use std::sync::Arc;

use cadence_core::{CadenceResult, ClientId};
use cadence_runtime::{ActuatorControl, Engine, EngineConfig};
use cadence_wire::Inbound;
use parking_lot::Mutex;
use tracing::info;

/// Maps client identities to their engines
pub struct Router {
    config: EngineConfig,
    control: Arc<dyn ActuatorControl>,
    engines: Mutex<HashMap<ClientId, Engine>>,
}

impl Router {
    pub fn new(config: EngineConfig, control: Arc<dyn ActuatorControl>) -> Self {
        Router {
            config,
            control,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Engine of `client_id`, created on first contact
    pub fn engine_for(&self, client_id: ClientId) -> CadenceResult<Engine> {
        let mut engines = self.engines.lock();
        if let Some(engine) = engines.get(&client_id) {
            return Ok(engine.clone());
        }

        let engine = Engine::new(client_id, self.config.clone(), Arc::clone(&self.control))?;
        engines.insert(client_id, engine.clone());
        info!(client = %client_id, clients = engines.len(), "client registered");
        Ok(engine)
    }

    /// Existing engine of `client_id`
    pub fn engine(&self, client_id: ClientId) -> Option<Engine> {
        self.engines.lock().get(&client_id).cloned()
    }

    /// Number of known clients
    pub fn len(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().is_empty()
    }

    /// Hand a message to its client's engine
    pub fn dispatch(&self, message: Inbound) -> CadenceResult<Engine> {
        let engine = self.engine_for(message.client_id())?;
        deliver(&engine, message)?;
        Ok(engine)
    }
}

/// Submit a decoded message to `engine`
pub fn deliver(engine: &Engine, message: Inbound) -> CadenceResult<()> {
    match message {
        Inbound::Event(record) => engine.submit_event(record.into_event()),
        Inbound::Request(record) => engine.submit_request(record.into_request()),
    }
}
