//! Actuator control over TCP
//!
//! Each command opens a transient connection to the actuator's control
//! endpoint, writes one control line and closes. Failures are logged and
//! dropped; nothing is retried.

use std::time::Duration;

use cadence_core::{ActuatorCommand, ActuatorRef, CadenceError, CadenceResult};
use cadence_runtime::ActuatorControl;
use cadence_wire::encode_actuator_control;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Default bound on connecting to an actuator
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivers actuator commands over TCP from background tasks
#[derive(Clone, Debug)]
pub struct TcpActuatorControl {
    connect_timeout: Duration,
    runtime: Handle,
}

impl TcpActuatorControl {
    /// Must be called from within a Tokio runtime
    pub fn new(connect_timeout: Duration) -> CadenceResult<Self> {
        let runtime = Handle::try_current().map_err(|_| CadenceError::RuntimeUnavailable)?;
        Ok(TcpActuatorControl {
            connect_timeout,
            runtime,
        })
    }
}

impl ActuatorControl for TcpActuatorControl {
    fn send(&self, actuator: &ActuatorRef, command: ActuatorCommand) {
        let line = match encode_actuator_control(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(actuator = %actuator.id, error = %e, "failed to encode actuator command");
                return;
            }
        };

        let endpoint = actuator.control_endpoint();
        let actuator_id = actuator.id;
        let connect_timeout = self.connect_timeout;
        self.runtime.spawn(async move {
            match send_line(&endpoint, &line, connect_timeout).await {
                Ok(()) => {
                    debug!(actuator = %actuator_id, %endpoint, "actuator command delivered")
                }
                Err(e) => warn!(
                    actuator = %actuator_id,
                    %endpoint,
                    error = %e,
                    "actuator command not delivered"
                ),
            }
        });
    }
}

/// Connect to `endpoint`, write `line` and close
pub(crate) async fn send_line(
    endpoint: &str,
    line: &str,
    connect_timeout: Duration,
) -> CadenceResult<()> {
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| CadenceError::ConnectionFailed)?
        .map_err(|e| CadenceError::TransportError(e.to_string()))?;

    stream
        .write_all(format!("{line}\n").as_bytes())
        .await
        .map_err(|e| CadenceError::TransportError(e.to_string()))?;
    stream
        .shutdown()
        .await
        .map_err(|e| CadenceError::TransportError(e.to_string()))?;
    Ok(())
}
