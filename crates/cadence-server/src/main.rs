//! Cadence server - accepts client connections and runs one engine per client

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Result;
use cadence_transport::{Router, TcpActuatorControl, TcpIngress};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load(config::Config::parse())?;
    logging::init(&settings.log_level, settings.log_json)?;

    info!(
        listen = %settings.listen,
        max_wait_time = settings.engine.max_wait_time,
        buffer_time = ?settings.engine.buffer_time,
        "starting cadence server"
    );

    let control = Arc::new(TcpActuatorControl::new(settings.actuator_timeout)?);
    let router = Arc::new(Router::new(settings.engine.clone(), control));
    let ingress = TcpIngress::bind(settings.listen).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let ingress_handle = tokio::spawn(ingress.run(Arc::clone(&router), shutdown_tx.subscribe()));

    shutdown_signal().await;

    // Receivers may already be gone if the ingress failed
    let _ = shutdown_tx.send(());
    ingress_handle.await?;

    info!(clients = router.len(), "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
