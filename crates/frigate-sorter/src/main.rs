//! Frigate sorter: keeps an MQTT connection to the broker Frigate
//! publishes to and routes `frigate/events` and `frigate/config` to their
//! handlers.

use tracing_subscriber::EnvFilter;

use frigate_mqtt::{ConnectionManager, EnvSnapshot};
use frigate_protocol::topics;
use frigate_sorter::config::SorterConfig;
use frigate_sorter::router::{self, HandlerRegistry, Router};
use frigate_sorter::subscriptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "frigate-sorter starting"
    );

    // ── Load config ─────────────────────────────────────────────
    let env = EnvSnapshot::capture();
    let config_path = std::env::args().nth(1);
    let config = SorterConfig::load(config_path.as_deref(), &env)?;

    // ── Credentials ─────────────────────────────────────────────
    let credentials = frigate_mqtt::resolve_from_process();
    tracing::info!(
        source = ?credentials.source,
        username = %credentials.username,
        "MQTT credentials resolved"
    );

    // ── Router ──────────────────────────────────────────────────
    let (connection, inbound) = ConnectionManager::new(config.mqtt.clone(), credentials);
    let router = Router::new(HandlerRegistry::with_defaults());
    let router_task = tokio::spawn(router::run(inbound, router));

    // ── Managed connection + subscriptions ──────────────────────
    if let Err(e) = connection.start().await {
        tracing::error!(error = %e, "error connecting to MQTT server, retrying in background");
    }
    subscriptions::subscribe(&connection, &topics::SUBSCRIPTIONS).await;
    tracing::info!("MQTT client started");

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    // ── Shutdown: stop the connection, then drain the router ────
    connection.stop().await;
    drop(connection);

    match tokio::time::timeout(config.drain_timeout(), router_task).await {
        Ok(Ok(stats)) => tracing::debug!(?stats, "router drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "router task failed"),
        Err(_) => tracing::warn!(
            timeout_secs = config.drain_timeout_secs,
            "router did not drain in time, abandoning in-flight message"
        ),
    }

    tracing::info!("frigate-sorter stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
