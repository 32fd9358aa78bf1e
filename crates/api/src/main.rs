//! API server entry point.

use event_store::InMemoryEventStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = api::config::Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = api::create_default_state(InMemoryEventStore::new(), &config);
    state.projection_processor.run_catch_up().await?;

    // Delivers queued saga calls for the life of the process.
    let coordinator = state.coordinator.clone();
    let runtime = tokio::spawn(async move { coordinator.run().await });

    let app = api::create_app(state.clone(), metrics_handle);

    let addr = config.addr();
    tracing::info!(
        %addr,
        orchestrator = %config.orchestrator,
        owner = %config.owner,
        required_gas = ?config.hop_costs.worst_case(),
        "starting API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.abort();
    let pending = state.coordinator.pending();
    if pending > 0 {
        tracing::warn!(pending, "shutting down with undelivered saga calls");
    }
    tracing::info!("server shut down gracefully");
    Ok(())
}
