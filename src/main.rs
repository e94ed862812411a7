use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast;

use telemetry_spool::config::Settings;
use telemetry_spool::queue::{QueueConfig, QueueFacade};
use telemetry_spool::server::{self, AppState};
use telemetry_spool::shutdown::GracefulShutdown;
use telemetry_spool::tasks::StatusReporter;
use telemetry_spool::telemetry::init_telemetry;
use telemetry_spool::transport::{create_transport, BackoffConfig, ConnectionMonitor, LinkHealth};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let settings = Arc::new(Settings::new()?);

    // Initialize tracing
    let _telemetry_guard = init_telemetry(&settings.log, &settings.otel)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Configuration loaded");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (events_tx, _) = broadcast::channel(16);

    // Queue and transport
    let transport = create_transport(&settings.transport);
    let queue_config = QueueConfig::from_settings(&settings.queue)
        .with_publish_timeout(settings.transport.publish_timeout());
    let queue = Arc::new(QueueFacade::new(queue_config, transport.clone()));

    let mut tasks = Vec::new();

    // Subscribe before the monitor can emit its first event
    tasks.push(queue.register(events_tx.subscribe(), shutdown_tx.subscribe()));

    let link_health = Arc::new(LinkHealth::new());
    let monitor = ConnectionMonitor::new(
        transport.clone(),
        link_health.clone(),
        events_tx.clone(),
        Duration::from_millis(settings.transport.probe_interval_ms),
        BackoffConfig::from_transport(&settings.transport),
        shutdown_tx.subscribe(),
    )
    .with_probe_timeout(settings.transport.probe_timeout());
    tasks.push(tokio::spawn(monitor.run()));

    if settings.producer.enabled {
        let reporter = StatusReporter::new(
            settings.producer.clone(),
            queue.clone(),
            start_time,
            shutdown_tx.subscribe(),
        );
        tasks.push(tokio::spawn(reporter.run()));
    }

    if settings.server.enabled {
        let state = AppState::new(
            settings.clone(),
            queue.clone(),
            link_health.clone(),
            transport.kind(),
            start_time,
        );
        let addr = settings.server_addr();
        let server_shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server::serve(state, &addr, server_shutdown).await {
                tracing::error!(error = %e, "Status API failed");
            }
        }));
    }

    tracing::info!(
        transport = %transport.kind(),
        store_path = %settings.queue.store_path,
        "Telemetry spool running"
    );

    let reason = wait_for_signal().await;

    let result = GracefulShutdown::new(queue, shutdown_tx)
        .execute(reason, tasks)
        .await;
    if !result.success {
        tracing::warn!("Shutdown did not complete cleanly");
    }

    tracing::info!("Telemetry spool stopped");
    Ok(())
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            "ctrl_c"
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
            "terminate"
        }
    }
}
