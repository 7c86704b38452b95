//! Outbox relay entry point.

use std::error::Error;
use std::sync::Arc;

use outbox_core::clock::SystemClock;
use outbox_relay::config::RelayConfig;
use outbox_relay::dispatcher::Dispatcher;
use outbox_relay::http;
use outbox_relay::metrics::RelayMetrics;
use outbox_relay::nats::NatsPublisher;
use outbox_store::PgOutboxStore;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _telemetry = outbox_telemetry::init_tracing("outbox-relay")?;

    let config = RelayConfig::from_env()?;
    tracing::info!(
        topic = %config.topic,
        partitions = config.partitions.get(),
        batch_size = config.batch_size,
        "Starting outbox relay"
    );

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Connect to the bus and make sure the topic's stream exists.
    let publisher = NatsPublisher::connect(&config.nats_url, config.partitions).await?;
    publisher
        .ensure_stream(&config.topic, config.stream_replicas)
        .await?;

    let metrics = RelayMetrics::new()?;
    let dispatcher = Dispatcher::new(
        Arc::new(PgOutboxStore::new(pool, Arc::new(SystemClock))),
        Arc::new(publisher),
        metrics.clone(),
        config.dispatcher_settings(),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Start the scrape endpoint.
    let listener = TcpListener::bind(config.metrics_addr).await?;
    tracing::info!("Metrics listening on {}", config.metrics_addr);
    let app = http::router(metrics).layer(TraceLayer::new_for_http());
    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        }
    });

    dispatcher.run(shutdown.clone()).await;
    server.await??;

    Ok(())
}

/// Cancels `token` on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
    token.cancel();
}
