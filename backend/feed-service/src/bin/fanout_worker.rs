//! Fan-out worker process.
//!
//! Consumes the new-post stream and writes followers' feeds. Runs a small
//! HTTP server for `/health` and `/metrics` next to the worker loop and stops
//! both on SIGINT/SIGTERM after the task in progress finishes.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use task_queue::{RedisStreamQueue, TaskQueue};
use tokio::sync::watch;
use tracing::{error, info};

use feed_service::config::Config;
use feed_service::repository::{PgFeedStore, PgPostStore, PgSubscriptionStore};
use feed_service::services::{FanoutConfig, FanoutWorker};
use feed_service::{db, handlers, logging};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing("info,sqlx=warn");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        stream = %config.queue.stream,
        group = %config.queue.group,
        consumer = %config.queue.consumer,
        "Starting fan-out worker"
    );

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let queue: Arc<dyn TaskQueue> = Arc::new(
        RedisStreamQueue::connect(&config.redis.url, config.queue.stream_config())
            .await
            .context("Failed to connect to Redis stream queue")?,
    );

    let worker = FanoutWorker::new(
        queue,
        Arc::new(PgPostStore::new(pool.clone())),
        Arc::new(PgSubscriptionStore::new(pool.clone())),
        Arc::new(PgFeedStore::new(pool)),
        FanoutConfig {
            max_feed_len: config.feed.max_len,
            max_deliveries: config.queue.max_deliveries,
            queue_error_backoff: Duration::from_secs(1),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let ops_server = HttpServer::new(|| App::new().configure(handlers::configure_ops))
        .bind((config.app.host.clone(), config.app.worker_metrics_port))
        .context("Failed to bind worker metrics server")?
        .disable_signals()
        .workers(1)
        .run();
    let ops_handle = ops_server.handle();
    let ops_task = actix_rt::spawn(ops_server);
    info!(port = config.app.worker_metrics_port, "Worker metrics server listening");

    shutdown_signal().await;
    info!("Shutdown signal received, stopping fan-out worker");

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Fan-out worker task panicked");
    }

    ops_handle.stop(true).await;
    if let Err(e) = ops_task.await {
        error!(error = %e, "Metrics server task panicked");
    }

    info!("Fan-out worker exited");
    Ok(())
}
