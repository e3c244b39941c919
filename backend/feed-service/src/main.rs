use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use task_queue::{RedisStreamQueue, TaskQueue};
use tracing::info;

use feed_service::config::Config;
use feed_service::handlers::{self, AppState};
use feed_service::metrics::MetricsMiddleware;
use feed_service::repository::{PgFeedStore, PgPostStore, PgSubscriptionStore, PgUserStore};
use feed_service::{db, logging};

#[actix_web::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing("info,actix_web=info,sqlx=warn");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(env = %config.app.env, port = config.app.http_port, "Starting feed-service API");

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if config.database.run_migrations {
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let queue: Arc<dyn TaskQueue> = Arc::new(
        RedisStreamQueue::connect(&config.redis.url, config.queue.stream_config())
            .await
            .context("Failed to connect to Redis stream queue")?,
    );

    let state = web::Data::new(AppState::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgPostStore::new(pool.clone())),
        Arc::new(PgSubscriptionStore::new(pool.clone())),
        Arc::new(PgFeedStore::new(pool)),
        queue,
    ));

    let bind_addr = (config.app.host.clone(), config.app.http_port);
    info!(host = %bind_addr.0, port = bind_addr.1, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(MetricsMiddleware)
            .configure(handlers::configure)
            .default_service(web::route().to(handlers::unknown_method))
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("feed-service API stopped");
    Ok(())
}
