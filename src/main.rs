use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use order_gateway::config::AppConfig;
use order_gateway::db;
use order_gateway::orders::notifier::{Notifier, SmtpNotifier};
use order_gateway::orders::repository::{OrderRepository, PgOrderRepository};
use order_gateway::routes;
use order_gateway::s3::build_client;
use order_gateway::state::AppState;
use order_gateway::storage::{ObjectStorage, S3Storage};

const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "gateway",
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = config.storage.as_ref().map(|s| s.s3_bucket.as_str()).unwrap_or("-"),
        storage_namespace = %config.storage_namespace,
        database_url = config.redacted_database_url().as_deref().unwrap_or("-"),
        notifier_enabled = config.smtp.is_some(),
        "loaded gateway configuration"
    );

    let storage: Option<Arc<dyn ObjectStorage>> = match &config.storage {
        Some(storage_config) => {
            let client = build_client(storage_config).await?;
            Some(Arc::new(S3Storage::new(
                client,
                storage_config.s3_bucket.clone(),
                config.storage_public_base_url.clone(),
            )))
        }
        None => {
            tracing::warn!("S3_BUCKET not set; object storage not configured");
            None
        }
    };

    let orders: Option<Arc<dyn OrderRepository>> = match &config.database {
        Some(database) => {
            let pool = db::init_pool_with_size(&database.database_url, database.max_pool_size)?;
            let migration_pool = pool.clone();
            tokio::task::spawn_blocking(move || db::run_migrations(&migration_pool))
                .await
                .context("migration task panicked")??;
            Some(Arc::new(PgOrderRepository::new(
                pool,
                database.store_files_metadata,
            )))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; order store not configured");
            None
        }
    };

    let notifier: Option<Arc<dyn Notifier>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(SmtpNotifier::new(
            smtp,
            config.storage_public_base_url.clone(),
        )?)),
        None => {
            tracing::warn!("SMTP_HOST, NOTIFY_FROM or NOTIFY_TO not set; notifier not configured");
            None
        }
    };

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(config, storage, orders, notifier);

    let limiter = state.upload_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let router = routes::create_router(state);
    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("gateway received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
