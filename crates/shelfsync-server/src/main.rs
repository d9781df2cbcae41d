mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use shelfsync_scraper::RetailerClient;
use shelfsync_sync::{PgCatalogStore, SyncEngine, SyncLimits};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::SyncRunner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = shelfsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shelfsync_db::PoolConfig::from_app_config(&config);
    let pool = shelfsync_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = shelfsync_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations complete");

    let allowlist = config
        .regions_path
        .as_deref()
        .map(shelfsync_core::load_region_allowlist)
        .transpose()?;

    let engine = Arc::new(SyncEngine::new(
        RetailerClient::from_app_config(&config)?,
        PgCatalogStore::new(pool.clone()),
        SyncLimits::from_app_config(&config),
    ));

    let shutdown = CancellationToken::new();
    let runner = SyncRunner::new(Arc::clone(&engine), allowlist, shutdown.clone());
    let mut scheduler =
        scheduler::build_scheduler(runner.clone(), &config.sync_cron, config.sync_on_startup)
            .await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        shelfsync_core::Environment::Development
    ))?;
    let state = AppState {
        pool,
        engine,
        runner,
        shutdown: shutdown.clone(),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown failed");
    }
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM, cancelling in-flight sync work first.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    shutdown.cancel();
}
