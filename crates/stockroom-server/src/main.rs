//! Stockroom Server - Main entry point

use anyhow::Result;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use stockroom_common::logging::{init_logging, LogConfig};
use tokio::{signal, sync::watch};
use tracing::{info, warn};

use stockroom_server::{
    api,
    config::Config,
    db::{self, DbConfig},
    features::FeatureState,
    imports::{
        ImportJobRepository, ImportWorker, PgImportJobRepository, PgJobQueue,
        RequiredColumnsImporter, StaleJobSweeper, WorkerSettings,
    },
    storage::UploadStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("stockroom-server")
        .filter_directives("stockroom_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting Stockroom Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&DbConfig::from(&config.database)).await?;
    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    let repository: Arc<dyn ImportJobRepository> = Arc::new(PgImportJobRepository::new(db_pool.clone()));
    let queue = Arc::new(PgJobQueue::new(db_pool.clone()));
    let storage = UploadStorage::new(config.imports.upload_dir.clone());
    info!(upload_dir = %storage.root().display(), "Upload storage initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();

    if config.imports.worker_enabled {
        let worker = ImportWorker::new(
            repository.clone(),
            queue.clone(),
            storage.clone(),
            Arc::new(RequiredColumnsImporter),
            WorkerSettings::from(&config.imports),
        );
        background.push(worker.start(shutdown_rx.clone()));

        let sweeper = StaleJobSweeper::new(
            repository.clone(),
            config.imports.stale_job_timeout(),
            config.imports.stale_sweep_interval(),
        );
        background.push(sweeper.start(shutdown_rx.clone()));
    } else {
        info!("Import worker is disabled (IMPORT_WORKER_ENABLED=false)");
    }

    let feature_state = FeatureState {
        repository,
        queue,
        storage,
        max_upload_bytes: config.imports.max_upload_bytes,
    };

    let app = api::create_router(db_pool, feature_state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    for handle in background {
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!("Background task did not stop within the shutdown timeout");
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
