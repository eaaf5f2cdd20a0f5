use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::{AppConfig, StoreKind};
use migration::{Migrator, MigratorTrait};
use service::preferences::repo::seaorm::SeaOrmPreferenceRepository;
use service::runtime;
use service::selections::SeaOrmSelectionRepository;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

/// Open the configured store and wrap it in handler state.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let state = match cfg.server.store {
        StoreKind::Memory => {
            warn!(event = "store_selected", store = "memory", "data is kept in process memory only");
            AppState::in_memory()
        }
        StoreKind::Postgres => {
            let db_cfg = models::db::DatabaseConfig::from(&cfg.database);
            let db = runtime::connect_store(&db_cfg)
                .await
                .map_err(|e| StartupError::Store(e.to_string()))?;
            Migrator::up(&db, None)
                .await
                .map_err(|e| StartupError::Store(format!("migrations: {e}")))?;
            info!(event = "store_selected", store = "postgres", "migrations applied");
            AppState::from_repos(
                Arc::new(SeaOrmPreferenceRepository::new(db.clone())),
                Arc::new(SeaOrmSelectionRepository::new(db)),
            )
        }
    };
    Ok(state
        .with_request_timeout_ms(cfg.server.request_timeout_ms)
        .with_legacy_error_status(cfg.server.legacy_error_status))
}

/// Serve `app` until `shutdown` fires, then drain in-flight requests.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Public entry: open the store described by `cfg` and run the HTTP server.
/// The caller has already loaded the config and installed logging.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let has_db_source = cfg.server.store != StoreKind::Postgres
        || common::env::check_database_source(&configs::config_path()).await;

    let state = build_state(&cfg).await.map_err(|e| match e {
        StartupError::Store(msg) if !has_db_source => {
            StartupError::Store(format!("{msg} (no config file and DATABASE_URL unset)"))
        }
        other => other,
    })?;
    let shutdown = state.shutdown.clone();
    let app = routes::build_router(state, build_cors());

    let addr = bind_addr(&cfg)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, store = ?cfg.server.store, legacy_error_status = cfg.server.legacy_error_status, "starting server");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    serve(listener, app, shutdown).await?;
    info!("server stopped");
    Ok(())
}
