//! Runtime helpers for the binary and server crates.

use sea_orm::DatabaseConnection;
use tracing::info;

/// Connect with the configured pool settings and verify the link.
pub async fn connect_store(cfg: &models::db::DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let db = models::db::connect_with_config(cfg).await?;
    models::db::ping(&db).await?;
    info!(event = "store_ready", max_connections = cfg.max_connections, "postgres store connected");
    Ok(db)
}
