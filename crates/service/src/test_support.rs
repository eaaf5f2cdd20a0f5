#![cfg(test)]
use migration::MigratorTrait;
use models::db::{connect_with_config, DatabaseConfig};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::OnceCell;

// Migrations run at most once per test process; `false` means the database is unreachable.
static MIGRATED: OnceCell<bool> = OnceCell::const_new();

fn test_config() -> DatabaseConfig {
    let mut cfg = DatabaseConfig::from_file().unwrap_or_else(|_| DatabaseConfig::from_env());
    cfg.max_connections = cfg.max_connections.max(20);
    cfg.min_connections = cfg.min_connections.min(1);
    cfg.acquire_timeout = Duration::from_secs(10);
    cfg.connect_timeout = Duration::from_secs(3);
    cfg.connect_retries = 0;
    cfg
}

/// Fresh pool on the calling test's runtime, or `None` when Postgres tests are skipped.
pub async fn get_db() -> Result<Option<DatabaseConnection>, anyhow::Error> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(None);
    }
    let ready = *MIGRATED
        .get_or_init(|| async {
            let Ok(db) = connect_with_config(&test_config()).await else {
                eprintln!("skip: postgres not reachable");
                return false;
            };
            match migration::Migrator::up(&db, None).await {
                Ok(()) => true,
                Err(e) => {
                    eprintln!("skip: migrate up failed: {e}");
                    false
                }
            }
        })
        .await;
    if !ready {
        return Ok(None);
    }
    Ok(Some(connect_with_config(&test_config()).await?))
}

pub fn fresh_id() -> i32 {
    (uuid::Uuid::new_v4().as_u128() % (i32::MAX as u128)) as i32
}
