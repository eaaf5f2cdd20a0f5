use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::db::{connect_with_config, DatabaseConfig};




static MIGRATED: OnceCell<bool> = OnceCell::const_new();

fn test_config() -> DatabaseConfig {
    let mut cfg = DatabaseConfig::from_env();
    cfg.connect_retries = 0;
    cfg.connect_timeout = Duration::from_secs(3);
    cfg.acquire_timeout = Duration::from_secs(10);
    cfg.min_connections = 1;
    cfg
}

/// Connect and migrate once per process; `None` means "skip this test".
pub(crate) async fn setup_test_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return None;
    }
    let migrated = *MIGRATED
        .get_or_init(|| async {
            let db = match connect_with_config(&test_config()).await {
                Ok(db) => db,
                Err(e) => {
                    eprintln!("skip: cannot connect to db: {}", e);
                    return false;
                }
            };
            if let Err(e) = migration::Migrator::up(&db, None).await {
                eprintln!("skip: migrate up failed: {}", e);
                return false;
            }
            true
        })
        .await;
    if !migrated {
        return None;
    }
    // fresh pool bound to the calling test's runtime
    connect_with_config(&test_config()).await.ok()
}

/// Random id so repeated runs against the same database do not collide.
pub(crate) fn fresh_id() -> i32 {
    (uuid::Uuid::new_v4().as_u128() % (i32::MAX as u128)) as i32
}
