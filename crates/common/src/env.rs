//! Environment/runtime helpers
//!
//! Sanity checks run once at startup, before the store is opened.

use tracing::{info, warn};

/// Warn when neither a config file nor `DATABASE_URL` is available.
///
/// Returns whether any database source was found.
pub async fn check_database_source(config_path: &str) -> bool {
    let has_file = tokio::fs::metadata(config_path).await.is_ok();
    let has_env = std::env::var("DATABASE_URL").map(|v| !v.trim().is_empty()).unwrap_or(false);
    if !has_file && !has_env {
        warn!(%config_path, "no config file and DATABASE_URL unset; database settings will use defaults");
        return false;
    }
    info!(%config_path, has_file, has_env, "database source detected");
    true
}
