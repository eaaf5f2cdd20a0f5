//! Checkbox submissions recorded per challenge.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use models::challenge_selection;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, instrument, warn};

use crate::context::OpContext;
use crate::errors::ServiceError;
use crate::metrics;

#[async_trait]
pub trait SelectionRepository: Send + Sync {
    /// Store every option or none of them. `Cancelled` means none were stored.
    async fn save(&self, challenge_id: Option<i32>, options: &[String], ctx: &OpContext) -> Result<u64, ServiceError>;
    /// Option names for `challenge_id` in insertion order.
    async fn list(&self, challenge_id: i32) -> Result<Vec<String>, ServiceError>;
}

pub struct SeaOrmSelectionRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmSelectionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SelectionRepository for SeaOrmSelectionRepository {
    async fn save(&self, challenge_id: Option<i32>, options: &[String], ctx: &OpContext) -> Result<u64, ServiceError> {
        let (txn, saved) = ctx
            .run(async {
                let txn = self.db.begin().await.map_err(ServiceError::store)?;
                let saved = challenge_selection::insert_many(&txn, challenge_id, options).await?;
                Ok((txn, saved))
            })
            .await?;
        txn.commit().await.map_err(ServiceError::store)?;
        Ok(saved)
    }

    async fn list(&self, challenge_id: i32) -> Result<Vec<String>, ServiceError> {
        let rows = challenge_selection::list_by_challenge(&self.db, challenge_id).await?;
        Ok(rows.into_iter().map(|r| r.option_name).collect())
    }
}

#[derive(Default)]
pub struct MemorySelectionRepository {
    rows: Mutex<Vec<(Option<i32>, String)>>,
}

impl MemorySelectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SelectionRepository for MemorySelectionRepository {
    async fn save(&self, challenge_id: Option<i32>, options: &[String], ctx: &OpContext) -> Result<u64, ServiceError> {
        for o in options {
            challenge_selection::validate_option(o)?;
        }
        ctx.check()?;
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        rows.extend(options.iter().map(|o| (challenge_id, o.clone())));
        Ok(options.len() as u64)
    }

    async fn list(&self, challenge_id: i32) -> Result<Vec<String>, ServiceError> {
        let rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        Ok(rows
            .iter()
            .filter(|(c, _)| *c == Some(challenge_id))
            .map(|(_, o)| o.clone())
            .collect())
    }
}

pub type DynSelectionService = SelectionService<dyn SelectionRepository>;

pub struct SelectionService<R: SelectionRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: SelectionRepository + ?Sized> SelectionService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, selected, ctx), fields(count = selected.len()))]
    pub async fn save(
        &self,
        challenge_id: Option<i64>,
        selected: Vec<String>,
        ctx: &OpContext,
    ) -> Result<u64, ServiceError> {
        let result = async {
            let challenge_id = challenge_id.map(validate_challenge_id).transpose()?;
            self.repo.save(challenge_id, &selected, ctx).await
        }
        .await;
        match &result {
            Ok(n) => info!(event = "selections_saved", saved = n, "checkbox selections stored"),
            Err(e) => {
                metrics::record_error("save_selections", e);
                warn!(event = "selections_save_failed", error = %e);
            }
        }
        result
    }

    pub async fn list(&self, challenge_id: i64, ctx: &OpContext) -> Result<Vec<String>, ServiceError> {
        let challenge_id = validate_challenge_id(challenge_id)?;
        let result = ctx.run(self.repo.list(challenge_id)).await;
        if let Err(e) = &result {
            metrics::record_error("list_selections", e);
        }
        result
    }
}

fn validate_challenge_id(n: i64) -> Result<i32, ServiceError> {
    i32::try_from(n)
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| ServiceError::Validation("Invalid challenge ID".into()))
}
