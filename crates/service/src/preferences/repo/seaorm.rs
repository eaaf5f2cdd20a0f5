use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};

use models::user_preferences;

use crate::context::OpContext;
use crate::errors::ServiceError;
use crate::preferences::domain::StoredDocument;
use crate::preferences::repository::PreferenceRepository;

/// Postgres-backed store: unique `user_id` + `ON CONFLICT` upsert, GIN containment search.
#[derive(Clone)]
pub struct SeaOrmPreferenceRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmPreferenceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceRepository for SeaOrmPreferenceRepository {
    async fn upsert(
        &self,
        user_id: i32,
        document: serde_json::Value,
        ctx: &OpContext,
    ) -> Result<StoredDocument, ServiceError> {
        // a cancelled statement drops `txn` uncommitted, which rolls it back
        let (txn, row) = ctx
            .run(async {
                let txn = self.db.begin().await.map_err(ServiceError::store)?;
                let row = user_preferences::upsert(&txn, user_id, document).await?;
                Ok((txn, row))
            })
            .await?;
        // commit is not raced against the deadline: its result is the write's result
        txn.commit().await.map_err(ServiceError::store)?;
        Ok(row.into())
    }

    async fn find(&self, user_id: i32) -> Result<Option<StoredDocument>, ServiceError> {
        Ok(user_preferences::find_by_user(&self.db, user_id).await?.map(Into::into))
    }

    async fn search(&self, term: &str) -> Result<Vec<StoredDocument>, ServiceError> {
        let rows = user_preferences::search_containing(&self.db, term).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, user_id: i32) -> Result<u64, ServiceError> {
        Ok(user_preferences::count_for_user(&self.db, user_id).await?)
    }
}
