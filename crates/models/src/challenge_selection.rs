use chrono::Utc;
use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

pub const MAX_OPTION_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge_selections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub challenge_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub option_name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_option(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::Validation("option name required".into()));
    }
    if name.len() > MAX_OPTION_LEN {
        return Err(ModelError::Validation(format!("option name longer than {MAX_OPTION_LEN} bytes")));
    }
    Ok(())
}

/// Insert one row per option with a single multi-row statement.
pub async fn insert_many<C: ConnectionTrait>(
    db: &C,
    challenge_id: Option<i32>,
    options: &[String],
) -> Result<u64, ModelError> {
    for o in options {
        validate_option(o)?;
    }
    if options.is_empty() {
        return Ok(0);
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let rows = options.iter().map(|o| ActiveModel {
        challenge_id: Set(challenge_id),
        option_name: Set(o.clone()),
        created_at: Set(now),
        ..Default::default()
    });
    Entity::insert_many(rows)
        .exec(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))?;
    Ok(options.len() as u64)
}

pub async fn list_by_challenge<C: ConnectionTrait>(db: &C, challenge_id: i32) -> Result<Vec<Model>, ModelError> {
    Entity::find()
        .filter(Column::ChallengeId.eq(challenge_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}
