//! `user_preferences` entity and the JSONB document codec.
//!
//! The preference list is stored as a JSON array of strings. Order and
//! duplicates are kept exactly as submitted.

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict, SimpleExpr};
use sea_orm::{entity::prelude::*, ConnectionTrait, IntoSimpleExpr, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_preferences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub preferences: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Parse a user id taken from a URL segment.
pub fn parse_user_id(raw: &str) -> Result<i32, ModelError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ModelError::Validation("User ID is required".into()));
    }
    let n: i64 = raw.parse().map_err(|_| ModelError::Validation("Invalid user ID".into()))?;
    validate_user_id(n)
}

/// User ids are non-negative and must fit the INTEGER column.
pub fn validate_user_id(n: i64) -> Result<i32, ModelError> {
    if n < 0 {
        return Err(ModelError::Validation("Invalid user ID: must be non-negative".into()));
    }
    i32::try_from(n).map_err(|_| ModelError::Validation("Invalid user ID: out of range".into()))
}

pub fn encode_preferences(preferences: &[String]) -> Result<Json, ModelError> {
    serde_json::to_value(preferences).map_err(|e| ModelError::Encode(e.to_string()))
}

/// Anything other than an array of strings is a corrupt document.
pub fn decode_preferences(doc: &Json) -> Result<Vec<String>, ModelError> {
    Vec::<String>::deserialize(doc).map_err(|e| ModelError::Decode(e.to_string()))
}

/// Insert-or-replace keyed on `user_id`.
///
/// On conflict only `preferences` and `created_at` are rewritten, so the
/// surrogate `id` survives every later upsert.
pub async fn upsert<C: ConnectionTrait>(db: &C, user_id: i32, doc: Json) -> Result<Model, ModelError> {
    let am = ActiveModel {
        user_id: Set(user_id),
        preferences: Set(doc),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    let on_conflict = OnConflict::column(Column::UserId)
        .update_columns([Column::Preferences, Column::CreatedAt])
        .to_owned();
    Entity::insert(am)
        .on_conflict(on_conflict)
        .exec_with_returning(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}

pub async fn find_by_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Option<Model>, ModelError> {
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}

/// Rows whose document contains `term` as an element, by `id` ascending.
///
/// `preferences @> '["term"]'::jsonb` is served by the GIN index.
pub async fn search_containing<C: ConnectionTrait>(db: &C, term: &str) -> Result<Vec<Model>, ModelError> {
    let needle = serde_json::json!([term]);
    Entity::find()
        .filter(Expr::cust_with_exprs(
            "$1 @> $2::jsonb",
            [Column::Preferences.into_simple_expr(), SimpleExpr::Value(needle.into())],
        ))
        .order_by_asc(Column::Id)
        .all(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}

pub async fn count_for_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<u64, ModelError> {
    use sea_orm::PaginatorTrait;
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .count(db)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))
}
