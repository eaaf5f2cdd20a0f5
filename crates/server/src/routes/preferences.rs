use axum::{
    extract::{Path, State},
    http::HeaderName,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use service::preferences::{PreferenceLookup, PreferenceRecord};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::errors::{ApiError, ValidJson, ValidQuery};
use crate::state::AppState;

pub const SKIPPED_HEADER: HeaderName = HeaderName::from_static("x-preferences-skipped");

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SavePreferencesRequest {
    pub preferences: Vec<String>,
}

/// Record as returned to clients. A user with nothing stored has neither
/// `id` nor `created_at`.
#[derive(Debug, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PreferenceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub user_id: i32,
    pub preferences: Vec<String>,
    /// RFC 3339; refreshed on every save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<PreferenceRecord> for PreferenceResponse {
    fn from(r: PreferenceRecord) -> Self {
        Self {
            id: Some(r.id),
            user_id: r.user_id,
            preferences: r.preferences,
            created_at: Some(r.created_at.to_rfc3339()),
        }
    }
}

impl From<PreferenceLookup> for PreferenceResponse {
    fn from(l: PreferenceLookup) -> Self {
        match l {
            PreferenceLookup::Found(r) => r.into(),
            PreferenceLookup::Empty { user_id } => Self { id: None, user_id, preferences: vec![], created_at: None },
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Exact element to look for.
    pub preference: Option<String>,
}

fn user_id_from_path(raw: &str, state: &AppState) -> Result<i64, ApiError> {
    models::user_preferences::parse_user_id(raw)
        .map(i64::from)
        .map_err(|e| ApiError::from_service(e.into(), "Invalid user ID").legacy(state.legacy_error_status))
}

#[utoipa::path(
    post,
    path = "/api/preferences/{user_id}",
    params(("user_id" = i32, Path, description = "Non-negative user id")),
    request_body = SavePreferencesRequest,
    responses(
        (status = 200, description = "Stored record", body = PreferenceResponse),
        (status = 400, description = "Invalid id or body", body = crate::openapi::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::openapi::ErrorResponse)
    ),
    tag = "preferences"
)]
pub async fn save_preferences(
    State(state): State<AppState>,
    Path(raw_user_id): Path<String>,
    ValidJson(body): ValidJson<SavePreferencesRequest>,
) -> Result<Json<PreferenceResponse>, ApiError> {
    let user_id = user_id_from_path(&raw_user_id, &state)?;
    let ctx = state.op_context();
    let record = state
        .preferences
        .upsert(user_id, body.preferences, &ctx)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to save preferences").legacy(state.legacy_error_status))?;
    info!(user_id = record.user_id, id = record.id, "save_preferences");
    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/api/preferences/{user_id}",
    params(("user_id" = i32, Path, description = "Non-negative user id")),
    responses(
        (status = 200, description = "Stored record, or an empty list when none exists", body = PreferenceResponse),
        (status = 400, description = "Invalid id", body = crate::openapi::ErrorResponse),
        (status = 500, description = "Stored document is corrupt", body = crate::openapi::ErrorResponse)
    ),
    tag = "preferences"
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    Path(raw_user_id): Path<String>,
) -> Result<Json<PreferenceResponse>, ApiError> {
    let user_id = user_id_from_path(&raw_user_id, &state)?;
    let ctx = state.op_context();
    let lookup = state.preferences.get(user_id, &ctx).await.map_err(|e| {
        let fallback = match e {
            service::errors::ServiceError::Deserialization(_) => "Failed to parse preferences",
            _ => "Failed to fetch preferences",
        };
        ApiError::from_service(e, fallback).legacy(state.legacy_error_status)
    })?;
    Ok(Json(lookup.into()))
}

#[utoipa::path(
    get,
    path = "/api/search/preferences",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching records by id; x-preferences-skipped counts corrupt rows left out",
            body = [PreferenceResponse]),
        (status = 400, description = "Missing term or malformed query string", body = crate::openapi::ErrorResponse)
    ),
    tag = "preferences"
)]
pub async fn search_preferences(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> Result<Response, ApiError> {
    let term = params.preference.unwrap_or_default();
    let ctx = state.op_context();
    let outcome = state
        .preferences
        .search_by_preference(&term, &ctx)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to search preferences").legacy(state.legacy_error_status))?;

    if outcome.is_partial() {
        warn!(term = %term, skipped = outcome.skipped.len(), "search returned partial results");
    }
    let skipped = outcome.skipped.len().to_string();
    let body: Vec<PreferenceResponse> = outcome.records.into_iter().map(Into::into).collect();
    Ok(([(SKIPPED_HEADER, skipped)], Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn empty_lookup_omits_id_and_timestamp() {
        let v = serde_json::to_value(PreferenceResponse::from(PreferenceLookup::Empty { user_id: 7 })).unwrap();
        assert_eq!(v, serde_json::json!({"user_id": 7, "preferences": []}));
    }

    #[test]
    fn found_record_carries_rfc3339_timestamp() {
        let created_at = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let r = PreferenceRecord { id: 1, user_id: 42, preferences: vec!["c".into()], created_at };
        let resp = PreferenceResponse::from(r);
        assert_eq!(resp.created_at.as_deref(), Some("2024-06-01T12:00:00+00:00"));
        assert_eq!(resp.id, Some(1));
    }

    #[test]
    fn request_rejects_unknown_fields() {
        assert!(serde_json::from_str::<SavePreferencesRequest>(r#"{"preferences":[],"extra":1}"#).is_err());
        assert!(serde_json::from_str::<SavePreferencesRequest>(r#"{}"#).is_err());
        assert!(serde_json::from_str::<SavePreferencesRequest>(r#"{"preferences":["a"]}"#).is_ok());
    }
}
