use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::errors::{ApiError, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveCheckboxesRequest {
    #[serde(default)]
    pub challenge_id: Option<i64>,
    pub selected: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaveCheckboxesResponse {
    pub saved: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChallengeSelectionsResponse {
    pub challenge_id: i64,
    pub selected: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/save-checkboxes",
    request_body = SaveCheckboxesRequest,
    responses(
        (status = 200, description = "All options stored", body = SaveCheckboxesResponse),
        (status = 400, description = "Invalid payload or option", body = crate::openapi::ErrorResponse)
    ),
    tag = "selections"
)]
pub async fn save_checkboxes(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SaveCheckboxesRequest>,
) -> Result<Json<SaveCheckboxesResponse>, ApiError> {
    let ctx = state.op_context();
    let saved = state
        .selections
        .save(body.challenge_id, body.selected, &ctx)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to insert").legacy(state.legacy_error_status))?;
    info!(challenge_id = ?body.challenge_id, saved, "save_checkboxes");
    Ok(Json(SaveCheckboxesResponse { saved }))
}

#[utoipa::path(
    get,
    path = "/api/challenges/{challenge_id}/selections",
    params(("challenge_id" = i64, Path, description = "Challenge id")),
    responses(
        (status = 200, description = "Option names in insertion order", body = ChallengeSelectionsResponse),
        (status = 400, description = "Invalid id", body = crate::openapi::ErrorResponse)
    ),
    tag = "selections"
)]
pub async fn list_selections(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ChallengeSelectionsResponse>, ApiError> {
    let challenge_id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid challenge ID").legacy(state.legacy_error_status))?;
    let ctx = state.op_context();
    let selected = state
        .selections
        .list(challenge_id, &ctx)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to fetch selections").legacy(state.legacy_error_status))?;
    Ok(Json(ChallengeSelectionsResponse { challenge_id, selected }))
}
