//! Config version and preset endpoints

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::presets;
use crate::storage::config_versions::CreateOptions;
use crate::storage::StoreError;
use crate::types::RetentionParams;

use super::super::envelope::{ApiErrorResponse, ApiResponse};
use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    20
}

/// GET /config — the active config version.
pub async fn get_config(State(state): State<ApiState>) -> Response {
    match state.versions.get_active() {
        Some(version) => ApiResponse::ok(version),
        None => ApiErrorResponse::not_found(
            "algorithm_config_unavailable",
            "no active config version",
        ),
    }
}

/// GET /config/versions?limit — recent versions, newest first.
pub async fn list_versions(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Response {
    ApiResponse::ok(state.versions.list(query.limit).await)
}

#[derive(Debug, Deserialize)]
pub struct CreateConfigRequest {
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub preset_name: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// POST /config — create a version, optionally activating it.
pub async fn create_config(
    State(state): State<ApiState>,
    Json(req): Json<CreateConfigRequest>,
) -> Response {
    let params = match RetentionParams::parse(&req.params) {
        Ok(p) => p,
        Err(e) => return ApiErrorResponse::bad_request("invalid_payload", e.to_string()),
    };
    match state
        .versions
        .create(
            params,
            CreateOptions {
                preset_name: req.preset_name,
                activate: req.activate,
                note: req.note,
                actor: req.created_by,
            },
            &state.jobs,
        )
        .await
    {
        Ok(version) => ApiResponse::ok(version),
        Err(e) => ApiErrorResponse::internal(format!("config_create_failed: {e}")),
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub id: String,
}

/// POST /config/activate — activate a version by id.
pub async fn activate_config(
    State(state): State<ApiState>,
    Json(req): Json<ActivateRequest>,
) -> Response {
    match state.versions.activate(&req.id).await {
        Ok(version) => ApiResponse::ok(version),
        Err(StoreError::ConfigNotFound) => {
            ApiErrorResponse::not_found("config_not_found", format!("unknown id {}", req.id))
        }
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// POST /config/rollback — activate the most recent non-active version.
pub async fn rollback_config(State(state): State<ApiState>) -> Response {
    match state.versions.rollback().await {
        Ok(Some(version)) => ApiResponse::ok(version),
        Ok(None) => ApiErrorResponse::unprocessable(
            "rollback_unavailable",
            "no previous version to roll back to",
        ),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyPresetRequest {
    pub preset: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// POST /preset/apply — materialize a preset as a new active version.
pub async fn apply_preset(
    State(state): State<ApiState>,
    Json(req): Json<ApplyPresetRequest>,
) -> Response {
    let Some(preset) = presets::get(&req.preset) else {
        return ApiErrorResponse::bad_request(
            "invalid_payload",
            format!("unknown preset '{}'", req.preset),
        );
    };
    match state
        .versions
        .create(
            preset.params.clone(),
            CreateOptions {
                preset_name: Some(preset.key.to_string()),
                activate: true,
                note: Some(format!("preset {} applied", preset.key)),
                actor: req.created_by,
            },
            &state.jobs,
        )
        .await
    {
        Ok(version) => ApiResponse::ok(version),
        Err(e) => ApiErrorResponse::internal(format!("config_create_failed: {e}")),
    }
}

/// GET /presets — the six named bundles.
pub async fn list_presets() -> Response {
    ApiResponse::ok(presets::all())
}
