//! Prompt-to-parameter endpoint

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::prompt::PromptError;
use crate::storage::config_versions::CreateOptions;

use super::super::envelope::{ApiErrorResponse, ApiResponse};
use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// POST /prompt/apply — translate operator prose into a new active version.
pub async fn prompt_apply(
    State(state): State<ApiState>,
    Json(req): Json<PromptRequest>,
) -> Response {
    if req.prompt.trim().is_empty() {
        return ApiErrorResponse::bad_request("invalid_payload", "prompt must not be empty");
    }
    let Some(active) = state.versions.get_active() else {
        return ApiErrorResponse::not_found(
            "algorithm_config_unavailable",
            "no active config version",
        );
    };

    let outcome = match state.translator.apply(&req.prompt, &active.params).await {
        Ok(outcome) => outcome,
        Err(PromptError::NotActionable) => {
            return ApiErrorResponse::unprocessable(
                "prompt_not_actionable",
                "prompt produced no parameter changes",
            );
        }
    };

    match state
        .versions
        .create(
            outcome.params.clone(),
            CreateOptions {
                preset_name: active.preset_name.clone(),
                activate: true,
                note: Some(format!("prompt ({}): {}", outcome.strategy, req.prompt)),
                actor: req.created_by,
            },
            &state.jobs,
        )
        .await
    {
        Ok(version) => ApiResponse::ok(json!({
            "strategy": outcome.strategy,
            "changes": outcome.changes,
            "warnings": outcome.warnings,
            "version": version,
        })),
        Err(e) => ApiErrorResponse::internal(format!("config_create_failed: {e}")),
    }
}
