//! Feedback loop endpoints

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::types::FeedbackLoopSettings;

use super::super::envelope::ApiResponse;
use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default = "default_trigger")]
    pub trigger: String,
    #[serde(default)]
    pub force_apply: bool,
}

fn default_trigger() -> String {
    "manual".to_string()
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
            force_apply: false,
        }
    }
}

/// POST /feedback-loop/run — run once; not-eligible outcomes are reported,
/// not errors.
pub async fn run_feedback_loop(
    State(state): State<ApiState>,
    body: Option<Json<RunRequest>>,
) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let report = state.feedback_loop.run(&req.trigger, req.force_apply).await;
    ApiResponse::ok(report)
}

/// GET /feedback-loop/state — settings and runtime bookkeeping.
pub async fn get_feedback_state(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.feedback_states.load().await)
}

/// POST /feedback-loop/settings — replace settings (clamped on save).
pub async fn update_feedback_settings(
    State(state): State<ApiState>,
    Json(settings): Json<FeedbackLoopSettings>,
) -> Response {
    let mut current = state.feedback_states.load().await;
    current.settings = settings;
    state.feedback_states.save(current).await;
    ApiResponse::ok(state.feedback_states.load().await)
}
