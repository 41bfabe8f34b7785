//! Experiment lifecycle and allocation preview endpoints

use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::experiment::{AllocError, StartRequest};

use super::super::envelope::{ApiErrorResponse, ApiResponse};
use super::ApiState;

fn alloc_error_response(err: AllocError) -> Response {
    match err {
        AllocError::ArmCount => ApiErrorResponse::bad_request(
            "experiment_requires_2_to_4_valid_arms",
            "experiments need between 2 and 4 arms",
        ),
        AllocError::InvalidConfigVersion(id) => ApiErrorResponse::bad_request(
            &format!("invalid_config_version:{id}"),
            format!("arm references unknown config version {id}"),
        ),
        AllocError::NoExperiment => {
            ApiErrorResponse::not_found("no_experiment", "no experiment exists")
        }
        AllocError::NoActiveConfig => ApiErrorResponse::not_found(
            "algorithm_config_unavailable",
            "no active config version",
        ),
        AllocError::Store(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// POST /experiment/start
pub async fn start_experiment(
    State(state): State<ApiState>,
    Json(req): Json<StartRequest>,
) -> Response {
    match state.allocator.start(req).await {
        Ok(experiment) => ApiResponse::ok(experiment),
        Err(e) => alloc_error_response(e),
    }
}

/// POST /experiment/stop
pub async fn stop_experiment(State(state): State<ApiState>) -> Response {
    match state.allocator.stop().await {
        Ok(experiment) => ApiResponse::ok(experiment),
        Err(e) => alloc_error_response(e),
    }
}

/// GET /experiment/status — per-arm aggregates and a suggested winner.
pub async fn experiment_status(State(state): State<ApiState>) -> Response {
    match state.allocator.status().await {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => alloc_error_response(e),
    }
}

/// GET /config-selector — preview the allocator decision for a new job.
pub async fn config_selector(State(state): State<ApiState>) -> Response {
    let mut rng = state.rng.lock().await;
    match state.allocator.select_for_new_job(&mut rng).await {
        Ok(selection) => ApiResponse::ok(selection),
        Err(e) => alloc_error_response(e),
    }
}
