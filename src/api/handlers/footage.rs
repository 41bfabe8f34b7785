//! Sample footage inspection and dry-run scoring

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::scoring;
use crate::types::{RenderJob, RetentionParams};

use super::super::envelope::{ApiErrorResponse, ApiResponse};
use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct FootageQuery {
    #[serde(default = "default_footage_limit")]
    pub limit: usize,
}

fn default_footage_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct FootageSummary {
    pub id: String,
    pub status: crate::types::JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub has_feedback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version_id: Option<String>,
}

fn summarize(job: &RenderJob) -> FootageSummary {
    FootageSummary {
        id: job.id.clone(),
        status: job.status,
        user_id: job.user_id.clone(),
        has_feedback: job.retention_feedback.is_some(),
        retention_score: job.retention_score,
        config_version_id: job.config_version_id.clone(),
    }
}

/// GET /sample-footage?limit — recent jobs, newest first.
pub async fn list_sample_footage(
    State(state): State<ApiState>,
    Query(query): Query<FootageQuery>,
) -> Response {
    let jobs = state.jobs.recent(query.limit.clamp(1, 100)).await;
    ApiResponse::ok(jobs.iter().map(summarize).collect::<Vec<_>>())
}

#[derive(Debug, Deserialize)]
pub struct FootageTestRequest {
    pub job_id: String,
    /// Optional parameter override; defaults to the active version.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

/// POST /sample-footage/test — score a real job without persisting a metric.
pub async fn test_sample_footage(
    State(state): State<ApiState>,
    Json(req): Json<FootageTestRequest>,
) -> Response {
    let Some(job) = state.jobs.get(&req.job_id).await else {
        return ApiErrorResponse::not_found(
            "job_not_found",
            format!("unknown job {}", req.job_id),
        );
    };

    let (params, config_version_id) = match req.params {
        Some(raw) => match RetentionParams::parse(&raw) {
            Ok(p) => (p, None),
            Err(e) => {
                return ApiErrorResponse::bad_request("invalid_payload", e.to_string())
            }
        },
        None => match state.versions.get_active() {
            Some(version) => (version.params, Some(version.id)),
            None => {
                return ApiErrorResponse::not_found(
                    "algorithm_config_unavailable",
                    "no active config version",
                );
            }
        },
    };

    let report = scoring::evaluate(
        &job.analysis,
        job.transcript.as_ref(),
        job.cut_list.as_ref(),
        &params,
    );

    ApiResponse::ok(json!({
        "job_id": job.id,
        "config_version_id": config_version_id,
        "score_total": report.score_total,
        "subscores": report.subscores,
        "flags": report.flags,
        "features": report.features,
        "decisions": report.decisions,
    }))
}
