//! Metric reads, analysis reports and auto-optimization

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::prompt::ParamChange;
use crate::storage::config_versions::CreateOptions;
use crate::suggest::SuggestionKind;

use super::super::envelope::{ApiErrorResponse, ApiResponse};
use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Lookback window in days.
    #[serde(default = "default_range_days")]
    pub range: i64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

fn default_range_days() -> i64 {
    14
}

/// GET /metrics/recent?limit
pub async fn recent_metrics(
    State(state): State<ApiState>,
    Query(query): Query<RecentQuery>,
) -> Response {
    ApiResponse::ok(state.metrics.recent(query.limit.clamp(1, 500)).await)
}

/// GET /scorecards?range&limit — metric rows within the window.
pub async fn scorecards(
    State(state): State<ApiState>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let now = Utc::now();
    let start = now - Duration::days(query.range.max(1));
    ApiResponse::ok(
        state
            .metrics
            .in_range(start, now, query.limit.clamp(1, 500))
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_range_days")]
    pub range: i64,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            range: default_range_days(),
        }
    }
}

/// POST /analyze-renders — full analysis report.
pub async fn analyze_renders(
    State(state): State<ApiState>,
    body: Option<Json<AnalyzeRequest>>,
) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    ApiResponse::ok(state.suggestions.analyze(req.limit, req.range).await)
}

/// GET /suggestions?range — ranked top suggestions only.
pub async fn get_suggestions(
    State(state): State<ApiState>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let report = state.suggestions.analyze(query.limit, query.range).await;
    ApiResponse::ok(report.suggestions)
}

/// POST /auto-optimize — apply the top suggestion as a new active version.
///
/// The non-rollback branch records the full change list for audit.
pub async fn auto_optimize(State(state): State<ApiState>) -> Response {
    let report = state.suggestions.analyze(60, 14).await;
    let Some(top) = report.suggestions.first() else {
        return ApiErrorResponse::unprocessable(
            "no_optimization_suggestion",
            "no suggestion available from recent metrics",
        );
    };

    match top.kind {
        SuggestionKind::RollbackToConfigVersion => {
            let Some(target) = top.rollback_target.as_deref() else {
                return ApiErrorResponse::internal("rollback suggestion without target");
            };
            match state.versions.activate(target).await {
                Ok(version) => ApiResponse::ok(json!({
                    "applied": "rollback_to_config_version",
                    "version": version,
                    "suggestion": top,
                })),
                Err(e) => ApiErrorResponse::internal(e.to_string()),
            }
        }
        SuggestionKind::ParamDelta => {
            let Some(active) = state.versions.get_active() else {
                return ApiErrorResponse::not_found(
                    "algorithm_config_unavailable",
                    "no active config version",
                );
            };
            let mut params = active.params.clone();
            let mut changes: Vec<ParamChange> = Vec::new();
            for (key, delta) in &top.param_deltas {
                let Some(previous) = params.get(key) else {
                    continue;
                };
                if let Some(next) = params.set(key, previous + delta) {
                    if (next - previous).abs() > 1e-9 {
                        changes.push(ParamChange {
                            key: key.clone(),
                            previous: json!(previous),
                            next: json!(next),
                            delta: next - previous,
                            source: "auto_optimize".to_string(),
                            reason: top.title.clone(),
                        });
                    }
                }
            }
            if changes.is_empty() {
                return ApiErrorResponse::unprocessable(
                    "no_optimization_suggestion",
                    "top suggestion produced no effective change",
                );
            }
            match state
                .versions
                .create(
                    params,
                    CreateOptions {
                        preset_name: active.preset_name.clone(),
                        activate: true,
                        note: Some(format!("auto-optimize: {}", top.title)),
                        actor: Some("auto_optimize".to_string()),
                    },
                    &state.jobs,
                )
                .await
            {
                Ok(version) => ApiResponse::ok(json!({
                    "applied": "param_delta",
                    "version": version,
                    "changes": changes,
                    "suggestion": top,
                })),
                Err(e) => ApiErrorResponse::internal(format!("config_create_failed: {e}")),
            }
        }
    }
}
