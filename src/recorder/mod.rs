//! Render-metric recorder
//!
//! After each completed render: resolve the config version that produced the
//! job, evaluate the scoring engine against the job's payloads, and persist
//! one metric row. Persistence failures degrade to the metric ring — the
//! caller always receives the scored payload.

use std::sync::Arc;

use thiserror::Error;

use crate::scoring;
use crate::storage::{ConfigVersionStore, MetricStore};
use crate::types::{ConfigVersion, RenderJob, RenderQualityMetric};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("algorithm_config_unavailable")]
    ConfigUnavailable,
}

pub struct Recorder {
    versions: Arc<ConfigVersionStore>,
    metrics: Arc<MetricStore>,
}

impl Recorder {
    pub fn new(versions: Arc<ConfigVersionStore>, metrics: Arc<MetricStore>) -> Self {
        Self { versions, metrics }
    }

    /// Score one job and persist the resulting metric row.
    pub async fn record(&self, job: &RenderJob) -> Result<RenderQualityMetric, RecordError> {
        let version = self.resolve_version(job).await?;

        let report = scoring::evaluate(
            &job.analysis,
            job.transcript.as_ref(),
            job.cut_list.as_ref(),
            &version.params,
        );

        let metric = RenderQualityMetric::from_report(
            job.id.clone(),
            job.user_id.clone(),
            version.id.clone(),
            report.score_total,
            report.subscores,
            report.features,
            report.flags,
        );

        self.metrics.insert(metric.clone()).await;
        tracing::info!(
            job = %job.id,
            config = %version.id,
            score = metric.score_total,
            "render metric recorded"
        );
        Ok(metric)
    }

    /// Resolution order: job row → render settings → analysis payload →
    /// active version. Candidates that do not resolve to a stored version
    /// fall through to the next.
    async fn resolve_version(&self, job: &RenderJob) -> Result<ConfigVersion, RecordError> {
        let analysis_id = job
            .analysis
            .get("algorithm_config_version_id")
            .or_else(|| job.analysis.get("algorithmConfigVersionId"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let candidates = [
            job.config_version_id.clone(),
            job.render_settings.algorithm_config_version_id.clone(),
            analysis_id,
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(version) = self.versions.get_by_id(&candidate).await {
                return Ok(version);
            }
            tracing::warn!(id = %candidate, job = %job.id, "job references unknown config version");
        }
        self.versions
            .get_active()
            .ok_or(RecordError::ConfigUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config_versions::CreateOptions;
    use crate::storage::{JobStore, Store};
    use crate::types::{JobStatus, RetentionParams};
    use serde_json::json;

    async fn setup() -> (Recorder, Arc<ConfigVersionStore>, Arc<JobStore>, Arc<MetricStore>) {
        let store = Store::in_memory();
        let versions = Arc::new(ConfigVersionStore::open(&store));
        let jobs = Arc::new(JobStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        versions.ensure_default(&jobs).await.unwrap();
        (
            Recorder::new(versions.clone(), metrics.clone()),
            versions,
            jobs,
            metrics,
        )
    }

    fn job(id: &str, config_version_id: Option<String>) -> RenderJob {
        RenderJob {
            id: id.to_string(),
            status: JobStatus::Completed,
            user_id: Some("u1".to_string()),
            analysis: json!({
                "duration": 42.0,
                "silence_ratio": 0.13,
                "engagement_windows": [
                    {"start": 0.0, "end": 10.0, "score": 0.8},
                    {"start": 10.0, "end": 42.0, "score": 0.55}
                ]
            }),
            transcript: Some(json!("so this is what happened earlier today")),
            cut_list: None,
            render_settings: Default::default(),
            retention_feedback: None,
            retention_score: None,
            config_version_id,
        }
    }

    #[tokio::test]
    async fn records_against_explicit_version() {
        let (recorder, versions, jobs, metrics) = setup().await;
        let pinned = versions
            .create(RetentionParams::default(), CreateOptions::default(), &jobs)
            .await
            .unwrap();
        let metric = recorder
            .record(&job("j1", Some(pinned.id.clone())))
            .await
            .unwrap();
        assert_eq!(metric.config_version_id, pinned.id);
        assert!(metric.score_total >= 0.0 && metric.score_total <= 100.0);
        assert_eq!(metrics.recent(10).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_version_falls_back_to_active() {
        let (recorder, versions, _jobs, _metrics) = setup().await;
        let active = versions.get_active().unwrap();
        let metric = recorder
            .record(&job("j2", Some("stale-id".to_string())))
            .await
            .unwrap();
        assert_eq!(metric.config_version_id, active.id);
    }

    #[tokio::test]
    async fn analysis_payload_version_id_respected() {
        let (recorder, versions, jobs, _metrics) = setup().await;
        let pinned = versions
            .create(RetentionParams::default(), CreateOptions::default(), &jobs)
            .await
            .unwrap();
        let mut j = job("j3", None);
        j.analysis["algorithm_config_version_id"] = json!(pinned.id);
        let metric = recorder.record(&j).await.unwrap();
        assert_eq!(metric.config_version_id, pinned.id);
    }
}
