//! External render job rows
//!
//! Jobs are owned by the upstream pipeline; this system reads them and
//! updates `config_version_id` on active jobs when a new version activates.

use serde::{Deserialize, Serialize};

use super::feedback::RetentionFeedback;

/// Pipeline job states this system cares about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Uploading,
    Analyzing,
    Rendering,
    Completed,
    Failed,
}

impl JobStatus {
    /// States that re-point to a newly activated config version.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Uploading | Self::Analyzing | Self::Rendering
        )
    }
}

/// Render settings subset read by this system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    #[serde(
        skip_serializing_if = "Option::is_none",
        alias = "algorithmConfigVersionId"
    )]
    pub algorithm_config_version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "editorMode")]
    pub editor_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// One pipeline job row (the fields this system reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none", alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub analysis: serde_json::Value,
    #[serde(default)]
    pub transcript: Option<serde_json::Value>,
    #[serde(default, alias = "cutList")]
    pub cut_list: Option<serde_json::Value>,
    #[serde(default, alias = "renderSettings")]
    pub render_settings: RenderSettings,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "retentionFeedback"
    )]
    pub retention_feedback: Option<RetentionFeedback>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "retentionScore")]
    pub retention_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "configVersionId")]
    pub config_version_id: Option<String>,
}
