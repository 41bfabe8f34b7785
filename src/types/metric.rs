//! Render quality metric rows (append-only)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::{RenderFeatures, ScoreFlags, Subscores};

/// One scored render, linked to the config version that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderQualityMetric {
    pub id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub config_version_id: String,
    pub score_total: f64,
    pub score_hook: f64,
    pub score_pacing: f64,
    pub score_emotion: f64,
    pub score_visual: f64,
    pub score_story: f64,
    pub score_filler: f64,
    pub score_jank: f64,
    pub features: RenderFeatures,
    pub flags: ScoreFlags,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl RenderQualityMetric {
    /// Build a row from an evaluation, rounding subscores to 4 decimals.
    pub fn from_report(
        job_id: String,
        user_id: Option<String>,
        config_version_id: String,
        score_total: f64,
        subscores: Subscores,
        features: RenderFeatures,
        flags: ScoreFlags,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id,
            user_id,
            created_at: Utc::now(),
            config_version_id,
            score_total: round4(score_total),
            score_hook: round4(subscores.hook),
            score_pacing: round4(subscores.pacing),
            score_emotion: round4(subscores.energy),
            score_visual: round4(subscores.variety),
            score_story: round4(subscores.story),
            score_filler: round4(subscores.filler),
            score_jank: round4(subscores.jank),
            features,
            flags,
        }
    }
}
