//! Scoring engine output types
//!
//! Everything [`crate::scoring::evaluate`] produces: per-segment signals and
//! decisions, derived render features, flags, subscores and the total score.

use serde::{Deserialize, Serialize};

/// Per-segment signal vector. All channels in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSignal {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub energy: f64,
    pub info_density: f64,
    pub novelty: f64,
    pub emotion: f64,
    pub filler: f64,
    pub redundancy: f64,
    pub continuity_risk: f64,
    pub context_loss_risk: f64,
    pub audio_jank_risk: f64,
    pub is_context_segment: bool,
}

/// A segment signal plus the keep/drop verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDecision {
    #[serde(flatten)]
    pub signal: SegmentSignal,
    pub value_score: f64,
    pub risk_score: f64,
    pub keep_probability: f64,
    pub keep_recommendation: bool,
    pub reasons: Vec<String>,
}

/// Derived features for one render. Not stored independently of a metric row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderFeatures {
    pub duration_sec: f64,
    pub silence_ratio: f64,
    pub filler_rate: f64,
    pub avg_shot_len_sec: f64,
    pub cut_rate_per_min: f64,
    pub redundancy: f64,
    pub energy_mean: f64,
    pub energy_variance: f64,
    pub spike_density: f64,
    pub flat_segment_seconds: f64,
    pub jump_cut_severity: f64,
    pub audio_discontinuity_count: u32,
    pub caption_desync_count: u32,
    pub hook_time_to_payoff_sec: f64,
    pub best_moment_first_8s: f64,
    pub segment_signals: Vec<SegmentSignal>,
    pub missing_signals: Vec<String>,
}

/// Global flags raised during evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreFlags {
    pub micro_crossfade_required: bool,
    pub auto_safety_adjusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_cut_aggression: Option<f64>,
}

/// The seven retention subscores, each in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Subscores {
    pub hook: f64,
    pub pacing: f64,
    pub energy: f64,
    pub variety: f64,
    pub story: f64,
    pub filler: f64,
    pub jank: f64,
}

/// Full evaluation report for one render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score_total: f64,
    pub subscores: Subscores,
    pub features: RenderFeatures,
    pub flags: ScoreFlags,
    pub decisions: Vec<SegmentDecision>,
}
