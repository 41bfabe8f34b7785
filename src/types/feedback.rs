//! Feedback loop state, production feedback signals and brain snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operator-tunable settings for the feedback loop. All writes clamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedbackLoopSettings {
    pub enabled: bool,
    pub auto_apply: bool,
    pub min_samples: u32,
    pub lookback_limit: u32,
    pub cooldown_minutes: u32,
    pub min_confidence: f64,
    pub min_delta_score: f64,
}

impl Default for FeedbackLoopSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_apply: true,
            min_samples: 8,
            lookback_limit: 120,
            cooldown_minutes: 180,
            min_confidence: 0.55,
            min_delta_score: 0.6,
        }
    }
}

impl FeedbackLoopSettings {
    /// Clamp every field to its documented range in place.
    pub fn clamp(&mut self) {
        self.min_samples = self.min_samples.clamp(3, 64);
        self.lookback_limit = self.lookback_limit.clamp(10, 400);
        self.cooldown_minutes = self.cooldown_minutes.clamp(5, 1440);
        self.min_confidence = self.min_confidence.clamp(0.0, 1.0);
        self.min_delta_score = self.min_delta_score.clamp(0.0, 12.0);
    }
}

/// Runtime bookkeeping, updated on every run regardless of apply outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackLoopRuntime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_config_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_delta: Option<f64>,
}

/// The singleton feedback loop row, keyed by the literal `"global"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackLoopState {
    pub settings: FeedbackLoopSettings,
    pub runtime: FeedbackLoopRuntime,
}

/// Production feedback bundle attached to a completed job. Percent-style
/// values above 1 are treated as percentages (divided by 100) on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionFeedback {
    #[serde(skip_serializing_if = "Option::is_none", alias = "watchPct")]
    pub watch_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "hookHoldPct")]
    pub hook_hold_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "completionPct")]
    pub completion_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "sharesPerView")]
    pub shares_per_view: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "likesPerView")]
    pub likes_per_view: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "commentsPerView")]
    pub comments_per_view: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "manualScore")]
    pub manual_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "first30Retention")]
    pub first30_retention: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "modelRetention")]
    pub model_retention: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Aggregate view of recent outcomes plus the loop's recommendation package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainSnapshot {
    pub sample_size: usize,
    pub avg_outcome: f64,
    pub platform_feedback_share: f64,
    pub per_editor_mode: BTreeMap<String, f64>,
    pub per_strategy: BTreeMap<String, f64>,
    pub per_platform: BTreeMap<String, f64>,
    pub top_mode_margin: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_mode: Option<String>,
    pub proposed_deltas: BTreeMap<String, f64>,
    pub confidence: f64,
    pub predicted_delta_score: f64,
}

/// Outcome of one feedback loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRunReport {
    pub trigger: String,
    pub applied: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<BrainSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_config_version_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_clamp_to_documented_ranges() {
        let mut s = FeedbackLoopSettings {
            enabled: true,
            auto_apply: false,
            min_samples: 1000,
            lookback_limit: 1,
            cooldown_minutes: 0,
            min_confidence: 3.0,
            min_delta_score: -4.0,
        };
        s.clamp();
        assert_eq!(s.min_samples, 64);
        assert_eq!(s.lookback_limit, 10);
        assert_eq!(s.cooldown_minutes, 5);
        assert_eq!(s.min_confidence, 1.0);
        assert_eq!(s.min_delta_score, 0.0);
    }
}
