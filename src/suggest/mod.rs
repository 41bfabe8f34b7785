//! Suggestion engine
//!
//! Correlates recent render metrics with the parameters that produced them
//! and emits ranked improvement suggestions from threshold-keyed rules.
//! A synthetic rollback suggestion fires when the newest config measurably
//! underperforms its predecessor.

pub mod correlations;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::storage::{ConfigVersionStore, MetricStore};
use crate::types::{RenderQualityMetric, RetentionParams, FIELD_SPECS};

use correlations::{stdev, ParamCorrelation};

/// Prediction clamp in score points.
const PREDICTED_DELTA_CLAMP: f64 = 18.0;

/// Score-stdev floor in the prediction formula.
const SCORE_STDEV_FLOOR: f64 = 4.2;

/// Rollback rule: newest config must trail its predecessor by this many
/// points, with both sides at this many samples.
const ROLLBACK_GAP_POINTS: f64 = 2.5;
const ROLLBACK_MIN_SAMPLES: usize = 5;

/// Per-subscore failure thresholds for the summary counts.
const HOOK_FAILURE: f64 = 0.5;
const PACING_FAILURE: f64 = 0.5;
const JANK_FAILURE: f64 = 0.58;
const STORY_FAILURE: f64 = 0.52;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub sample_count: usize,
    pub avg_total: f64,
    pub score_stdev: f64,
    pub avg_hook: f64,
    pub avg_pacing: f64,
    pub avg_emotion: f64,
    pub avg_visual: f64,
    pub avg_story: f64,
    pub avg_filler: f64,
    pub avg_jank: f64,
    pub hook_failures: usize,
    pub pacing_failures: usize,
    pub jank_failures: usize,
    pub story_failures: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    ParamDelta,
    RollbackToConfigVersion,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub title: String,
    pub param_deltas: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_target: Option<String>,
    pub predicted_delta_score: f64,
    pub confidence: f64,
    pub risk: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub correlations: Vec<ParamCorrelation>,
    pub suggestions: Vec<Suggestion>,
}

pub struct SuggestionEngine {
    metrics: Arc<MetricStore>,
    versions: Arc<ConfigVersionStore>,
}

impl SuggestionEngine {
    pub fn new(metrics: Arc<MetricStore>, versions: Arc<ConfigVersionStore>) -> Self {
        Self { metrics, versions }
    }

    /// Analyze up to `limit` metrics from the last `range_days` days.
    pub async fn analyze(&self, limit: usize, range_days: i64) -> AnalysisReport {
        let now = Utc::now();
        let start = now - Duration::days(range_days.max(1));
        let rows = self.metrics.in_range(start, now, limit.clamp(1, 1000)).await;

        // Join every metric to the params of the version that produced it.
        let mut joined: Vec<(RenderQualityMetric, RetentionParams)> = Vec::new();
        for row in rows {
            if let Some(version) = self.versions.get_by_id(&row.config_version_id).await {
                joined.push((row, version.params));
            }
        }

        let summary = summarize(&joined);
        let correlations = correlate(&joined);
        let mut suggestions = rule_suggestions(&summary, &joined, &correlations);

        if let Some(rollback) = self.rollback_suggestion(&joined).await {
            suggestions.push(rollback);
        }

        rank(&mut suggestions);
        suggestions.truncate(5);

        AnalysisReport {
            summary,
            correlations,
            suggestions,
        }
    }

    /// Synthetic rollback when the most recent config underperforms the
    /// previous one by ≥2.5 points with ≥5 samples on both sides.
    async fn rollback_suggestion(
        &self,
        joined: &[(RenderQualityMetric, RetentionParams)],
    ) -> Option<Suggestion> {
        let versions = self.versions.list(10).await;
        if versions.len() < 2 {
            return None;
        }
        let newest = &versions[0];
        let previous = &versions[1];

        let scores_for = |id: &str| -> Vec<f64> {
            joined
                .iter()
                .filter(|(m, _)| m.config_version_id == id)
                .map(|(m, _)| m.score_total)
                .collect()
        };
        let newest_scores = scores_for(&newest.id);
        let previous_scores = scores_for(&previous.id);
        if newest_scores.len() < ROLLBACK_MIN_SAMPLES
            || previous_scores.len() < ROLLBACK_MIN_SAMPLES
        {
            return None;
        }
        let newest_avg = newest_scores.iter().sum::<f64>() / newest_scores.len() as f64;
        let previous_avg =
            previous_scores.iter().sum::<f64>() / previous_scores.len() as f64;
        let gap = previous_avg - newest_avg;
        if gap < ROLLBACK_GAP_POINTS {
            return None;
        }

        Some(Suggestion {
            kind: SuggestionKind::RollbackToConfigVersion,
            title: format!(
                "Roll back: current config trails the previous one by {gap:.1} points"
            ),
            param_deltas: BTreeMap::new(),
            rollback_target: Some(previous.id.clone()),
            predicted_delta_score: gap.min(PREDICTED_DELTA_CLAMP),
            confidence: 0.8,
            risk: "Reverts all parameter changes from the current version".to_string(),
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n > 0 {
        sum / n as f64
    } else {
        0.0
    }
}

fn summarize(joined: &[(RenderQualityMetric, RetentionParams)]) -> AnalysisSummary {
    let n = joined.len();
    let totals: Vec<f64> = joined.iter().map(|(m, _)| m.score_total).collect();
    AnalysisSummary {
        sample_count: n,
        avg_total: mean(totals.iter().copied()),
        score_stdev: stdev(&totals),
        avg_hook: mean(joined.iter().map(|(m, _)| m.score_hook)),
        avg_pacing: mean(joined.iter().map(|(m, _)| m.score_pacing)),
        avg_emotion: mean(joined.iter().map(|(m, _)| m.score_emotion)),
        avg_visual: mean(joined.iter().map(|(m, _)| m.score_visual)),
        avg_story: mean(joined.iter().map(|(m, _)| m.score_story)),
        avg_filler: mean(joined.iter().map(|(m, _)| m.score_filler)),
        avg_jank: mean(joined.iter().map(|(m, _)| m.score_jank)),
        hook_failures: joined.iter().filter(|(m, _)| m.score_hook < HOOK_FAILURE).count(),
        pacing_failures: joined
            .iter()
            .filter(|(m, _)| m.score_pacing < PACING_FAILURE)
            .count(),
        jank_failures: joined.iter().filter(|(m, _)| m.score_jank > JANK_FAILURE).count(),
        story_failures: joined
            .iter()
            .filter(|(m, _)| m.score_story < STORY_FAILURE)
            .count(),
    }
}

fn correlate(joined: &[(RenderQualityMetric, RetentionParams)]) -> Vec<ParamCorrelation> {
    let totals: Vec<f64> = joined.iter().map(|(m, _)| m.score_total).collect();
    let mut out = Vec::new();
    for spec in &FIELD_SPECS {
        let xs: Vec<f64> = joined
            .iter()
            .filter_map(|(_, p)| p.get(spec.key))
            .collect();
        if xs.len() != totals.len() {
            continue;
        }
        if let Some(corr) = correlations::calculate(&xs, &totals, spec.key) {
            out.push(corr);
        }
    }
    out.sort_by(|a, b| {
        b.r_value
            .abs()
            .partial_cmp(&a.r_value.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

struct Rule {
    triggered: bool,
    title: &'static str,
    risk: &'static str,
    deltas: &'static [(&'static str, f64)],
}

fn rule_suggestions(
    summary: &AnalysisSummary,
    joined: &[(RenderQualityMetric, RetentionParams)],
    correlations: &[ParamCorrelation],
) -> Vec<Suggestion> {
    if summary.sample_count == 0 {
        return Vec::new();
    }

    let rules = [
        Rule {
            triggered: summary.avg_hook < 0.57,
            title: "Strengthen the opening hook",
            risk: "Faster opening may clip context from the first seconds",
            deltas: &[("hook_priority_weight", 0.15), ("pattern_interrupt_every_sec", -2.0)],
        },
        Rule {
            triggered: summary.avg_pacing < 0.50,
            title: "Tighten overall pacing",
            risk: "More cuts can raise perceived jank on noisy footage",
            deltas: &[("cut_aggression", 6.0), ("pacing_multiplier", 0.08)],
        },
        Rule {
            triggered: summary.avg_jank > 0.58,
            title: "Smooth out jank",
            risk: "Softer cutting trades a little pace for smoothness",
            deltas: &[
                ("jank_guard", 8.0),
                ("cut_aggression", -5.0),
                ("crossfade_ms", 60.0),
            ],
        },
        Rule {
            triggered: summary.avg_story < 0.52,
            title: "Protect narrative continuity",
            risk: "Keeping more context segments lengthens the edit",
            deltas: &[("story_coherence_guard", 9.0), ("cut_aggression", -4.0)],
        },
        Rule {
            triggered: summary.avg_filler > 0.60,
            title: "Cut filler and dead air harder",
            risk: "Aggressive filler removal can clip word starts",
            deltas: &[("filler_removal_aggression", 10.0), ("silence_min_ms", -40.0)],
        },
        Rule {
            triggered: summary.avg_emotion < 0.48,
            title: "Lift energy and emotional emphasis",
            risk: "Emphasis changes shift subtitle and cut styling",
            deltas: &[("emotion_emphasis", 0.12), ("energy_emphasis", 0.10)],
        },
    ];

    let corr_by_param: BTreeMap<&str, f64> = correlations
        .iter()
        .map(|c| (c.param.as_str(), c.r_value))
        .collect();
    let score_stdev = summary.score_stdev.max(SCORE_STDEV_FLOOR);

    let mut suggestions = Vec::new();
    for rule in rules.into_iter().filter(|r| r.triggered) {
        let mut predicted = 0.0;
        let mut used_corrs: Vec<f64> = Vec::new();
        for (key, delta) in rule.deltas {
            let corr = corr_by_param.get(key).copied().unwrap_or(0.0);
            if corr != 0.0 {
                used_corrs.push(corr.abs());
            }
            let xs: Vec<f64> = joined.iter().filter_map(|(_, p)| p.get(key)).collect();
            let x_std = stdev(&xs).max(1e-6);
            predicted += corr * delta.signum() * (delta.abs() / x_std) * score_stdev * 0.72;
        }
        let predicted =
            predicted.clamp(-PREDICTED_DELTA_CLAMP, PREDICTED_DELTA_CLAMP);

        let corr_strength = mean(used_corrs.iter().copied());
        let confidence = (0.3
            + 0.4 * corr_strength
            + 0.3 * (summary.sample_count as f64 / 40.0).min(1.0))
        .clamp(0.0, 1.0);

        suggestions.push(Suggestion {
            kind: SuggestionKind::ParamDelta,
            title: rule.title.to_string(),
            param_deltas: rule
                .deltas
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
            rollback_target: None,
            predicted_delta_score: predicted,
            confidence,
            risk: rule.risk.to_string(),
        });
    }
    suggestions
}

/// Rank: predicted delta desc, confidence desc, shortest risk text first.
fn rank(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| {
        b.predicted_delta_score
            .partial_cmp(&a.predicted_delta_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.risk.len().cmp(&b.risk.len()))
    });
}
