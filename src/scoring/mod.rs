//! Retention scoring engine
//!
//! Pure evaluation of one render: loose payloads are normalized, every
//! segment gets a signal vector and a keep/drop decision, and seven
//! subscores fold into a total retention score in [0,100]. No clock, no RNG
//! — two calls with equal inputs produce equal outputs.

pub mod decision;
pub mod normalize;

use serde_json::Value;

use crate::types::analysis::NormalizedInputs;
use crate::types::params::RetentionParams;
use crate::types::scoring::{
    RenderFeatures, ScoreReport, SegmentDecision, Subscores,
};

use decision::{decide, predicted_jank, segment_signals, window_mean};

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
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

/// Evaluate one render against a parameter set.
pub fn evaluate(
    analysis: &Value,
    transcript: Option<&Value>,
    cut_list: Option<&Value>,
    params: &RetentionParams,
) -> ScoreReport {
    let inputs = normalize::normalize(analysis, transcript, cut_list);
    let signals = segment_signals(&inputs, params);
    let (decisions, flags, _initial_jank) = decide(&inputs, signals, params);

    // Jank is measured against the final decision set, after any safety lift.
    let final_jank = predicted_jank(&inputs, &decisions);

    let features = build_features(&inputs, &decisions);
    let subscores = subscores(&inputs, &decisions, &features, final_jank, params);
    let score_total = total_score(&subscores, params);

    ScoreReport {
        score_total,
        subscores,
        features,
        flags,
        decisions,
    }
}

fn build_features(
    inputs: &NormalizedInputs,
    decisions: &[SegmentDecision],
) -> RenderFeatures {
    let duration = inputs.duration_sec;
    let seg_count = decisions.len().max(1) as f64;

    let energy_mean = mean(decisions.iter().map(|d| d.signal.energy));
    let energy_variance = mean(
        decisions
            .iter()
            .map(|d| (d.signal.energy - energy_mean).powi(2)),
    );

    let spikes = inputs
        .windows
        .iter()
        .filter(|w| w.score >= 0.75)
        .count() as f64;
    let spike_density = spikes / (duration / 60.0).max(1.0 / 60.0);

    let flat_segment_seconds = decisions
        .iter()
        .filter(|d| d.signal.energy < 0.35)
        .map(|d| d.signal.duration)
        .sum::<f64>();

    let hook_time_to_payoff_sec = inputs
        .windows
        .iter()
        .filter(|w| w.score >= 0.7)
        .map(|w| w.start)
        .fold(f64::INFINITY, f64::min);
    let hook_time_to_payoff_sec = if hook_time_to_payoff_sec.is_finite() {
        hook_time_to_payoff_sec.max(0.0)
    } else {
        duration.min(12.0)
    };

    let best_moment_first_8s = inputs
        .windows
        .iter()
        .filter(|w| w.start < 8.0 && w.end > 0.0)
        .map(|w| w.score)
        .fold(0.0_f64, f64::max);

    RenderFeatures {
        duration_sec: duration,
        silence_ratio: inputs.silence_ratio,
        filler_rate: mean(decisions.iter().map(|d| d.signal.filler)),
        avg_shot_len_sec: duration / seg_count,
        cut_rate_per_min: seg_count / duration * 60.0,
        redundancy: mean(decisions.iter().map(|d| d.signal.redundancy)),
        energy_mean,
        energy_variance,
        spike_density,
        flat_segment_seconds,
        jump_cut_severity: inputs.jump_cut_severity,
        audio_discontinuity_count: inputs.audio_discontinuity_count,
        caption_desync_count: inputs.caption_desync_count,
        hook_time_to_payoff_sec,
        best_moment_first_8s,
        segment_signals: decisions.iter().map(|d| d.signal.clone()).collect(),
        missing_signals: inputs.missing_signals.clone(),
    }
}

fn subscores(
    inputs: &NormalizedInputs,
    decisions: &[SegmentDecision],
    features: &RenderFeatures,
    final_jank: f64,
    params: &RetentionParams,
) -> Subscores {
    // Hook: early engagement, the best early moment, and time-to-payoff.
    let early_engagement = window_mean(inputs, 0.0, 8.0_f64.min(features.duration_sec));
    let hook = clamp01(
        0.46 * early_engagement
            + 0.24 * features.best_moment_first_8s
            + 0.30 * (1.0 - features.hook_time_to_payoff_sec / 8.0).max(0.0),
    );

    // Pacing: fit of observed cut rate to the parameterized target.
    let target_cuts_per_min =
        (60.0 / params.pattern_interrupt_every_sec) * params.pacing_multiplier;
    let cut_rate_fit = 1.0
        - clamp01((features.cut_rate_per_min - target_cuts_per_min).abs() / target_cuts_per_min);
    let flat_share = clamp01(features.flat_segment_seconds / features.duration_sec);
    let pacing = clamp01(
        0.50 * cut_rate_fit
            + 0.30 * (1.0 - flat_share)
            + 0.20 * clamp01(features.spike_density / 3.0),
    );

    let energy = clamp01(
        0.70 * features.energy_mean * params.energy_emphasis.min(1.4)
            + 0.30 * clamp01(features.energy_variance * 4.0),
    );

    let novelty_mean = mean(decisions.iter().map(|d| d.signal.novelty));
    let span_mean = mean(decisions.iter().map(|d| d.signal.duration));
    let span_var = mean(
        decisions
            .iter()
            .map(|d| (d.signal.duration - span_mean).powi(2)),
    );
    let shot_variety = if span_mean > 0.0 {
        clamp01(span_var.sqrt() / span_mean)
    } else {
        0.0
    };
    let variety = clamp01(0.55 * novelty_mean + 0.45 * shot_variety);

    let context_total = decisions
        .iter()
        .filter(|d| d.signal.is_context_segment)
        .count();
    let context_kept = decisions
        .iter()
        .filter(|d| d.signal.is_context_segment && d.keep_recommendation)
        .count();
    let context_kept_ratio = if context_total > 0 {
        context_kept as f64 / context_total as f64
    } else {
        1.0
    };
    let continuity_mean = mean(decisions.iter().map(|d| d.signal.continuity_risk));
    let story = clamp01(0.60 * context_kept_ratio + 0.40 * (1.0 - continuity_mean));

    let filler = clamp01(
        0.62 * clamp01(features.filler_rate * 1.6) + 0.38 * features.silence_ratio,
    );

    let jank = clamp01(
        0.50 * clamp01(final_jank)
            + 0.30 * features.jump_cut_severity
            + 0.20 * clamp01(f64::from(features.audio_discontinuity_count) / 8.0),
    );

    Subscores {
        hook,
        pacing,
        energy,
        variety,
        story,
        filler,
        jank,
    }
}

fn total_score(s: &Subscores, params: &RetentionParams) -> f64 {
    let w = params.scoring_weights();
    let raw = w.hook * s.hook + w.pacing * s.pacing + w.energy * s.energy
        + w.variety * s.variety
        + w.story * s.story
        - w.filler * s.filler
        - w.jank * s.jank;
    (100.0 * sigmoid(raw)).clamp(0.0, 100.0)
}
