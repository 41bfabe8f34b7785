//! Per-segment signals and keep/drop decisions
//!
//! Deterministic, rule-based segment scoring. Each segment gets a signal
//! vector derived from engagement-window overlap and transcript text, then a
//! value/risk trade-off produces a keep probability through a logistic
//! squash. Policy overrides and a single safety-adjustment retry pass run on
//! top.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::analysis::{NormalizedInputs, SegmentSpan, TranscriptCue};
use crate::types::params::RetentionParams;
use crate::types::scoring::{ScoreFlags, SegmentDecision, SegmentSignal};

/// Referential words that make a segment load-bearing for narrative
/// continuity.
const CONTEXT_TERMS: &str =
    r"(?i)\b(this|that|these|those|because|means|definition|context|earlier|before|after|therefore|which)\b";

/// Single-word fillers.
const FILLER_WORDS: [&str; 14] = [
    "um", "uh", "uhm", "er", "ah", "like", "literally", "basically", "actually",
    "honestly", "anyway", "okay", "well", "just",
];

/// Two-word filler phrases.
const FILLER_PHRASES: [&str; 2] = ["you know", "i mean"];

fn context_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(CONTEXT_TERMS).unwrap()
    })
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Overlap length of `[a0,a1]` and `[b0,b1]` in seconds.
fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    (a1.min(b1) - a0.max(b0)).max(0.0)
}

/// Overlap-weighted mean of engagement-window scores over a span.
/// No overlap → neutral 0.5.
pub fn window_mean(inputs: &NormalizedInputs, start: f64, end: f64) -> f64 {
    let mut weight = 0.0;
    let mut sum = 0.0;
    for w in &inputs.windows {
        let ov = overlap(start, end, w.start, w.end);
        if ov > 0.0 {
            weight += ov;
            sum += ov * w.score;
        }
    }
    if weight > 0.0 {
        sum / weight
    } else {
        0.5
    }
}

/// Concatenated text of all cues overlapping a span.
fn segment_text(cues: &[TranscriptCue], start: f64, end: f64) -> String {
    let mut parts = Vec::new();
    for cue in cues {
        if overlap(start, end, cue.start, cue.end) > 0.0 {
            parts.push(cue.text.trim());
        }
    }
    parts.join(" ")
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Filler word count: fixed single-word set plus two-word phrases.
fn filler_count(word_list: &[String]) -> usize {
    let mut count = word_list
        .iter()
        .filter(|w| FILLER_WORDS.contains(&w.as_str()))
        .count();
    for pair in word_list.windows(2) {
        let phrase = format!("{} {}", pair[0], pair[1]);
        if FILLER_PHRASES.contains(&phrase.as_str()) {
            count += 1;
        }
    }
    count
}

/// Share of bigrams that repeat within the text.
fn bigram_repeat_share(word_list: &[String]) -> f64 {
    if word_list.len() < 3 {
        return 0.0;
    }
    let mut seen = std::collections::HashSet::new();
    let mut repeats = 0usize;
    let total = word_list.len() - 1;
    for pair in word_list.windows(2) {
        let bigram = format!("{} {}", pair[0], pair[1]);
        if !seen.insert(bigram) {
            repeats += 1;
        }
    }
    repeats as f64 / total as f64
}

/// Compute the signal vector for every segment.
pub fn segment_signals(inputs: &NormalizedInputs, params: &RetentionParams) -> Vec<SegmentSignal> {
    let global_mean = window_mean(inputs, 0.0, inputs.duration_sec);
    let mut signals = Vec::with_capacity(inputs.segments.len());
    let mut prev_energy: Option<f64> = None;

    for span in &inputs.segments {
        signals.push(segment_signal(inputs, params, span, global_mean, prev_energy));
        prev_energy = signals.last().map(|s| s.energy);
    }
    signals
}

fn segment_signal(
    inputs: &NormalizedInputs,
    params: &RetentionParams,
    span: &SegmentSpan,
    global_mean: f64,
    prev_energy: Option<f64>,
) -> SegmentSignal {
    let duration = span.duration();
    let energy = window_mean(inputs, span.start, span.end);

    let text = segment_text(&inputs.cues, span.start, span.end);
    let word_list = words(&text);
    let word_count = word_list.len();
    let words_per_sec = if duration > 0.0 {
        word_count as f64 / duration
    } else {
        0.0
    };

    let info_density = clamp01(words_per_sec / 4.2);

    let filler_share = if word_count > 0 {
        filler_count(&word_list) as f64 / word_count as f64
    } else {
        0.0
    };
    let filler = clamp01(filler_share * (1.2 + params.filler_removal_aggression / 50.0));

    let bigram_share = bigram_repeat_share(&word_list);
    let redundancy = clamp01(bigram_share * (1.0 + params.redundancy_trim_aggression / 40.0));

    let novelty = clamp01(
        0.55 * (1.0 - redundancy)
            + 0.45 * clamp01((energy - prev_energy.unwrap_or(energy)).abs() * 2.0),
    );

    let exclaim_density = if word_count > 0 {
        text.matches('!').count() as f64 / word_count as f64
    } else {
        0.0
    };
    let spike = if energy >= global_mean + 0.18 { 1.0 } else { 0.0 };
    let emotion = clamp01(
        (0.5 * energy + 0.3 * clamp01(exclaim_density * 4.0) + 0.2 * spike)
            * params.emotion_emphasis,
    );

    let speed = span.speed.unwrap_or(1.0);
    let mut continuity_risk = 0.12;
    if duration < 0.45 {
        continuity_risk += 0.38;
    }
    if speed > 1.28 {
        continuity_risk += 0.26;
    }
    continuity_risk += 0.24 * (energy - emotion).abs();
    let continuity_risk = clamp01(continuity_risk);

    let is_context_segment = context_regex().is_match(&text);
    let context_loss_risk = if is_context_segment {
        0.72
    } else {
        clamp01(0.16 + 0.3 * info_density + 0.2 * (span.start / inputs.duration_sec))
    };

    let speech = clamp01(words_per_sec / 3.6);
    let mut audio_jank_risk = 0.1;
    if duration < 0.3 {
        audio_jank_risk += 0.34;
    }
    audio_jank_risk += 0.3 * clamp01((speech - 0.5).abs() * 2.0);
    audio_jank_risk +=
        0.2 * clamp01(f64::from(inputs.audio_discontinuity_count) / 6.0);
    let audio_jank_risk = clamp01(audio_jank_risk);

    SegmentSignal {
        start: span.start,
        end: span.end,
        duration,
        energy,
        info_density,
        novelty,
        emotion,
        filler,
        redundancy,
        continuity_risk,
        context_loss_risk,
        audio_jank_risk,
        is_context_segment,
    }
}

/// Decide keep/drop for every segment and run the safety-adjustment pass.
///
/// Returns the decisions plus the global flags raised while deciding.
pub fn decide(
    inputs: &NormalizedInputs,
    signals: Vec<SegmentSignal>,
    params: &RetentionParams,
) -> (Vec<SegmentDecision>, ScoreFlags, f64) {
    let w = params.segment_weights();
    let context_scale = 0.6 + params.story_coherence_guard / 100.0 * 1.6;
    let threshold = -0.85 + (params.cut_aggression / 100.0) * 1.7;
    let lambda = 0.7 + (params.jank_guard / 100.0) * 1.4;

    let mut flags = ScoreFlags::default();
    let mut decisions: Vec<SegmentDecision> = Vec::with_capacity(signals.len());

    for signal in signals {
        // Hook-priority boost for segments opening in the first 8 seconds.
        let energy_weight = if signal.start < 8.0 {
            (w.energy * params.hook_priority_weight).clamp(0.2, 3.5)
        } else {
            w.energy
        };

        let value_score = energy_weight * signal.energy
            + w.info_density * signal.info_density
            + w.novelty * signal.novelty
            + w.emotion * signal.emotion
            - w.filler * signal.filler
            - w.redundancy * signal.redundancy;

        let risk_score = w.continuity * signal.continuity_risk
            + w.context * (signal.context_loss_risk * context_scale)
            + w.audio_jank * signal.audio_jank_risk;

        let mut keep_probability = sigmoid(value_score - lambda * risk_score - threshold);
        let mut reasons = Vec::new();

        let duration_ms = signal.duration * 1000.0;
        if duration_ms < params.min_clip_len_ms && keep_probability < 0.72 {
            keep_probability = 0.72;
            reasons.push("forced_keep_min_clip".to_string());
        }
        if duration_ms > params.max_clip_len_ms && keep_probability > 0.46 {
            keep_probability = 0.46;
            reasons.push("long_clip_cap".to_string());
        }
        if params.story_coherence_guard >= 70.0
            && signal.is_context_segment
            && keep_probability < 0.63
        {
            keep_probability = 0.63;
            reasons.push("context_floor".to_string());
        }
        if signal.audio_jank_risk > 0.78 {
            if keep_probability < 0.58 {
                keep_probability = 0.58;
                reasons.push("audio_jank_floor".to_string());
            }
            flags.micro_crossfade_required = true;
        }

        decisions.push(SegmentDecision {
            signal,
            value_score,
            risk_score,
            keep_probability,
            keep_recommendation: keep_probability >= 0.5,
            reasons,
        });
    }

    let predicted_jank = predicted_jank(inputs, &decisions);
    let safety_threshold = 0.58 - (params.jank_guard / 100.0) * 0.25;

    if predicted_jank > safety_threshold {
        // Single retry pass: lift low-confidence drops, weighted by how much
        // of their score is risk-driven.
        for d in &mut decisions {
            if !d.keep_recommendation
                && d.keep_probability >= 0.38
                && d.keep_probability < 0.5
            {
                let risk_weight = (d.risk_score / 2.0).clamp(0.35, 0.95);
                d.keep_probability += (0.52 - d.keep_probability) * risk_weight;
                d.keep_probability = clamp01(d.keep_probability);
                d.keep_recommendation = d.keep_probability >= 0.5;
                d.reasons.push("auto_safety_jank_adjust".to_string());
            }
        }
        flags.auto_safety_adjusted = true;
        flags.safety_reason = Some("predicted_jank_exceeded_threshold".to_string());
        flags.adjusted_cut_aggression = Some(params.cut_aggression * 0.88);
    }

    (decisions, flags, predicted_jank)
}

/// Predicted output jank from the current decision set.
pub fn predicted_jank(inputs: &NormalizedInputs, decisions: &[SegmentDecision]) -> f64 {
    let segments = decisions.len().max(1) as f64;
    let dropped: Vec<&SegmentDecision> =
        decisions.iter().filter(|d| !d.keep_recommendation).collect();
    let dropped_risk_mean = if dropped.is_empty() {
        0.0
    } else {
        dropped.iter().map(|d| d.risk_score).sum::<f64>() / dropped.len() as f64
    };
    0.44 * inputs.jump_cut_severity
        + 0.26 * (f64::from(inputs.audio_discontinuity_count) / segments)
        + 0.30 * dropped_risk_mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::normalize::normalize;
    use serde_json::json;

    fn inputs_with(analysis: serde_json::Value, transcript: Option<serde_json::Value>) -> NormalizedInputs {
        normalize(&analysis, transcript.as_ref(), None)
    }

    #[test]
    fn filler_counting_matches_fixed_set() {
        let w = words("um so like you know this is uh basically fine");
        // um, like, uh, basically + phrase "you know" (so/this/is/fine not in set)
        assert_eq!(filler_count(&w), 5);
    }

    #[test]
    fn bigram_repeats_detected() {
        let w = words("the cat sat the cat sat again");
        let share = bigram_repeat_share(&w);
        assert!(share > 0.0, "repeat share {share}");
    }

    #[test]
    fn context_regex_flags_referential_text() {
        assert!(context_regex().is_match("because of this we act"));
        assert!(context_regex().is_match("Therefore it follows"));
        assert!(!context_regex().is_match("pure action footage"));
    }

    #[test]
    fn window_mean_is_overlap_weighted() {
        let analysis = json!({
            "duration": 10.0,
            "engagement_windows": [
                {"start": 0.0, "end": 5.0, "score": 1.0},
                {"start": 5.0, "end": 10.0, "score": 0.0}
            ]
        });
        let n = inputs_with(analysis, None);
        assert!((window_mean(&n, 0.0, 10.0) - 0.5).abs() < 1e-9);
        assert!((window_mean(&n, 0.0, 5.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_segment_forces_keep() {
        let analysis = json!({"duration": 10.0});
        let cut_list = json!([
            {"start": 0.0, "end": 0.2},
            {"start": 0.2, "end": 6.0}
        ]);
        let n = normalize(&analysis, None, Some(&cut_list));
        let params = RetentionParams::default();
        let signals = segment_signals(&n, &params);
        let (decisions, _, _) = decide(&n, signals, &params);
        assert!(decisions[0].keep_probability >= 0.72);
        assert!(decisions[0]
            .reasons
            .contains(&"forced_keep_min_clip".to_string()));
    }

    #[test]
    fn long_segment_capped() {
        let analysis = json!({
            "duration": 60.0,
            "engagement_windows": [{"start": 0.0, "end": 60.0, "score": 0.95}]
        });
        let cut_list = json!([{"start": 0.0, "end": 40.0}]);
        let n = normalize(&analysis, None, Some(&cut_list));
        let params = RetentionParams::default();
        let signals = segment_signals(&n, &params);
        let (decisions, _, _) = decide(&n, signals, &params);
        assert!(decisions[0].keep_probability <= 0.46);
    }

    #[test]
    fn context_floor_applies_with_high_story_guard() {
        let analysis = json!({"duration": 12.0});
        let transcript = json!([
            {"start": 0.0, "end": 6.0, "text": "because this means everything changed earlier"}
        ]);
        let cut_list = json!([{"start": 0.0, "end": 6.0}, {"start": 6.0, "end": 12.0}]);
        let n = normalize(&analysis, Some(&transcript), Some(&cut_list));
        let mut params = RetentionParams::default();
        params.story_coherence_guard = 75.0;
        let signals = segment_signals(&n, &params);
        assert!(signals[0].is_context_segment);
        let (decisions, _, _) = decide(&n, signals, &params);
        assert!(decisions[0].keep_probability >= 0.63);
    }

    #[test]
    fn safety_pass_marks_flags_and_reasons() {
        // High jump-cut severity and many discontinuities push predicted
        // jank over the threshold; low-value segments become drops first.
        let analysis = json!({
            "duration": 20.0,
            "jump_cut_severity": 0.95,
            "audio_discontinuities": 12,
            "engagement_windows": [{"start": 0.0, "end": 20.0, "score": 0.45}]
        });
        let cut_list = json!([
            {"start": 0.0, "end": 5.0},
            {"start": 5.0, "end": 10.0},
            {"start": 10.0, "end": 15.0},
            {"start": 15.0, "end": 20.0}
        ]);
        let n = normalize(&analysis, None, Some(&cut_list));
        let mut params = RetentionParams::default();
        params.cut_aggression = 75.0;
        params.jank_guard = 20.0;
        let signals = segment_signals(&n, &params);
        let (decisions, flags, _) = decide(&n, signals, &params);
        assert!(flags.auto_safety_adjusted);
        assert_eq!(
            flags.safety_reason.as_deref(),
            Some("predicted_jank_exceeded_threshold")
        );
        assert!(flags.adjusted_cut_aggression.is_some());
        assert!(
            decisions
                .iter()
                .any(|d| d.reasons.contains(&"auto_safety_jank_adjust".to_string())),
            "expected at least one lifted decision"
        );
    }

    #[test]
    fn decisions_are_deterministic() {
        let analysis = json!({
            "duration": 42.0,
            "engagement_windows": [
                {"start": 0.0, "end": 4.0, "score": 0.84},
                {"start": 4.0, "end": 12.0, "score": 0.61}
            ]
        });
        let n = inputs_with(analysis, Some(json!("a transcript of the test footage")));
        let params = RetentionParams::default();
        let a = {
            let s = segment_signals(&n, &params);
            decide(&n, s, &params)
        };
        let b = {
            let s = segment_signals(&n, &params);
            decide(&n, s, &params)
        };
        assert_eq!(a.0.len(), b.0.len());
        for (x, y) in a.0.iter().zip(b.0.iter()) {
            assert_eq!(x.keep_probability, y.keep_probability);
            assert_eq!(x.reasons, y.reasons);
        }
    }
}
