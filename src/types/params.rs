//! Retention parameter schema and clamps
//!
//! Every parameter write in the system passes through [`RetentionParams::parse`]:
//! raw JSON is merged over the defaults, numeric fields are clamped to their
//! hard bounds (integer-flagged fields are rounded), and the subtitle mode is
//! validated. Out-of-range numbers never fail — they clamp. The only hard
//! failures are a malformed payload shape or an invalid subtitle mode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard bounds and rounding flag for one numeric parameter.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub min: f64,
    pub max: f64,
    pub integer: bool,
}

/// The fourteen numeric parameter fields, in canonical order.
pub const FIELD_SPECS: [FieldSpec; 14] = [
    FieldSpec { key: "cut_aggression", min: 0.0, max: 100.0, integer: false },
    FieldSpec { key: "jank_guard", min: 0.0, max: 100.0, integer: false },
    FieldSpec { key: "story_coherence_guard", min: 0.0, max: 100.0, integer: false },
    FieldSpec { key: "hook_priority_weight", min: 0.2, max: 3.0, integer: false },
    FieldSpec { key: "pacing_multiplier", min: 0.5, max: 2.2, integer: false },
    FieldSpec { key: "emotion_emphasis", min: 0.0, max: 2.5, integer: false },
    FieldSpec { key: "energy_emphasis", min: 0.0, max: 2.5, integer: false },
    FieldSpec { key: "filler_removal_aggression", min: 0.0, max: 100.0, integer: false },
    FieldSpec { key: "redundancy_trim_aggression", min: 0.0, max: 100.0, integer: false },
    FieldSpec { key: "pattern_interrupt_every_sec", min: 2.0, max: 60.0, integer: true },
    FieldSpec { key: "min_clip_len_ms", min: 120.0, max: 8000.0, integer: true },
    FieldSpec { key: "max_clip_len_ms", min: 1000.0, max: 60000.0, integer: true },
    FieldSpec { key: "silence_min_ms", min: 80.0, max: 5000.0, integer: true },
    FieldSpec { key: "crossfade_ms", min: 0.0, max: 800.0, integer: true },
];

/// Maximum accepted length for `subtitle_style_mode`.
pub const SUBTITLE_MODE_MAX_LEN: usize = 120;

/// Bounds for the per-segment decision weights and the retention weights.
pub const WEIGHT_MIN: f64 = 0.2;
pub const WEIGHT_MAX: f64 = 3.5;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid_payload: {0}")]
    InvalidPayload(String),
}

/// Per-segment decision weights (value terms a–f, risk terms g, h, j).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentWeights {
    pub energy: f64,
    pub info_density: f64,
    pub novelty: f64,
    pub emotion: f64,
    pub filler: f64,
    pub redundancy: f64,
    pub continuity: f64,
    pub context: f64,
    pub audio_jank: f64,
}

impl Default for SegmentWeights {
    fn default() -> Self {
        Self {
            energy: 1.35,
            info_density: 1.10,
            novelty: 1.02,
            emotion: 0.95,
            filler: 1.08,
            redundancy: 1.02,
            continuity: 1.18,
            context: 1.36,
            audio_jank: 1.31,
        }
    }
}

impl SegmentWeights {
    fn clamped(mut self) -> Self {
        for w in [
            &mut self.energy,
            &mut self.info_density,
            &mut self.novelty,
            &mut self.emotion,
            &mut self.filler,
            &mut self.redundancy,
            &mut self.continuity,
            &mut self.context,
            &mut self.audio_jank,
        ] {
            *w = sanitize(*w, 1.0).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
        self
    }
}

/// Retention subscore weights w1–w7 (hook, pacing, energy, variety, story,
/// filler, jank). Filler and jank are subtracted in the total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub hook: f64,
    pub pacing: f64,
    pub energy: f64,
    pub variety: f64,
    pub story: f64,
    pub filler: f64,
    pub jank: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            hook: 1.78,
            pacing: 1.35,
            energy: 1.20,
            variety: 1.08,
            story: 1.42,
            filler: 1.22,
            jank: 1.48,
        }
    }
}

impl ScoringWeights {
    fn clamped(mut self) -> Self {
        for w in [
            &mut self.hook,
            &mut self.pacing,
            &mut self.energy,
            &mut self.variety,
            &mut self.story,
            &mut self.filler,
            &mut self.jank,
        ] {
            *w = sanitize(*w, 1.0).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
        self
    }
}

/// The full retention parameter set.
///
/// All numeric fields live as `f64`; integer-flagged fields hold whole
/// numbers after normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionParams {
    pub cut_aggression: f64,
    pub jank_guard: f64,
    pub story_coherence_guard: f64,
    pub hook_priority_weight: f64,
    pub pacing_multiplier: f64,
    pub emotion_emphasis: f64,
    pub energy_emphasis: f64,
    pub filler_removal_aggression: f64,
    pub redundancy_trim_aggression: f64,
    pub pattern_interrupt_every_sec: f64,
    pub min_clip_len_ms: f64,
    pub max_clip_len_ms: f64,
    pub silence_min_ms: f64,
    pub crossfade_ms: f64,
    pub subtitle_style_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_weights: Option<SegmentWeights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_weights: Option<ScoringWeights>,
}

impl Default for RetentionParams {
    fn default() -> Self {
        Self {
            cut_aggression: 62.0,
            jank_guard: 55.0,
            story_coherence_guard: 60.0,
            hook_priority_weight: 1.0,
            pacing_multiplier: 1.0,
            emotion_emphasis: 1.0,
            energy_emphasis: 1.0,
            filler_removal_aggression: 58.0,
            redundancy_trim_aggression: 52.0,
            pattern_interrupt_every_sec: 11.0,
            min_clip_len_ms: 420.0,
            max_clip_len_ms: 14000.0,
            silence_min_ms: 320.0,
            crossfade_ms: 120.0,
            subtitle_style_mode: "dynamic_emphasis".to_string(),
            segment_weights: None,
            scoring_weights: None,
        }
    }
}

/// Replace NaN / infinite inputs with a fallback before clamping.
fn sanitize(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

impl RetentionParams {
    /// Parse a raw JSON value into a validated parameter set.
    ///
    /// Missing fields take their defaults; present fields clamp to bounds.
    /// Fails only on a non-object payload or an invalid subtitle mode.
    pub fn parse(raw: &serde_json::Value) -> Result<Self, ParamsError> {
        let mut params: Self = if raw.is_null() {
            Self::default()
        } else if raw.is_object() {
            serde_json::from_value(raw.clone())
                .map_err(|e| ParamsError::InvalidPayload(e.to_string()))?
        } else {
            return Err(ParamsError::InvalidPayload(
                "params must be a JSON object".to_string(),
            ));
        };
        params.normalize()?;
        Ok(params)
    }

    /// Clamp every field into bounds in place. Idempotent.
    pub fn normalize(&mut self) -> Result<(), ParamsError> {
        for spec in &FIELD_SPECS {
            let current = self.get(spec.key).unwrap_or(spec.min);
            let mut v = sanitize(current, spec.min).clamp(spec.min, spec.max);
            if spec.integer {
                v = v.round();
            }
            self.set_unchecked(spec.key, v);
        }

        // min_clip_len_ms must not exceed max_clip_len_ms; inverted pairs
        // are swapped so both operator intents survive.
        if self.min_clip_len_ms > self.max_clip_len_ms {
            std::mem::swap(&mut self.min_clip_len_ms, &mut self.max_clip_len_ms);
            self.min_clip_len_ms = self.min_clip_len_ms.clamp(120.0, 8000.0);
            self.max_clip_len_ms = self.max_clip_len_ms.clamp(1000.0, 60000.0);
        }

        self.subtitle_style_mode = self.subtitle_style_mode.trim().to_string();
        if self.subtitle_style_mode.is_empty() {
            return Err(ParamsError::InvalidPayload(
                "subtitle_style_mode must be non-empty".to_string(),
            ));
        }
        if self.subtitle_style_mode.len() > SUBTITLE_MODE_MAX_LEN {
            return Err(ParamsError::InvalidPayload(format!(
                "subtitle_style_mode exceeds {SUBTITLE_MODE_MAX_LEN} chars"
            )));
        }

        self.segment_weights = self.segment_weights.map(SegmentWeights::clamped);
        self.scoring_weights = self.scoring_weights.map(ScoringWeights::clamped);
        Ok(())
    }

    /// Read a numeric field by key.
    pub fn get(&self, key: &str) -> Option<f64> {
        Some(match key {
            "cut_aggression" => self.cut_aggression,
            "jank_guard" => self.jank_guard,
            "story_coherence_guard" => self.story_coherence_guard,
            "hook_priority_weight" => self.hook_priority_weight,
            "pacing_multiplier" => self.pacing_multiplier,
            "emotion_emphasis" => self.emotion_emphasis,
            "energy_emphasis" => self.energy_emphasis,
            "filler_removal_aggression" => self.filler_removal_aggression,
            "redundancy_trim_aggression" => self.redundancy_trim_aggression,
            "pattern_interrupt_every_sec" => self.pattern_interrupt_every_sec,
            "min_clip_len_ms" => self.min_clip_len_ms,
            "max_clip_len_ms" => self.max_clip_len_ms,
            "silence_min_ms" => self.silence_min_ms,
            "crossfade_ms" => self.crossfade_ms,
            _ => return None,
        })
    }

    /// Write a numeric field by key, clamping and rounding per its spec.
    ///
    /// Returns the value actually stored, or `None` for an unknown key.
    pub fn set(&mut self, key: &str, value: f64) -> Option<f64> {
        let spec = FIELD_SPECS.iter().find(|s| s.key == key)?;
        let mut v = sanitize(value, spec.min).clamp(spec.min, spec.max);
        if spec.integer {
            v = v.round();
        }
        self.set_unchecked(key, v);
        Some(v)
    }

    fn set_unchecked(&mut self, key: &str, value: f64) {
        match key {
            "cut_aggression" => self.cut_aggression = value,
            "jank_guard" => self.jank_guard = value,
            "story_coherence_guard" => self.story_coherence_guard = value,
            "hook_priority_weight" => self.hook_priority_weight = value,
            "pacing_multiplier" => self.pacing_multiplier = value,
            "emotion_emphasis" => self.emotion_emphasis = value,
            "energy_emphasis" => self.energy_emphasis = value,
            "filler_removal_aggression" => self.filler_removal_aggression = value,
            "redundancy_trim_aggression" => self.redundancy_trim_aggression = value,
            "pattern_interrupt_every_sec" => self.pattern_interrupt_every_sec = value,
            "min_clip_len_ms" => self.min_clip_len_ms = value,
            "max_clip_len_ms" => self.max_clip_len_ms = value,
            "silence_min_ms" => self.silence_min_ms = value,
            "crossfade_ms" => self.crossfade_ms = value,
            _ => {}
        }
    }

    /// Effective segment weights (defaults when no override is set).
    pub fn segment_weights(&self) -> SegmentWeights {
        self.segment_weights.unwrap_or_default()
    }

    /// Effective retention weights (defaults when no override is set).
    pub fn scoring_weights(&self) -> ScoringWeights {
        self.scoring_weights.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_within_bounds() {
        let p = RetentionParams::default();
        for spec in &FIELD_SPECS {
            let v = p.get(spec.key).unwrap();
            assert!(
                v >= spec.min && v <= spec.max,
                "{} = {} outside [{}, {}]",
                spec.key,
                v,
                spec.min,
                spec.max
            );
        }
    }

    #[test]
    fn parse_clamps_out_of_range_values() {
        let p = RetentionParams::parse(&json!({
            "cut_aggression": 250.0,
            "jank_guard": -40.0,
            "pattern_interrupt_every_sec": 0.4,
        }))
        .unwrap();
        assert_eq!(p.cut_aggression, 100.0);
        assert_eq!(p.jank_guard, 0.0);
        assert_eq!(p.pattern_interrupt_every_sec, 2.0);
    }

    #[test]
    fn parse_rounds_integer_fields() {
        let p = RetentionParams::parse(&json!({
            "min_clip_len_ms": 433.7,
            "silence_min_ms": 319.2,
        }))
        .unwrap();
        assert_eq!(p.min_clip_len_ms, 434.0);
        assert_eq!(p.silence_min_ms, 319.0);
    }

    #[test]
    fn parse_swaps_inverted_clip_lengths() {
        let p = RetentionParams::parse(&json!({
            "min_clip_len_ms": 7000,
            "max_clip_len_ms": 1500,
        }))
        .unwrap();
        assert!(p.min_clip_len_ms <= p.max_clip_len_ms);
        assert_eq!(p.min_clip_len_ms, 1500.0);
        assert_eq!(p.max_clip_len_ms, 7000.0);
    }

    #[test]
    fn parse_is_idempotent() {
        let raw = json!({
            "cut_aggression": 88.3,
            "min_clip_len_ms": 20000,
            "max_clip_len_ms": 500,
            "hook_priority_weight": 9.0,
        });
        let once = RetentionParams::parse(&raw).unwrap();
        let twice =
            RetentionParams::parse(&serde_json::to_value(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn null_payload_yields_defaults() {
        let p = RetentionParams::parse(&serde_json::Value::Null).unwrap();
        assert_eq!(p, RetentionParams::default());
        assert!(RetentionParams::parse(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn empty_subtitle_mode_rejected() {
        let err = RetentionParams::parse(&json!({"subtitle_style_mode": "   "}));
        assert!(err.is_err());
    }

    #[test]
    fn oversized_subtitle_mode_rejected() {
        let err = RetentionParams::parse(&json!({
            "subtitle_style_mode": "x".repeat(121)
        }));
        assert!(err.is_err());
    }

    #[test]
    fn weight_overrides_clamp() {
        let p = RetentionParams::parse(&json!({
            "scoring_weights": {
                "hook": 99.0, "pacing": 0.01, "energy": 1.2, "variety": 1.08,
                "story": 1.42, "filler": 1.22, "jank": 1.48
            }
        }))
        .unwrap();
        let w = p.scoring_weights();
        assert_eq!(w.hook, WEIGHT_MAX);
        assert_eq!(w.pacing, WEIGHT_MIN);
    }

    #[test]
    fn set_by_key_clamps_and_rounds() {
        let mut p = RetentionParams::default();
        assert_eq!(p.set("crossfade_ms", 2000.0), Some(800.0));
        assert_eq!(p.set("pattern_interrupt_every_sec", 7.6), Some(8.0));
        assert_eq!(p.set("unknown_key", 1.0), None);
    }

    #[test]
    fn nan_inputs_fall_back_to_bounds() {
        let mut p = RetentionParams::default();
        assert_eq!(p.set("cut_aggression", f64::NAN), Some(0.0));
    }
}
