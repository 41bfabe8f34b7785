//! Named retention parameter bundles
//!
//! Read-only library of six editing presets. Lookup is by lowercased key;
//! `premium_creator_mode` is the system default.

use crate::types::RetentionParams;

/// The system default preset key.
pub const DEFAULT_PRESET: &str = "premium_creator_mode";

/// All preset keys, in display order.
pub const PRESET_KEYS: [&str; 6] = [
    "viral_mode",
    "hyper_cut_mode",
    "story_mode",
    "psychological_hook_mode",
    "cinematic_mode",
    "premium_creator_mode",
];

/// A named bundle with a one-line operator description.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Preset {
    pub key: &'static str,
    pub description: &'static str,
    pub params: RetentionParams,
}

fn base() -> RetentionParams {
    RetentionParams::default()
}

/// Look up a preset by key (case-insensitive).
pub fn get(key: &str) -> Option<Preset> {
    let key = key.trim().to_lowercase();
    let (key, description, params) = match key.as_str() {
        "viral_mode" => (
            "viral_mode",
            "Maximum early retention: hard cuts, loud hooks, short clips",
            RetentionParams {
                cut_aggression: 86.0,
                jank_guard: 38.0,
                story_coherence_guard: 35.0,
                hook_priority_weight: 1.6,
                pacing_multiplier: 1.35,
                emotion_emphasis: 1.5,
                energy_emphasis: 1.6,
                filler_removal_aggression: 82.0,
                redundancy_trim_aggression: 74.0,
                pattern_interrupt_every_sec: 6.0,
                min_clip_len_ms: 280.0,
                max_clip_len_ms: 9000.0,
                silence_min_ms: 220.0,
                crossfade_ms: 80.0,
                subtitle_style_mode: "high_impact_captions".to_string(),
                ..base()
            },
        ),
        "hyper_cut_mode" => (
            "hyper_cut_mode",
            "Relentless pace: a cut every few seconds, silence stripped",
            RetentionParams {
                cut_aggression: 94.0,
                jank_guard: 30.0,
                story_coherence_guard: 28.0,
                hook_priority_weight: 1.3,
                pacing_multiplier: 1.6,
                emotion_emphasis: 1.2,
                energy_emphasis: 1.7,
                filler_removal_aggression: 90.0,
                redundancy_trim_aggression: 85.0,
                pattern_interrupt_every_sec: 4.0,
                min_clip_len_ms: 180.0,
                max_clip_len_ms: 6500.0,
                silence_min_ms: 140.0,
                crossfade_ms: 40.0,
                subtitle_style_mode: "rapid_word_pop".to_string(),
                ..base()
            },
        ),
        "story_mode" => (
            "story_mode",
            "Narrative first: context segments protected, gentle trims",
            RetentionParams {
                cut_aggression: 38.0,
                jank_guard: 68.0,
                story_coherence_guard: 88.0,
                hook_priority_weight: 0.9,
                pacing_multiplier: 0.9,
                emotion_emphasis: 1.1,
                energy_emphasis: 0.9,
                filler_removal_aggression: 48.0,
                redundancy_trim_aggression: 40.0,
                pattern_interrupt_every_sec: 22.0,
                min_clip_len_ms: 900.0,
                max_clip_len_ms: 26000.0,
                silence_min_ms: 520.0,
                crossfade_ms: 220.0,
                subtitle_style_mode: "clean_narrative".to_string(),
                ..base()
            },
        ),
        "psychological_hook_mode" => (
            "psychological_hook_mode",
            "Front-loads the strongest moment and sustains open loops",
            RetentionParams {
                cut_aggression: 68.0,
                jank_guard: 50.0,
                story_coherence_guard: 55.0,
                hook_priority_weight: 2.2,
                pacing_multiplier: 1.15,
                emotion_emphasis: 1.6,
                energy_emphasis: 1.3,
                filler_removal_aggression: 66.0,
                redundancy_trim_aggression: 60.0,
                pattern_interrupt_every_sec: 8.0,
                min_clip_len_ms: 340.0,
                max_clip_len_ms: 12000.0,
                silence_min_ms: 260.0,
                crossfade_ms: 100.0,
                subtitle_style_mode: "question_tease".to_string(),
                ..base()
            },
        ),
        "cinematic_mode" => (
            "cinematic_mode",
            "Smoothness over speed: long shots, heavy crossfades",
            RetentionParams {
                cut_aggression: 30.0,
                jank_guard: 85.0,
                story_coherence_guard: 72.0,
                hook_priority_weight: 0.8,
                pacing_multiplier: 0.85,
                emotion_emphasis: 1.0,
                energy_emphasis: 0.8,
                filler_removal_aggression: 40.0,
                redundancy_trim_aggression: 36.0,
                pattern_interrupt_every_sec: 28.0,
                min_clip_len_ms: 1200.0,
                max_clip_len_ms: 32000.0,
                silence_min_ms: 700.0,
                crossfade_ms: 320.0,
                subtitle_style_mode: "minimal_lower_third".to_string(),
                ..base()
            },
        ),
        "premium_creator_mode" => (
            "premium_creator_mode",
            "Balanced default tuned for professional creator output",
            base(),
        ),
        _ => return None,
    };
    Some(Preset {
        key,
        description,
        params,
    })
}

/// The default preset bundle.
pub fn default_preset() -> Preset {
    // DEFAULT_PRESET is a member of PRESET_KEYS; get() cannot miss it.
    get(DEFAULT_PRESET).unwrap_or(Preset {
        key: DEFAULT_PRESET,
        description: "Balanced default tuned for professional creator output",
        params: RetentionParams::default(),
    })
}

/// All six bundles, in display order.
pub fn all() -> Vec<Preset> {
    PRESET_KEYS.iter().filter_map(|k| get(k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn library_has_six_presets() {
        assert_eq!(all().len(), 6);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(get("VIRAL_MODE").is_some());
        assert!(get("  Story_Mode ").is_some());
        assert!(get("nonexistent_mode").is_none());
    }

    #[test]
    fn default_preset_is_premium_creator() {
        assert_eq!(default_preset().key, "premium_creator_mode");
    }

    #[test]
    fn presets_span_at_least_four_cut_aggression_values() {
        let distinct: BTreeSet<String> = all()
            .iter()
            .map(|p| format!("{:.1}", p.params.cut_aggression))
            .collect();
        assert!(
            distinct.len() >= 4,
            "expected >=4 distinct cut_aggression values, got {distinct:?}"
        );
    }

    #[test]
    fn all_preset_params_validate() {
        for preset in all() {
            let raw = serde_json::to_value(&preset.params).unwrap();
            let parsed = crate::types::RetentionParams::parse(&raw).unwrap();
            assert_eq!(parsed, preset.params, "{} params not normalized", preset.key);
        }
    }
}
