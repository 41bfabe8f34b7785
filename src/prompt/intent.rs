//! Intent detection: keyword families and the advanced mode-spec composition
//!
//! When the operator writes goals rather than assignments ("make it
//! smoother", "more viral"), fixed per-family deltas apply. Prompts carrying
//! at least two advanced mode-spec markers get a platform baseline, a
//! content-type overlay and a retention tilt composed on top.

use super::directive::cuts_per_minute_interval;

/// One intent family: trigger keywords and the deltas it applies.
pub struct IntentFamily {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub deltas: &'static [(&'static str, f64)],
}

pub const INTENT_FAMILIES: [IntentFamily; 8] = [
    IntentFamily {
        name: "viral_fast",
        keywords: &["viral", "fast", "faster", "snappy", "punchy", "quick cuts"],
        deltas: &[
            ("cut_aggression", 10.0),
            ("pattern_interrupt_every_sec", -3.0),
            ("pacing_multiplier", 0.15),
            ("hook_priority_weight", 0.2),
        ],
    },
    IntentFamily {
        name: "smooth_stable",
        keywords: &["smoother", "smooth", "stable", "calmer", "less jarring", "gentler"],
        deltas: &[
            ("jank_guard", 12.0),
            ("cut_aggression", -6.0),
            ("crossfade_ms", 80.0),
        ],
    },
    IntentFamily {
        name: "story_narrative",
        keywords: &["story", "narrative", "coherent", "keep context"],
        deltas: &[("story_coherence_guard", 10.0), ("cut_aggression", -4.0)],
    },
    IntentFamily {
        name: "filler",
        keywords: &["filler", "umms", "rambling", "waffle"],
        deltas: &[("filler_removal_aggression", 12.0)],
    },
    IntentFamily {
        name: "redundancy",
        keywords: &["redundant", "repetitive", "repeats itself", "repeating"],
        deltas: &[("redundancy_trim_aggression", 12.0)],
    },
    IntentFamily {
        name: "emotion_energy",
        keywords: &["emotional", "energetic", "hype", "exciting", "more energy"],
        deltas: &[("emotion_emphasis", 0.2), ("energy_emphasis", 0.2)],
    },
    IntentFamily {
        name: "silence_breathe",
        keywords: &["breathing room", "let it breathe", "more pauses", "keep pauses"],
        deltas: &[("silence_min_ms", 150.0)],
    },
    IntentFamily {
        name: "silence_tighten",
        keywords: &["no dead air", "remove silence", "tighter", "dead air"],
        deltas: &[("silence_min_ms", -120.0)],
    },
];

/// Markers identifying an advanced mode-spec prompt.
pub const MODE_SPEC_MARKERS: [&str; 5] = [
    "platform modes",
    "content type modes",
    "best primary hook",
    "final recommendations",
    "retention tilt",
];

/// Families triggered by this prompt, in declaration order.
pub fn matched_families(prompt: &str) -> Vec<&'static IntentFamily> {
    let lower = prompt.to_lowercase();
    INTENT_FAMILIES
        .iter()
        .filter(|family| family.keywords.iter().any(|k| lower.contains(k)))
        .collect()
}

/// Whether the prompt carries at least two advanced mode-spec markers.
pub fn is_mode_spec(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    MODE_SPEC_MARKERS
        .iter()
        .filter(|m| lower.contains(**m))
        .count()
        >= 2
}

/// Targets produced by the mode-spec composition. Absolute assignments, not
/// deltas.
#[derive(Debug, Default)]
pub struct ModeSpecTargets {
    pub assigns: Vec<(&'static str, f64, &'static str)>,
}

/// Compose platform baseline + content overlay + retention tilt.
///
/// Short-form platforms (TikTok, Shorts, Reels) get a hard-cut baseline;
/// long-form (YouTube, video essays) a gentler one. A requested cut count
/// converts to interrupt/aggression/pacing targets within the platform's
/// range.
pub fn mode_spec_targets(prompt: &str) -> ModeSpecTargets {
    let lower = prompt.to_lowercase();
    let short_form = ["tiktok", "shorts", "reels", "short-form", "short form"]
        .iter()
        .any(|k| lower.contains(k));
    let long_form = ["youtube", "video essay", "long-form", "long form", "podcast"]
        .iter()
        .any(|k| lower.contains(k));

    let mut targets = ModeSpecTargets::default();

    // Platform baseline (short-form wins when both appear).
    if short_form {
        targets.assigns.push(("cut_aggression", 78.0, "platform_baseline_short_form"));
        targets
            .assigns
            .push(("pattern_interrupt_every_sec", 6.0, "platform_baseline_short_form"));
        targets.assigns.push(("pacing_multiplier", 1.3, "platform_baseline_short_form"));
    } else if long_form {
        targets.assigns.push(("cut_aggression", 55.0, "platform_baseline_long_form"));
        targets
            .assigns
            .push(("pattern_interrupt_every_sec", 14.0, "platform_baseline_long_form"));
        targets.assigns.push(("pacing_multiplier", 1.0, "platform_baseline_long_form"));
    }

    // Content-type overlay.
    if lower.contains("tutorial") || lower.contains("educational") {
        targets
            .assigns
            .push(("story_coherence_guard", 72.0, "content_overlay_tutorial"));
    }
    if lower.contains("vlog") {
        targets.assigns.push(("emotion_emphasis", 1.2, "content_overlay_vlog"));
    }
    if lower.contains("gaming") {
        targets.assigns.push(("energy_emphasis", 1.3, "content_overlay_gaming"));
    }

    // Retention tilt.
    targets
        .assigns
        .push(("hook_priority_weight", 1.35, "retention_tilt"));

    // Requested cut count converts inside the platform's range.
    if let Some(interval) = cuts_per_minute_interval(prompt) {
        let interval = if short_form {
            interval.clamp(3.0, 10.0)
        } else if long_form {
            interval.clamp(8.0, 30.0)
        } else {
            interval
        };
        targets
            .assigns
            .push(("pattern_interrupt_every_sec", interval, "requested_cut_rate"));
        let aggression = (60.0 / interval * 7.0).clamp(30.0, 95.0);
        targets
            .assigns
            .push(("cut_aggression", aggression, "requested_cut_rate"));
        let pacing = (1.0 + (60.0 / interval - 5.0) * 0.04).clamp(0.8, 1.6);
        targets
            .assigns
            .push(("pacing_multiplier", pacing, "requested_cut_rate"));
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoother_triggers_smooth_family() {
        let families = matched_families("make it smoother overall");
        assert!(families.iter().any(|f| f.name == "smooth_stable"));
    }

    #[test]
    fn multiple_families_can_match() {
        let families = matched_families("more viral, trim the filler");
        let names: Vec<_> = families.iter().map(|f| f.name).collect();
        assert!(names.contains(&"viral_fast"));
        assert!(names.contains(&"filler"));
    }

    #[test]
    fn mode_spec_needs_two_markers() {
        assert!(!is_mode_spec("use platform modes"));
        assert!(is_mode_spec(
            "use platform modes and apply the final recommendations"
        ));
    }

    #[test]
    fn short_form_baseline_applied() {
        let targets = mode_spec_targets(
            "platform modes for tiktok, final recommendations with retention tilt",
        );
        assert!(targets
            .assigns
            .iter()
            .any(|(k, v, _)| *k == "cut_aggression" && *v == 78.0));
    }

    #[test]
    fn cut_rate_converts_within_platform_range() {
        let targets = mode_spec_targets(
            "platform modes for youtube, final recommendations, 12 cuts per minute",
        );
        // 12 cuts/min → every 5 s, clamped into the long-form 8..30 range.
        let interval = targets
            .assigns
            .iter()
            .rev()
            .find(|(k, _, _)| *k == "pattern_interrupt_every_sec")
            .map(|(_, v, _)| *v)
            .unwrap();
        assert_eq!(interval, 8.0);
    }
}
