//! Directive extraction: explicit parameter assignments in operator prose
//!
//! `cut_aggression = 88`, `increase jank guard by 10`, `max silence: 1.2s`,
//! `4-6 cuts per minute`, `subtitles: bold` — each alias resolves to one
//! canonical parameter key.

use std::sync::OnceLock;

use regex::Regex;

/// Alias table: canonical key → spoken/written variants.
pub const PARAM_ALIASES: [(&str, &[&str]); 14] = [
    ("cut_aggression", &["cut_aggression", "cut aggression"]),
    ("jank_guard", &["jank_guard", "jank guard"]),
    (
        "story_coherence_guard",
        &["story_coherence_guard", "story coherence guard", "story guard", "coherence guard"],
    ),
    (
        "hook_priority_weight",
        &["hook_priority_weight", "hook priority weight", "hook priority", "hook weight"],
    ),
    ("pacing_multiplier", &["pacing_multiplier", "pacing multiplier", "pacing"]),
    ("emotion_emphasis", &["emotion_emphasis", "emotion emphasis"]),
    ("energy_emphasis", &["energy_emphasis", "energy emphasis"]),
    (
        "filler_removal_aggression",
        &["filler_removal_aggression", "filler removal aggression", "filler removal"],
    ),
    (
        "redundancy_trim_aggression",
        &["redundancy_trim_aggression", "redundancy trim aggression", "redundancy trim"],
    ),
    (
        "pattern_interrupt_every_sec",
        &[
            "pattern_interrupt_every_sec",
            "pattern interrupt every sec",
            "pattern interrupt",
            "interrupt interval",
        ],
    ),
    (
        "min_clip_len_ms",
        &["min_clip_len_ms", "min clip len ms", "min clip length", "minimum clip length"],
    ),
    (
        "max_clip_len_ms",
        &["max_clip_len_ms", "max clip len ms", "max clip length", "maximum clip length"],
    ),
    ("silence_min_ms", &["silence_min_ms", "silence min ms", "silence threshold"]),
    ("crossfade_ms", &["crossfade_ms", "crossfade ms", "crossfade"]),
];

/// One extracted directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Set a numeric parameter to an absolute value.
    Assign { key: &'static str, value: f64 },
    /// Adjust a numeric parameter by a signed amount.
    Adjust { key: &'static str, delta: f64 },
    /// Set the subtitle style mode.
    Subtitle { mode: String, caption_off: bool },
}

struct ParamPatterns {
    key: &'static str,
    assign: Regex,
    adjust: Regex,
}

struct CompiledPatterns {
    params: Vec<ParamPatterns>,
    captions_off: Regex,
    subtitle_assign: Regex,
    max_silence: Regex,
    cuts_range: Regex,
    cuts_single: Regex,
}

#[allow(clippy::unwrap_used)] // all patterns are compile-time constants
fn patterns() -> &'static CompiledPatterns {
    static PATTERNS: OnceLock<CompiledPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let params = PARAM_ALIASES
            .iter()
            .map(|(key, aliases)| {
                // Aliases are plain words; spaces match either a space or an
                // underscore so spoken and snake_case forms both hit.
                let alternation = aliases
                    .iter()
                    .map(|a| regex::escape(a).replace("\\ ", " ").replace(' ', "[ _]"))
                    .collect::<Vec<_>>()
                    .join("|");
                ParamPatterns {
                    key,
                    assign: Regex::new(&format!(
                        r"(?i)\b(?:{alternation})\s*(?:=|:|\bto\b)\s*(-?\d+(?:\.\d+)?)"
                    ))
                    .unwrap(),
                    adjust: Regex::new(&format!(
                        r"(?i)\b(increase|raise|boost|bump|decrease|lower|reduce|drop)\s+(?:the\s+)?(?:{alternation})(?:\s+by)?\s+(-?\d+(?:\.\d+)?)"
                    ))
                    .unwrap(),
                }
            })
            .collect();
        CompiledPatterns {
            params,
            captions_off: Regex::new(
                r"(?i)\b(?:captions?\s+off|no\s+captions?|disable\s+captions?|turn\s+off\s+(?:the\s+)?captions?)\b",
            )
            .unwrap(),
            subtitle_assign: Regex::new(
                r"(?i)\bsubtitles?\s*(?:=|:|\bto\b)\s*([a-z0-9_][a-z0-9_ -]*)",
            )
            .unwrap(),
            max_silence: Regex::new(
                r"(?i)\bmax(?:imum)?\s+silence\s*[:=]?\s*(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?\b",
            )
            .unwrap(),
            cuts_range: Regex::new(
                r"(?i)\b(\d+)\s*(?:-|–|to)\s*(\d+)\s+cuts?\s+per\s+min(?:ute)?\b",
            )
            .unwrap(),
            cuts_single: Regex::new(r"(?i)\b(\d+)\s+cuts?\s+per\s+min(?:ute)?\b").unwrap(),
        }
    })
}

/// Extract every directive present in the prompt.
pub fn extract(prompt: &str) -> Vec<Directive> {
    let p = patterns();
    let mut out = Vec::new();

    for param in &p.params {
        for cap in param.assign.captures_iter(prompt) {
            if let Ok(value) = cap[1].parse::<f64>() {
                out.push(Directive::Assign {
                    key: param.key,
                    value,
                });
            }
        }
        for cap in param.adjust.captures_iter(prompt) {
            if let Ok(magnitude) = cap[2].parse::<f64>() {
                let verb = cap[1].to_lowercase();
                let sign = if matches!(verb.as_str(), "decrease" | "lower" | "reduce" | "drop")
                {
                    -1.0
                } else {
                    1.0
                };
                out.push(Directive::Adjust {
                    key: param.key,
                    delta: sign * magnitude,
                });
            }
        }
    }

    if p.captions_off.is_match(prompt) {
        out.push(Directive::Subtitle {
            mode: "captions_off_requested".to_string(),
            caption_off: true,
        });
    } else if let Some(cap) = p.subtitle_assign.captures(prompt) {
        let mode = cap[1].trim().to_lowercase().replace([' ', '-'], "_");
        if !mode.is_empty() {
            out.push(Directive::Subtitle {
                mode,
                caption_off: false,
            });
        }
    }

    if let Some(cap) = p.max_silence.captures(prompt) {
        if let Ok(seconds) = cap[1].parse::<f64>() {
            out.push(Directive::Assign {
                key: "silence_min_ms",
                value: seconds * 1000.0,
            });
        }
    }

    if let Some(secs) = cuts_per_minute_interval(prompt) {
        out.push(Directive::Assign {
            key: "pattern_interrupt_every_sec",
            value: secs,
        });
    }

    out
}

/// `4-6 cuts per minute` → average 5/min → one interrupt every 12 s.
pub fn cuts_per_minute_interval(prompt: &str) -> Option<f64> {
    let p = patterns();
    if let Some(cap) = p.cuts_range.captures(prompt) {
        let low = cap[1].parse::<f64>().ok()?;
        let high = cap[2].parse::<f64>().ok()?;
        let avg = ((low + high) / 2.0).max(1.0);
        return Some((60.0 / avg).round());
    }
    if let Some(cap) = p.cuts_single.captures(prompt) {
        let rate = cap[1].parse::<f64>().ok()?.max(1.0);
        return Some((60.0 / rate).round());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_assignment_extracted() {
        let d = extract("set cut_aggression = 88 please");
        assert!(d.contains(&Directive::Assign {
            key: "cut_aggression",
            value: 88.0
        }));
    }

    #[test]
    fn spoken_alias_with_to() {
        let d = extract("push the jank guard to 70");
        assert!(d.contains(&Directive::Assign {
            key: "jank_guard",
            value: 70.0
        }));
    }

    #[test]
    fn increase_by_verb() {
        let d = extract("increase hook priority by 0.3");
        assert!(d.contains(&Directive::Adjust {
            key: "hook_priority_weight",
            delta: 0.3
        }));
    }

    #[test]
    fn decrease_verb_is_negative() {
        let d = extract("lower pacing 0.2");
        assert!(d.contains(&Directive::Adjust {
            key: "pacing_multiplier",
            delta: -0.2
        }));
    }

    #[test]
    fn max_silence_maps_to_silence_min_ms() {
        let d = extract("keep max silence: 1.2s across the edit");
        assert!(d.contains(&Directive::Assign {
            key: "silence_min_ms",
            value: 1200.0
        }));
    }

    #[test]
    fn cuts_per_minute_range_converts() {
        // 4-6 cuts/min → avg 5 → every 12 s
        let d = extract("aim for 4-6 cuts per minute");
        assert!(d.contains(&Directive::Assign {
            key: "pattern_interrupt_every_sec",
            value: 12.0
        }));
    }

    #[test]
    fn captions_off_detected() {
        let d = extract("this one should ship with captions off");
        assert!(d.iter().any(|x| matches!(
            x,
            Directive::Subtitle {
                caption_off: true,
                ..
            }
        )));
    }

    #[test]
    fn subtitle_assignment_normalizes() {
        let d = extract("subtitles: bold pop");
        assert!(d.iter().any(|x| matches!(
            x,
            Directive::Subtitle { mode, caption_off: false } if mode == "bold_pop"
        )));
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(extract("make it feel cohesive and warm").is_empty());
    }
}
