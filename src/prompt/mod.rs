//! Prompt-to-parameter translator
//!
//! Deterministic mapping from operator prose to a config-parameter delta.
//! Three strategies in decreasing precision: explicit directives, intent
//! keyword families, then the suggestion-engine fallback. Directives apply
//! last so a literal set-assignment always wins over an intent delta. Every
//! accepted change is recorded for audit; zero-magnitude changes are
//! discarded.

pub mod directive;
pub mod intent;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::suggest::{SuggestionEngine, SuggestionKind};
use crate::types::RetentionParams;

use directive::{extract, Directive};
use intent::{is_mode_spec, matched_families, mode_spec_targets};

/// Suggestion fallback window.
const FALLBACK_LIMIT: usize = 60;
const FALLBACK_RANGE_DAYS: i64 = 14;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt_not_actionable")]
    NotActionable,
}

/// One audited parameter change.
#[derive(Debug, Clone, Serialize)]
pub struct ParamChange {
    pub key: String,
    pub previous: serde_json::Value,
    pub next: serde_json::Value,
    pub delta: f64,
    pub source: String,
    pub reason: String,
}

/// Result of translating one prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptOutcome {
    pub strategy: String,
    pub params: RetentionParams,
    pub changes: Vec<ParamChange>,
    pub warnings: Vec<String>,
}

pub struct Translator {
    suggestions: Arc<SuggestionEngine>,
}

impl Translator {
    pub fn new(suggestions: Arc<SuggestionEngine>) -> Self {
        Self { suggestions }
    }

    /// Translate a prompt into a parameter set derived from `base`.
    pub async fn apply(
        &self,
        prompt: &str,
        base: &RetentionParams,
    ) -> Result<PromptOutcome, PromptError> {
        let mut params = base.clone();
        let mut changes: Vec<ParamChange> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        // Intent deltas first; directives afterwards so literal assignments
        // override whatever an intent moved.
        let mut intent_matched = false;
        for family in matched_families(prompt) {
            intent_matched = true;
            for (key, delta) in family.deltas {
                adjust(&mut params, &mut changes, key, *delta, "prompt_intent", family.name);
            }
        }
        if is_mode_spec(prompt) {
            intent_matched = true;
            for (key, value, reason) in mode_spec_targets(prompt).assigns {
                assign(&mut params, &mut changes, key, value, "prompt_intent", reason);
            }
        }

        let directives = extract(prompt);
        let directive_matched = !directives.is_empty();
        for d in directives {
            match d {
                Directive::Assign { key, value } => {
                    assign(&mut params, &mut changes, key, value, "prompt_directive", "explicit_assignment");
                }
                Directive::Adjust { key, delta } => {
                    adjust(&mut params, &mut changes, key, delta, "prompt_directive", "explicit_adjustment");
                }
                Directive::Subtitle { mode, caption_off } => {
                    set_subtitle(&mut params, &mut changes, &mode);
                    if caption_off {
                        warnings.push(
                            "captions remain renderable; runtime caption toggle still controls display"
                                .to_string(),
                        );
                    }
                }
            }
        }

        let strategy = if directive_matched {
            "prompt_directive"
        } else if intent_matched {
            "prompt_intent"
        } else {
            // Fallback: top suggestion from recent metrics, else a
            // deterministic baseline nudge.
            let report = self
                .suggestions
                .analyze(FALLBACK_LIMIT, FALLBACK_RANGE_DAYS)
                .await;
            let top_deltas = report
                .suggestions
                .iter()
                .find(|s| s.kind == SuggestionKind::ParamDelta)
                .map(|s| (s.title.clone(), s.param_deltas.clone()));
            match top_deltas {
                Some((title, deltas)) => {
                    for (key, delta) in deltas {
                        adjust(
                            &mut params,
                            &mut changes,
                            &key,
                            delta,
                            "suggestion_fallback",
                            &title,
                        );
                    }
                }
                None => {
                    for (key, delta) in [
                        ("hook_priority_weight", 0.10),
                        ("cut_aggression", 3.0),
                        ("jank_guard", 4.0),
                    ] {
                        adjust(
                            &mut params,
                            &mut changes,
                            key,
                            delta,
                            "suggestion_fallback",
                            "baseline_nudge",
                        );
                    }
                }
            }
            "suggestion_fallback"
        };

        if changes.is_empty() {
            return Err(PromptError::NotActionable);
        }

        Ok(PromptOutcome {
            strategy: strategy.to_string(),
            params,
            changes,
            warnings,
        })
    }
}

fn record_numeric(
    changes: &mut Vec<ParamChange>,
    key: &str,
    previous: f64,
    next: f64,
    source: &str,
    reason: &str,
) {
    if (next - previous).abs() < 1e-9 {
        return;
    }
    changes.push(ParamChange {
        key: key.to_string(),
        previous: serde_json::json!(previous),
        next: serde_json::json!(next),
        delta: next - previous,
        source: source.to_string(),
        reason: reason.to_string(),
    });
}

fn assign(
    params: &mut RetentionParams,
    changes: &mut Vec<ParamChange>,
    key: &str,
    value: f64,
    source: &str,
    reason: &str,
) {
    let Some(previous) = params.get(key) else {
        return;
    };
    if let Some(next) = params.set(key, value) {
        record_numeric(changes, key, previous, next, source, reason);
    }
}

fn adjust(
    params: &mut RetentionParams,
    changes: &mut Vec<ParamChange>,
    key: &str,
    delta: f64,
    source: &str,
    reason: &str,
) {
    let Some(previous) = params.get(key) else {
        return;
    };
    if let Some(next) = params.set(key, previous + delta) {
        record_numeric(changes, key, previous, next, source, reason);
    }
}

fn set_subtitle(params: &mut RetentionParams, changes: &mut Vec<ParamChange>, mode: &str) {
    let mut mode = mode.trim().to_string();
    mode.truncate(crate::types::params::SUBTITLE_MODE_MAX_LEN);
    if mode.is_empty() || mode == params.subtitle_style_mode {
        return;
    }
    let previous = params.subtitle_style_mode.clone();
    params.subtitle_style_mode = mode.clone();
    changes.push(ParamChange {
        key: "subtitle_style_mode".to_string(),
        previous: serde_json::json!(previous),
        next: serde_json::json!(mode),
        delta: 0.0,
        source: "prompt_directive".to_string(),
        reason: "subtitle_mode_assignment".to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConfigVersionStore, MetricStore, Store};

    fn translator() -> Translator {
        let store = Store::in_memory();
        let versions = Arc::new(ConfigVersionStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        Translator::new(Arc::new(SuggestionEngine::new(metrics, versions)))
    }

    #[tokio::test]
    async fn literal_assignment_wins_over_intent() {
        let t = translator();
        let base = RetentionParams::default();
        let outcome = t
            .apply("cut_aggression = 88, make it smoother", &base)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, "prompt_directive");
        // The smoother intent fired (jank guard up) but the explicit
        // assignment kept the last word on cut_aggression.
        assert_eq!(outcome.params.cut_aggression, 88.0);
        assert!(outcome.params.jank_guard > base.jank_guard);
    }

    #[tokio::test]
    async fn captions_off_sets_mode_and_warns() {
        let t = translator();
        let outcome = t
            .apply("ship it with captions off", &RetentionParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.params.subtitle_style_mode, "captions_off_requested");
        assert!(!outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn intent_only_prompt_uses_intent_strategy() {
        let t = translator();
        let base = RetentionParams::default();
        let outcome = t.apply("more viral please", &base).await.unwrap();
        assert_eq!(outcome.strategy, "prompt_intent");
        assert!(outcome.params.cut_aggression > base.cut_aggression);
        assert!(outcome
            .changes
            .iter()
            .all(|c| c.source == "prompt_intent"));
    }

    #[tokio::test]
    async fn unmatched_prompt_falls_back_to_baseline_nudge() {
        let t = translator();
        let base = RetentionParams::default();
        let outcome = t
            .apply("do whatever seems best here", &base)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, "suggestion_fallback");
        assert!(outcome.params.jank_guard > base.jank_guard);
    }

    #[tokio::test]
    async fn translated_params_always_validate() {
        let t = translator();
        let outcome = t
            .apply("cut_aggression = 99999, jank_guard to -50", &RetentionParams::default())
            .await
            .unwrap();
        assert_eq!(outcome.params.cut_aggression, 100.0);
        assert_eq!(outcome.params.jank_guard, 0.0);
        let raw = serde_json::to_value(&outcome.params).unwrap();
        let reparsed = RetentionParams::parse(&raw).unwrap();
        assert_eq!(reparsed, outcome.params);
    }

    #[tokio::test]
    async fn changes_carry_audit_fields() {
        let t = translator();
        let outcome = t
            .apply("increase jank guard by 10", &RetentionParams::default())
            .await
            .unwrap();
        let change = &outcome.changes[0];
        assert_eq!(change.key, "jank_guard");
        assert_eq!(change.previous, serde_json::json!(55.0));
        assert_eq!(change.next, serde_json::json!(65.0));
        assert!((change.delta - 10.0).abs() < 1e-9);
        assert_eq!(change.source, "prompt_directive");
    }

    #[tokio::test]
    async fn mode_spec_composition_applies() {
        let t = translator();
        let outcome = t
            .apply(
                "platform modes: tiktok. content type modes: tutorial. apply final recommendations",
                &RetentionParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.params.cut_aggression, 78.0);
        assert_eq!(outcome.params.pattern_interrupt_every_sec, 6.0);
        assert_eq!(outcome.params.story_coherence_guard, 72.0);
    }
}
