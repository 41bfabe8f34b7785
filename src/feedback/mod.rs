//! Feedback loop
//!
//! Folds completed-render outcome signals into the next config version,
//! gated by sample size, confidence, predicted uplift and cooldown. One
//! run at a time: a loop-level mutex serializes triggers so two applies can
//! never race and produce two active versions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::presets;
use crate::storage::config_versions::CreateOptions;
use crate::storage::{
    ConfigVersionStore, FeedbackStateStore, JobStore, MetricStore,
};
use crate::types::{
    BrainSnapshot, FeedbackRunReport, RenderJob, RetentionFeedback,
};

/// Signal weights, in spec order: watch, hook-hold, completion, CTR,
/// social-per-view, manual score, first-30s retention, model retention.
const SIGNAL_WEIGHTS: [f64; 8] = [0.28, 0.21, 0.12, 0.14, 0.08, 0.05, 0.08, 0.04];

/// Outcome level below which the loop wants to push parameters.
const TARGET_OUTCOME: f64 = 0.72;

/// Minimum per-parameter delta worth proposing.
const DELTA_FLOOR: f64 = 0.01;

/// One job's normalized outcome plus its grouping labels.
#[derive(Debug, Clone)]
struct OutcomeSample {
    outcome: f64,
    hook_hold: Option<f64>,
    completion: Option<f64>,
    has_platform_signals: bool,
    editor_mode: Option<String>,
    strategy: Option<String>,
    platform: Option<String>,
}

pub struct FeedbackLoop {
    states: Arc<FeedbackStateStore>,
    jobs: Arc<JobStore>,
    metrics: Arc<MetricStore>,
    versions: Arc<ConfigVersionStore>,
    /// Serializes runs; overlapping triggers queue behind the current one.
    run_lock: Mutex<()>,
}

impl FeedbackLoop {
    pub fn new(
        states: Arc<FeedbackStateStore>,
        jobs: Arc<JobStore>,
        metrics: Arc<MetricStore>,
        versions: Arc<ConfigVersionStore>,
    ) -> Self {
        Self {
            states,
            jobs,
            metrics,
            versions,
            run_lock: Mutex::new(()),
        }
    }

    /// Run the loop once for `trigger`. Always updates the runtime row;
    /// `force_apply` bypasses the enabled/auto-apply/cooldown gates but not
    /// the sample, confidence or delta thresholds.
    pub async fn run(&self, trigger: &str, force_apply: bool) -> FeedbackRunReport {
        let _serialized = self.run_lock.lock().await;
        let mut state = self.states.load().await;
        let settings = state.settings.clone();
        let now = Utc::now();

        let jobs = self
            .jobs
            .recent_completed(settings.lookback_limit as usize)
            .await;
        let samples: Vec<OutcomeSample> =
            jobs.iter().filter_map(extract_sample).collect();

        let snapshot = self.build_snapshot(&samples, &settings).await;

        let decision = eligibility(
            &settings,
            &state.runtime.last_applied_at,
            &snapshot,
            now,
            force_apply,
        );

        let mut report = FeedbackRunReport {
            trigger: trigger.to_string(),
            applied: false,
            reason: String::new(),
            snapshot: Some(snapshot.clone()),
            new_config_version_id: None,
        };

        match decision {
            Err(reason) => {
                report.reason = reason;
            }
            Ok(()) => match self.apply(&snapshot, trigger).await {
                Ok(version_id) => {
                    report.applied = true;
                    report.reason = "applied".to_string();
                    report.new_config_version_id = Some(version_id.clone());
                    state.runtime.last_applied_at = Some(now);
                    state.runtime.last_applied_config_id = Some(version_id);
                    state.runtime.last_applied_confidence = Some(snapshot.confidence);
                    state.runtime.last_applied_delta =
                        Some(snapshot.predicted_delta_score);
                    state.runtime.last_applied_note = Some(format!(
                        "feedback loop ({trigger}): n={}, confidence={:.2}, predicted=+{:.2}",
                        snapshot.sample_size,
                        snapshot.confidence,
                        snapshot.predicted_delta_score
                    ));
                }
                Err(e) => {
                    report.reason = format!("apply_failed: {e}");
                }
            },
        }

        state.runtime.last_run_at = Some(now);
        state.runtime.last_run_trigger = Some(trigger.to_string());
        state.runtime.last_run_reason = Some(report.reason.clone());
        self.states.save(state).await;

        tracing::info!(
            trigger,
            applied = report.applied,
            reason = %report.reason,
            samples = report.snapshot.as_ref().map_or(0, |s| s.sample_size),
            "feedback loop run complete"
        );
        report
    }

    async fn build_snapshot(
        &self,
        samples: &[OutcomeSample],
        settings: &crate::types::FeedbackLoopSettings,
    ) -> BrainSnapshot {
        let n = samples.len();
        let avg_outcome = mean(samples.iter().map(|s| s.outcome));
        let platform_share = if n > 0 {
            samples.iter().filter(|s| s.has_platform_signals).count() as f64 / n as f64
        } else {
            0.0
        };

        let per_editor_mode = group_average(samples, |s| s.editor_mode.clone());
        let per_strategy = group_average(samples, |s| s.strategy.clone());
        let per_platform = group_average(samples, |s| s.platform.clone());

        let (top_mode, top_mode_margin) = if per_editor_mode.len() >= 2 {
            per_editor_mode
                .iter()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(k, v)| (Some(k.clone()), (v - avg_outcome).max(0.0)))
                .unwrap_or((None, 0.0))
        } else {
            (None, 0.0)
        };

        // Jank pressure comes from the metric rows, not the job feedback.
        let recent_metrics = self
            .metrics
            .recent(settings.lookback_limit as usize)
            .await;
        let avg_metric_jank = mean(recent_metrics.iter().map(|m| m.score_jank));

        let avg_hook_hold = option_mean(samples.iter().map(|s| s.hook_hold))
            .unwrap_or(avg_outcome);
        let avg_completion = option_mean(samples.iter().map(|s| s.completion))
            .unwrap_or(avg_outcome);

        let outcome_deficit = ((TARGET_OUTCOME - avg_outcome) / 0.34).clamp(0.0, 1.0);
        let hook_deficit = ((0.66 - avg_hook_hold) / 0.32).clamp(0.0, 1.0);
        let completion_deficit = ((0.58 - avg_completion) / 0.30).clamp(0.0, 1.0);
        let jank_pressure = ((avg_metric_jank - 0.42) / 0.30).clamp(0.0, 1.0);

        let mut deltas: BTreeMap<String, f64> = BTreeMap::new();
        let mut propose = |key: &str, value: f64| {
            if value.abs() >= DELTA_FLOOR {
                deltas.insert(key.to_string(), value);
            }
        };
        propose(
            "cut_aggression",
            10.0 * outcome_deficit + 4.0 * hook_deficit - 9.0 * jank_pressure,
        );
        propose(
            "hook_priority_weight",
            0.38 * hook_deficit + 0.12 * outcome_deficit,
        );
        propose(
            "pattern_interrupt_every_sec",
            -5.0 * hook_deficit - 2.0 * outcome_deficit,
        );
        propose("jank_guard", 14.0 * jank_pressure);
        propose(
            "story_coherence_guard",
            6.0 * completion_deficit - 2.0 * outcome_deficit,
        );
        propose("filler_removal_aggression", 8.0 * outcome_deficit);
        propose(
            "pacing_multiplier",
            0.20 * outcome_deficit - 0.08 * jank_pressure,
        );
        propose("silence_min_ms", -120.0 * outcome_deficit);
        propose("crossfade_ms", 90.0 * jank_pressure);

        let confidence = if n == 0 {
            0.0
        } else {
            (0.30 + 0.50 * ((n as f64) + 1.0).log10() / 1.8 + 0.20 * platform_share)
                .clamp(0.0, 0.97)
        };

        let delta_magnitude: f64 = deltas.values().map(|v| v.abs()).sum();
        let uplift = ((TARGET_OUTCOME - avg_outcome) * 0.45
            + delta_magnitude * 0.0024
            + top_mode_margin * 0.55)
            .clamp(0.0, 0.18);

        BrainSnapshot {
            sample_size: n,
            avg_outcome,
            platform_feedback_share: platform_share,
            per_editor_mode,
            per_strategy,
            per_platform,
            top_mode_margin,
            top_mode,
            proposed_deltas: deltas,
            confidence,
            predicted_delta_score: uplift * 100.0,
        }
    }

    /// Apply the snapshot's deltas to the active parameters as a new
    /// active config version.
    async fn apply(
        &self,
        snapshot: &BrainSnapshot,
        trigger: &str,
    ) -> Result<String, crate::storage::StoreError> {
        let active = self
            .versions
            .get_active()
            .ok_or(crate::storage::StoreError::ConfigNotFound)?;
        let mut params = active.params.clone();

        let scale = (0.42 + snapshot.confidence * 0.64).clamp(0.42, 1.0);
        for (key, delta) in &snapshot.proposed_deltas {
            if let Some(current) = params.get(key) {
                params.set(key, current + delta * scale);
            }
        }

        // Adopt the winning editor mode's subtitle styling when its margin
        // is material.
        if snapshot.top_mode_margin > 0.04 {
            if let Some(mode) = snapshot
                .top_mode
                .as_deref()
                .and_then(presets::get)
            {
                params.subtitle_style_mode = mode.params.subtitle_style_mode;
            }
        }

        let version = self
            .versions
            .create(
                params,
                CreateOptions {
                    preset_name: active.preset_name.clone(),
                    activate: true,
                    note: Some(format!(
                        "feedback loop ({trigger}): n={}, confidence={:.2}, predicted=+{:.2}",
                        snapshot.sample_size,
                        snapshot.confidence,
                        snapshot.predicted_delta_score
                    )),
                    actor: Some("feedback_loop".to_string()),
                },
                &self.jobs,
            )
            .await?;
        Ok(version.id)
    }
}

/// Gate order: enabled, auto-apply, samples, confidence, predicted delta,
/// non-empty deltas, cooldown. `force` bypasses enabled/auto-apply/cooldown
/// only.
fn eligibility(
    settings: &crate::types::FeedbackLoopSettings,
    last_applied_at: &Option<chrono::DateTime<Utc>>,
    snapshot: &BrainSnapshot,
    now: chrono::DateTime<Utc>,
    force: bool,
) -> Result<(), String> {
    if !force && !settings.enabled {
        return Err("loop_disabled".to_string());
    }
    if !force && !settings.auto_apply {
        return Err("auto_apply_disabled".to_string());
    }
    if snapshot.sample_size < settings.min_samples as usize {
        return Err(format!(
            "insufficient_samples: {} of {} required",
            snapshot.sample_size, settings.min_samples
        ));
    }
    if snapshot.confidence < settings.min_confidence {
        return Err(format!(
            "confidence_below_threshold: {:.2} < {:.2}",
            snapshot.confidence, settings.min_confidence
        ));
    }
    if snapshot.predicted_delta_score < settings.min_delta_score {
        return Err(format!(
            "predicted_delta_below_threshold: {:.2} < {:.2}",
            snapshot.predicted_delta_score, settings.min_delta_score
        ));
    }
    if snapshot.proposed_deltas.is_empty() {
        return Err("no_proposed_deltas".to_string());
    }
    if !force {
        if let Some(last) = last_applied_at {
            let elapsed = now - *last;
            let cooldown = Duration::minutes(i64::from(settings.cooldown_minutes));
            if elapsed < cooldown {
                return Err(format!(
                    "cooldown_active: {}m of {}m elapsed",
                    elapsed.num_minutes(),
                    settings.cooldown_minutes
                ));
            }
        }
    }
    Ok(())
}

/// Percent-style values above 1 are percentages; everything clamps to [0,1].
fn normalize_signal(v: f64) -> f64 {
    let v = if v > 1.0 { v / 100.0 } else { v };
    v.clamp(0.0, 1.0)
}

/// Weighted-mean outcome over the eight feedback signals. `None` when the
/// bundle carries no usable signal.
fn extract_outcome(fb: &RetentionFeedback) -> Option<f64> {
    let social = match (fb.shares_per_view, fb.likes_per_view, fb.comments_per_view) {
        (None, None, None) => None,
        (s, l, c) => Some(
            (s.map(normalize_signal).unwrap_or(0.0)
                + l.map(normalize_signal).unwrap_or(0.0)
                + c.map(normalize_signal).unwrap_or(0.0))
            .clamp(0.0, 1.0),
        ),
    };
    let signals: [Option<f64>; 8] = [
        fb.watch_pct.map(normalize_signal),
        fb.hook_hold_pct.map(normalize_signal),
        fb.completion_pct.map(normalize_signal),
        fb.ctr.map(normalize_signal),
        social,
        fb.manual_score.map(normalize_signal),
        fb.first30_retention.map(normalize_signal),
        fb.model_retention.map(normalize_signal),
    ];

    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for (value, weight) in signals.iter().zip(SIGNAL_WEIGHTS.iter()) {
        if let Some(v) = value {
            weighted += v * weight;
            weight_total += weight;
        }
    }
    if weight_total > 0.0 {
        Some(weighted / weight_total)
    } else {
        None
    }
}

fn extract_sample(job: &RenderJob) -> Option<OutcomeSample> {
    let fb = job.retention_feedback.as_ref()?;
    let outcome = extract_outcome(fb)?;
    let has_platform_signals = fb.watch_pct.is_some()
        || fb.hook_hold_pct.is_some()
        || fb.completion_pct.is_some()
        || fb.ctr.is_some()
        || fb.first30_retention.is_some();
    Some(OutcomeSample {
        outcome,
        hook_hold: fb.hook_hold_pct.map(normalize_signal),
        completion: fb.completion_pct.map(normalize_signal),
        has_platform_signals,
        editor_mode: job.render_settings.editor_mode.clone(),
        strategy: job.render_settings.strategy.clone(),
        platform: fb
            .platform
            .clone()
            .or_else(|| job.render_settings.platform.clone()),
    })
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

fn option_mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

fn group_average<F>(samples: &[OutcomeSample], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&OutcomeSample) -> Option<String>,
{
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for s in samples {
        if let Some(k) = key(s) {
            let entry = sums.entry(k).or_insert((0.0, 0));
            entry.0 += s.outcome;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use crate::types::{JobStatus, RenderSettings};
    use serde_json::json;

    fn feedback(watch: f64) -> RetentionFeedback {
        RetentionFeedback {
            watch_pct: Some(watch),
            hook_hold_pct: Some(watch * 0.9),
            completion_pct: Some(watch * 0.7),
            ctr: Some(0.05),
            ..Default::default()
        }
    }

    fn completed_job(id: &str, fb: Option<RetentionFeedback>) -> RenderJob {
        RenderJob {
            id: id.to_string(),
            status: JobStatus::Completed,
            user_id: None,
            analysis: json!({"duration": 30.0}),
            transcript: None,
            cut_list: None,
            render_settings: RenderSettings {
                editor_mode: Some("viral_mode".to_string()),
                ..Default::default()
            },
            retention_feedback: fb,
            retention_score: None,
            config_version_id: None,
        }
    }

    async fn setup() -> (FeedbackLoop, Arc<JobStore>, Arc<FeedbackStateStore>, Arc<ConfigVersionStore>) {
        let store = Store::in_memory();
        let states = Arc::new(FeedbackStateStore::open(&store));
        let jobs = Arc::new(JobStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        let versions = Arc::new(ConfigVersionStore::open(&store));
        versions.ensure_default(&jobs).await.unwrap();
        (
            FeedbackLoop::new(states.clone(), jobs.clone(), metrics, versions.clone()),
            jobs,
            states,
            versions,
        )
    }

    #[test]
    fn percent_values_above_one_divide_by_100() {
        assert_eq!(normalize_signal(45.0), 0.45);
        assert_eq!(normalize_signal(0.45), 0.45);
        assert_eq!(normalize_signal(250.0), 1.0);
    }

    #[test]
    fn outcome_is_weighted_mean_over_present_signals() {
        let fb = RetentionFeedback {
            watch_pct: Some(0.5),
            ctr: Some(0.1),
            ..Default::default()
        };
        // (0.5*0.28 + 0.1*0.14) / (0.28 + 0.14)
        let expected = (0.5 * 0.28 + 0.1 * 0.14) / 0.42;
        assert!((extract_outcome(&fb).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_feedback_bundle_is_skipped() {
        assert!(extract_outcome(&RetentionFeedback::default()).is_none());
    }

    #[tokio::test]
    async fn below_min_samples_skips_and_updates_runtime() {
        let (feedback_loop, jobs, states, _versions) = setup().await;
        for i in 0..4 {
            jobs.upsert(completed_job(&format!("j{i}"), Some(feedback(42.0))))
                .await;
        }
        let report = feedback_loop.run("manual", false).await;
        assert!(!report.applied);
        assert!(
            report.reason.contains("insufficient_samples"),
            "reason: {}",
            report.reason
        );
        let state = states.load().await;
        assert!(state.runtime.last_run_at.is_some());
        assert_eq!(state.runtime.last_run_trigger.as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn poor_outcomes_apply_with_force() {
        let (feedback_loop, jobs, _states, versions) = setup().await;
        let before = versions.get_active().unwrap();
        for i in 0..12 {
            jobs.upsert(completed_job(&format!("j{i}"), Some(feedback(30.0))))
                .await;
        }
        let report = feedback_loop.run("manual", true).await;
        assert!(report.applied, "reason: {}", report.reason);
        let after = versions.get_active().unwrap();
        assert_ne!(before.id, after.id);
        // Poor outcomes push cut aggression up.
        assert!(after.params.cut_aggression > before.params.cut_aggression);
    }

    #[tokio::test]
    async fn applied_params_stay_in_bounds() {
        let (feedback_loop, jobs, _states, versions) = setup().await;
        for i in 0..20 {
            jobs.upsert(completed_job(&format!("j{i}"), Some(feedback(1.0))))
                .await;
        }
        let report = feedback_loop.run("manual", true).await;
        if report.applied {
            let active = versions.get_active().unwrap();
            let raw = serde_json::to_value(&active.params).unwrap();
            let reparsed = crate::types::RetentionParams::parse(&raw).unwrap();
            assert_eq!(reparsed, active.params);
        }
    }

    #[tokio::test]
    async fn cooldown_blocks_second_apply() {
        let (feedback_loop, jobs, _states, _versions) = setup().await;
        for i in 0..12 {
            jobs.upsert(completed_job(&format!("j{i}"), Some(feedback(30.0))))
                .await;
        }
        let first = feedback_loop.run("manual", true).await;
        assert!(first.applied);
        let second = feedback_loop.run("manual", false).await;
        assert!(!second.applied);
        assert!(
            second.reason.contains("cooldown_active"),
            "reason: {}",
            second.reason
        );
    }

    #[tokio::test]
    async fn jobs_without_feedback_are_skipped() {
        let (feedback_loop, jobs, _states, _versions) = setup().await;
        for i in 0..10 {
            jobs.upsert(completed_job(&format!("j{i}"), None)).await;
        }
        let report = feedback_loop.run("scheduled", false).await;
        assert!(!report.applied);
        assert_eq!(report.snapshot.unwrap().sample_size, 0);
    }
}
