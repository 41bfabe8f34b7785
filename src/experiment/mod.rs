//! Experiment allocator
//!
//! Multi-arm assignment for new jobs with recency-windowed outcome
//! aggregation. Starting an experiment implicitly stops any other running
//! one; allocation percentages renormalize to sum to 100. Arm selection is
//! weighted-random over the allocation via a cumulative cursor, with the RNG
//! injected so tests stay reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{ConfigVersionStore, ExperimentStore, MetricStore, StoreError};
use crate::types::{
    ArmOutcome, Experiment, ExperimentArm, ExperimentStatus, ExperimentStatusReport,
};

/// Minimum samples before a winner is suggested.
const WINNER_MIN_SAMPLES: usize = 5;

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("experiment_requires_2_to_4_valid_arms")]
    ArmCount,
    #[error("invalid_config_version:{0}")]
    InvalidConfigVersion(String),
    #[error("no_experiment")]
    NoExperiment,
    #[error("algorithm_config_unavailable")]
    NoActiveConfig,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Request to start an experiment.
#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub name: String,
    pub arms: Vec<ExperimentArm>,
    #[serde(default)]
    pub allocation: BTreeMap<String, f64>,
    #[serde(default = "default_reward_metric")]
    pub reward_metric: String,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_reward_metric() -> String {
    "score_total".to_string()
}

/// Where a new job's config version came from.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub config_version_id: String,
    pub source: SelectionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    ActiveConfig,
    ExperimentArm,
}

pub struct Allocator {
    experiments: Arc<ExperimentStore>,
    versions: Arc<ConfigVersionStore>,
    metrics: Arc<MetricStore>,
}

impl Allocator {
    pub fn new(
        experiments: Arc<ExperimentStore>,
        versions: Arc<ConfigVersionStore>,
        metrics: Arc<MetricStore>,
    ) -> Self {
        Self {
            experiments,
            versions,
            metrics,
        }
    }

    /// Validate arms, normalize the allocation, stop any running experiment
    /// and start this one.
    pub async fn start(&self, req: StartRequest) -> Result<Experiment, AllocError> {
        if req.arms.len() < 2 || req.arms.len() > 4 {
            return Err(AllocError::ArmCount);
        }
        for arm in &req.arms {
            if self.versions.get_by_id(&arm.config_version_id).await.is_none() {
                return Err(AllocError::InvalidConfigVersion(
                    arm.config_version_id.clone(),
                ));
            }
        }

        let arms: Vec<ExperimentArm> = req
            .arms
            .into_iter()
            .map(|mut arm| {
                arm.weight = if arm.weight.is_finite() {
                    arm.weight.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                arm
            })
            .collect();

        let allocation = normalize_allocation(&arms, &req.allocation);

        let experiment = Experiment {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            created_by: req.created_by,
            name: req.name,
            status: ExperimentStatus::Running,
            arms,
            allocation,
            reward_metric: req.reward_metric,
            start_at: Some(req.start_at.unwrap_or_else(Utc::now)),
            end_at: req.end_at,
        };

        // save() stops any other running experiment in the same write.
        self.experiments.save(experiment.clone()).await?;
        tracing::info!(id = %experiment.id, name = %experiment.name, "experiment started");
        Ok(experiment)
    }

    /// Stop the running experiment. Fails with `no_experiment` when none is
    /// running.
    pub async fn stop(&self) -> Result<Experiment, AllocError> {
        let mut experiment = self
            .experiments
            .running()
            .await
            .ok_or(AllocError::NoExperiment)?;
        experiment.status = ExperimentStatus::Stopped;
        experiment.end_at.get_or_insert_with(Utc::now);
        self.experiments.save(experiment.clone()).await?;
        tracing::info!(id = %experiment.id, "experiment stopped");
        Ok(experiment)
    }

    /// Status of the running (or most recent) experiment with per-arm
    /// aggregated outcomes over `[start_at, end_at ?? now]`.
    pub async fn status(&self) -> Result<ExperimentStatusReport, AllocError> {
        let experiment = match self.experiments.running().await {
            Some(e) => e,
            None => self.experiments.latest().await.ok_or(AllocError::NoExperiment)?,
        };

        let window_start = experiment
            .start_at
            .unwrap_or(experiment.created_at);
        let window_end = experiment.end_at.unwrap_or_else(Utc::now);

        let mut arms = Vec::with_capacity(experiment.arms.len());
        for arm in &experiment.arms {
            let rows = self
                .metrics
                .for_config_in_range(&arm.config_version_id, window_start, window_end)
                .await;
            let scores: Vec<f64> = rows.iter().map(|m| m.score_total).collect();
            let n = scores.len();
            let avg = if n > 0 {
                scores.iter().sum::<f64>() / n as f64
            } else {
                0.0
            };
            let stdev = population_stdev(&scores, avg);
            arms.push(ArmOutcome {
                config_version_id: arm.config_version_id.clone(),
                allocation_pct: experiment
                    .allocation
                    .get(&arm.config_version_id)
                    .copied()
                    .unwrap_or(0.0),
                sample_count: n,
                avg_score: avg,
                score_stdev: stdev,
                confidence: arm_confidence(n, stdev),
            });
        }

        // avg desc, then confidence desc, then samples desc.
        arms.sort_by(|a, b| {
            b.avg_score
                .partial_cmp(&a.avg_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.sample_count.cmp(&a.sample_count))
        });

        let suggested_winner = arms
            .first()
            .filter(|top| top.sample_count >= WINNER_MIN_SAMPLES)
            .map(|top| top.config_version_id.clone());

        Ok(ExperimentStatusReport {
            experiment,
            arms,
            suggested_winner,
        })
    }

    /// Pick a config version for a new job: a weighted-random arm when an
    /// experiment is running now, the active version otherwise.
    pub async fn select_for_new_job(
        &self,
        rng: &mut StdRng,
    ) -> Result<Selection, AllocError> {
        let now = Utc::now();
        if let Some(experiment) = self.experiments.running().await {
            if experiment.is_running_now(now) {
                let id = sample_allocation(&experiment.allocation, rng);
                if let Some(config_version_id) = id {
                    return Ok(Selection {
                        config_version_id,
                        source: SelectionSource::ExperimentArm,
                        experiment_id: Some(experiment.id),
                    });
                }
            }
        }
        let active = self.versions.get_active().ok_or(AllocError::NoActiveConfig)?;
        Ok(Selection {
            config_version_id: active.id,
            source: SelectionSource::ActiveConfig,
            experiment_id: None,
        })
    }
}

/// Renormalize the requested allocation over the arm ids to sum to 100.
/// A zero (or missing) total yields equal shares.
fn normalize_allocation(
    arms: &[ExperimentArm],
    requested: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let mut raw: BTreeMap<String, f64> = BTreeMap::new();
    for arm in arms {
        let v = requested
            .get(&arm.config_version_id)
            .copied()
            .unwrap_or(0.0);
        raw.insert(
            arm.config_version_id.clone(),
            if v.is_finite() { v.max(0.0) } else { 0.0 },
        );
    }
    let total: f64 = raw.values().sum();
    if total <= 0.0 {
        let share = 100.0 / arms.len() as f64;
        return arms
            .iter()
            .map(|a| (a.config_version_id.clone(), share))
            .collect();
    }
    raw.into_iter()
        .map(|(id, v)| (id, v / total * 100.0))
        .collect()
}

/// Cumulative-cursor weighted sampling over allocation percentages.
fn sample_allocation(
    allocation: &BTreeMap<String, f64>,
    rng: &mut StdRng,
) -> Option<String> {
    let total: f64 = allocation.values().filter(|v| v.is_finite()).sum();
    if total <= 0.0 {
        return None;
    }
    let target = rng.gen_range(0.0..total);
    let mut cursor = 0.0;
    for (id, pct) in allocation {
        cursor += pct.max(0.0);
        if target < cursor {
            return Some(id.clone());
        }
    }
    allocation.keys().next_back().cloned()
}

/// Confidence in one arm's aggregate: sample-size signal discounted by
/// score spread.
fn arm_confidence(n: usize, stdev: f64) -> f64 {
    let sample_signal = ((n as f64) + 1.0).log10() / 2.4;
    let spread_penalty = (1.0 - stdev / 24.0).clamp(0.0, 1.0);
    (0.35 + 0.65 * sample_signal * spread_penalty).clamp(0.0, 1.0)
}

fn population_stdev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config_versions::CreateOptions;
    use crate::storage::{JobStore, Store};
    use crate::types::RetentionParams;
    use rand::SeedableRng;

    async fn setup() -> (Allocator, Arc<ConfigVersionStore>, Arc<JobStore>) {
        let store = Store::in_memory();
        let versions = Arc::new(ConfigVersionStore::open(&store));
        let jobs = Arc::new(JobStore::open(&store));
        let experiments = Arc::new(ExperimentStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        versions.ensure_default(&jobs).await.unwrap();
        (
            Allocator::new(experiments, versions.clone(), metrics),
            versions,
            jobs,
        )
    }

    async fn extra_version(
        versions: &ConfigVersionStore,
        jobs: &JobStore,
    ) -> String {
        versions
            .create(
                RetentionParams::default(),
                CreateOptions::default(),
                jobs,
            )
            .await
            .unwrap()
            .id
    }

    fn arms(ids: &[&str]) -> Vec<ExperimentArm> {
        ids.iter()
            .map(|id| ExperimentArm {
                config_version_id: (*id).to_string(),
                weight: 0.5,
            })
            .collect()
    }

    #[tokio::test]
    async fn start_rejects_bad_arm_counts() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let err = allocator
            .start(StartRequest {
                name: "solo".into(),
                arms: arms(&[&a]),
                allocation: BTreeMap::new(),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AllocError::ArmCount));
    }

    #[tokio::test]
    async fn start_rejects_unknown_arm_id() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let err = allocator
            .start(StartRequest {
                name: "ghost".into(),
                arms: arms(&[&a, "missing-id"]),
                allocation: BTreeMap::new(),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfigVersion(id) if id == "missing-id"));
    }

    #[tokio::test]
    async fn allocation_normalizes_to_100() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        let exp = allocator
            .start(StartRequest {
                name: "norm".into(),
                arms: arms(&[&a, &b]),
                allocation: BTreeMap::from([(a.clone(), 3.0), (b.clone(), 1.0)]),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap();
        let total: f64 = exp.allocation.values().sum();
        assert!((total - 100.0).abs() < 0.01);
        assert!((exp.allocation[&a] - 75.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn zero_total_allocation_gets_equal_shares() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        let exp = allocator
            .start(StartRequest {
                name: "equal".into(),
                arms: arms(&[&a, &b]),
                allocation: BTreeMap::new(),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap();
        assert!((exp.allocation[&a] - 50.0).abs() < 0.01);
        assert!((exp.allocation[&b] - 50.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn starting_second_experiment_stops_first() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        let req = |name: &str| StartRequest {
            name: name.into(),
            arms: arms(&[&a, &b]),
            allocation: BTreeMap::new(),
            reward_metric: "score_total".into(),
            start_at: None,
            end_at: None,
            created_by: None,
        };
        let first = allocator.start(req("first")).await.unwrap();
        let second = allocator.start(req("second")).await.unwrap();
        let status = allocator.status().await.unwrap();
        assert_eq!(status.experiment.id, second.id);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn zero_weight_arm_never_selected() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        allocator
            .start(StartRequest {
                name: "one-sided".into(),
                arms: arms(&[&a, &b]),
                allocation: BTreeMap::from([(a.clone(), 0.0), (b.clone(), 100.0)]),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let selection = allocator.select_for_new_job(&mut rng).await.unwrap();
            assert_eq!(selection.config_version_id, b);
            assert_eq!(selection.source, SelectionSource::ExperimentArm);
        }
    }

    #[tokio::test]
    async fn no_running_experiment_selects_active_config() {
        let (allocator, versions, _jobs) = setup().await;
        let active = versions.get_active().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let selection = allocator.select_for_new_job(&mut rng).await.unwrap();
        assert_eq!(selection.config_version_id, active.id);
        assert_eq!(selection.source, SelectionSource::ActiveConfig);
    }

    #[tokio::test]
    async fn selection_stays_within_arms_or_active() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        allocator
            .start(StartRequest {
                name: "bounded".into(),
                arms: arms(&[&a, &b]),
                allocation: BTreeMap::from([(a.clone(), 30.0), (b.clone(), 70.0)]),
                reward_metric: "score_total".into(),
                start_at: None,
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let s = allocator.select_for_new_job(&mut rng).await.unwrap();
            assert!(s.config_version_id == a || s.config_version_id == b);
        }
    }

    #[tokio::test]
    async fn expired_window_falls_back_to_active() {
        let (allocator, versions, jobs) = setup().await;
        let a = extra_version(&versions, &jobs).await;
        let b = extra_version(&versions, &jobs).await;
        allocator
            .start(StartRequest {
                name: "expired".into(),
                arms: arms(&[&a, &b]),
                allocation: BTreeMap::new(),
                reward_metric: "score_total".into(),
                start_at: Some(Utc::now() - chrono::Duration::hours(2)),
                end_at: Some(Utc::now() - chrono::Duration::hours(1)),
                created_by: None,
            })
            .await
            .unwrap();
        let active = versions.get_active().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let s = allocator.select_for_new_job(&mut rng).await.unwrap();
        assert_eq!(s.config_version_id, active.id);
        assert_eq!(s.source, SelectionSource::ActiveConfig);
    }

    #[test]
    fn confidence_grows_with_samples_and_shrinks_with_spread() {
        let low_n = arm_confidence(2, 5.0);
        let high_n = arm_confidence(50, 5.0);
        assert!(high_n > low_n);
        let tight = arm_confidence(50, 2.0);
        let wide = arm_confidence(50, 20.0);
        assert!(tight > wide);
    }
}
