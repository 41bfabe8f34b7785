//! A/B experiment rows and arm aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Experiment lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Stopped,
}

/// One enrolled config version with a sampling weight in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentArm {
    pub config_version_id: String,
    pub weight: f64,
}

/// An experiment row. `allocation` maps config version id to a percentage;
/// stored allocations always sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub name: String,
    pub status: ExperimentStatus,
    pub arms: Vec<ExperimentArm>,
    pub allocation: BTreeMap<String, f64>,
    pub reward_metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

impl Experiment {
    /// Whether the experiment is running *now*: status is `Running` and
    /// `now` lies inside the (open-ended) window.
    pub fn is_running_now(&self, now: DateTime<Utc>) -> bool {
        if self.status != ExperimentStatus::Running {
            return false;
        }
        if let Some(start) = self.start_at {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end_at {
            if now > end {
                return false;
            }
        }
        true
    }
}

/// Aggregated outcomes for one arm over the experiment window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmOutcome {
    pub config_version_id: String,
    pub allocation_pct: f64,
    pub sample_count: usize,
    pub avg_score: f64,
    pub score_stdev: f64,
    pub confidence: f64,
}

/// Status report for the current (or most recent) experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentStatusReport {
    pub experiment: Experiment,
    pub arms: Vec<ArmOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_winner: Option<String>,
}
