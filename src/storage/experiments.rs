//! Experiment persistence
//!
//! Few rows, fully cached. The "at most one running" invariant is enforced
//! here: saving a running experiment stops every other running row in the
//! same write.

use tokio::sync::RwLock;

use crate::types::{Experiment, ExperimentStatus};

use super::{time_key, Store, StoreError};

pub struct ExperimentStore {
    tree: Option<sled::Tree>,
    /// All experiments, newest first.
    cache: RwLock<Vec<Experiment>>,
}

impl ExperimentStore {
    pub fn open(store: &Store) -> Self {
        let tree = store.tree("experiments");
        let mut cache = Vec::new();
        if let Some(ref tree) = tree {
            for item in tree.iter().rev() {
                if let Ok((_, value)) = item {
                    if let Ok(exp) = serde_json::from_slice::<Experiment>(&value) {
                        cache.push(exp);
                    }
                }
            }
        }
        Self {
            tree,
            cache: RwLock::new(cache),
        }
    }

    /// Insert or replace an experiment. When the row is `Running`, every
    /// other running row is stopped in the same batch.
    pub async fn save(&self, experiment: Experiment) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;

        let mut stopped: Vec<Experiment> = Vec::new();
        if experiment.status == ExperimentStatus::Running {
            for other in cache.iter_mut() {
                if other.id != experiment.id && other.status == ExperimentStatus::Running {
                    other.status = ExperimentStatus::Stopped;
                    other.end_at.get_or_insert_with(chrono::Utc::now);
                    stopped.push(other.clone());
                }
            }
        }

        if let Some(ref tree) = self.tree {
            let mut batch = sled::Batch::default();
            for row in stopped.iter().chain(std::iter::once(&experiment)) {
                batch.insert(
                    time_key(row.created_at, &row.id),
                    serde_json::to_vec(row)?,
                );
            }
            tree.apply_batch(batch)?;
        }

        if let Some(existing) = cache.iter_mut().find(|e| e.id == experiment.id) {
            *existing = experiment;
        } else {
            cache.insert(0, experiment);
        }
        Ok(())
    }

    /// The running experiment, if any.
    pub async fn running(&self) -> Option<Experiment> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .find(|e| e.status == ExperimentStatus::Running)
            .cloned()
    }

    /// Newest experiment regardless of status (status endpoint after stop).
    pub async fn latest(&self) -> Option<Experiment> {
        let cache = self.cache.read().await;
        cache.first().cloned()
    }

    pub async fn get(&self, id: &str) -> Option<Experiment> {
        let cache = self.cache.read().await;
        cache.iter().find(|e| e.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExperimentArm;
    use std::collections::BTreeMap;

    fn experiment(id: &str, status: ExperimentStatus) -> Experiment {
        Experiment {
            id: id.to_string(),
            created_at: chrono::Utc::now(),
            created_by: None,
            name: format!("exp-{id}"),
            status,
            arms: vec![
                ExperimentArm {
                    config_version_id: "a".into(),
                    weight: 0.5,
                },
                ExperimentArm {
                    config_version_id: "b".into(),
                    weight: 0.5,
                },
            ],
            allocation: BTreeMap::from([("a".to_string(), 50.0), ("b".to_string(), 50.0)]),
            reward_metric: "score_total".to_string(),
            start_at: None,
            end_at: None,
        }
    }

    #[tokio::test]
    async fn saving_running_stops_others() {
        let store = Store::in_memory();
        let experiments = ExperimentStore::open(&store);
        experiments
            .save(experiment("one", ExperimentStatus::Running))
            .await
            .unwrap();
        experiments
            .save(experiment("two", ExperimentStatus::Running))
            .await
            .unwrap();

        let running = experiments.running().await.unwrap();
        assert_eq!(running.id, "two");
        let one = experiments.get("one").await.unwrap();
        assert_eq!(one.status, ExperimentStatus::Stopped);
        assert!(one.end_at.is_some());
    }
}
