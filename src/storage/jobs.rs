//! External job table access
//!
//! The `jobs` table is owned by the upstream pipeline. This store reads it
//! (sample footage, feedback loop lookback) and performs exactly one write:
//! re-pointing in-flight jobs at a newly activated config version.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use crate::types::{JobStatus, RenderJob};

use super::Store;

/// In-memory recency mirror size.
const JOB_CACHE_LIMIT: usize = 1000;

struct JobCache {
    /// Insertion-ordered mirror, newest at the back.
    ring: VecDeque<RenderJob>,
    /// id → sled sequence key, for targeted updates.
    seq_by_id: HashMap<String, u64>,
    next_seq: u64,
}

pub struct JobStore {
    tree: Option<sled::Tree>,
    cache: RwLock<JobCache>,
}

impl JobStore {
    pub fn open(store: &Store) -> Self {
        let tree = store.tree("jobs");
        let mut ring = VecDeque::new();
        let mut seq_by_id = HashMap::new();
        let mut next_seq = 0u64;
        if let Some(ref tree) = tree {
            for item in tree.iter() {
                if let Ok((key, value)) = item {
                    if let (Ok(seq), Ok(job)) = (
                        key.as_ref().try_into().map(u64::from_be_bytes),
                        serde_json::from_slice::<RenderJob>(&value),
                    ) {
                        seq_by_id.insert(job.id.clone(), seq);
                        next_seq = next_seq.max(seq + 1);
                        ring.push_back(job);
                        if ring.len() > JOB_CACHE_LIMIT {
                            ring.pop_front();
                        }
                    }
                }
            }
        }
        Self {
            tree,
            cache: RwLock::new(JobCache {
                ring,
                seq_by_id,
                next_seq,
            }),
        }
    }

    /// Insert or replace a job row (used by the pipeline boundary and tests).
    pub async fn upsert(&self, job: RenderJob) {
        let mut cache = self.cache.write().await;
        let seq = match cache.seq_by_id.get(&job.id).copied() {
            Some(seq) => seq,
            None => {
                let seq = cache.next_seq;
                cache.next_seq += 1;
                cache.seq_by_id.insert(job.id.clone(), seq);
                seq
            }
        };
        if let Some(ref tree) = self.tree {
            match serde_json::to_vec(&job) {
                Ok(bytes) => {
                    if let Err(e) = tree.insert(seq.to_be_bytes(), bytes) {
                        tracing::warn!(error = %e, job = %job.id, "job upsert not persisted");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, job = %job.id, "job serialization failed")
                }
            }
        }
        if let Some(existing) = cache.ring.iter_mut().find(|j| j.id == job.id) {
            *existing = job;
        } else {
            cache.ring.push_back(job);
            if cache.ring.len() > JOB_CACHE_LIMIT {
                cache.ring.pop_front();
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<RenderJob> {
        let cache = self.cache.read().await;
        if let Some(job) = cache.ring.iter().find(|j| j.id == id) {
            return Some(job.clone());
        }
        let seq = *cache.seq_by_id.get(id)?;
        drop(cache);
        let tree = self.tree.as_ref()?;
        let bytes = tree.get(seq.to_be_bytes()).ok()??;
        serde_json::from_slice(&bytes).ok()
    }

    /// Newest-first job listing.
    pub async fn recent(&self, limit: usize) -> Vec<RenderJob> {
        let cache = self.cache.read().await;
        cache.ring.iter().rev().take(limit).cloned().collect()
    }

    /// Newest-first completed jobs (feedback loop lookback).
    pub async fn recent_completed(&self, limit: usize) -> Vec<RenderJob> {
        let cache = self.cache.read().await;
        cache
            .ring
            .iter()
            .rev()
            .filter(|j| j.status == JobStatus::Completed)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Point every in-flight job (queued/uploading/analyzing/rendering) at
    /// the newly activated config version.
    pub async fn repoint_active_jobs(&self, config_version_id: &str) {
        let mut cache = self.cache.write().await;
        let mut updated = 0usize;
        let mut writes: Vec<(u64, RenderJob)> = Vec::new();
        let JobCache {
            ring, seq_by_id, ..
        } = &mut *cache;
        for job in ring.iter_mut() {
            if job.status.is_active() {
                job.config_version_id = Some(config_version_id.to_string());
                updated += 1;
                if let Some(seq) = seq_by_id.get(&job.id) {
                    writes.push((*seq, job.clone()));
                }
            }
        }
        if let Some(ref tree) = self.tree {
            for (seq, job) in writes {
                if let Ok(bytes) = serde_json::to_vec(&job) {
                    if let Err(e) = tree.insert(seq.to_be_bytes(), bytes) {
                        tracing::warn!(error = %e, job = %job.id, "job repoint not persisted");
                    }
                }
            }
        }
        if updated > 0 {
            tracing::info!(count = updated, version = %config_version_id, "re-pointed in-flight jobs");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(id: &str, status: JobStatus) -> RenderJob {
        RenderJob {
            id: id.to_string(),
            status,
            user_id: None,
            analysis: json!({}),
            transcript: None,
            cut_list: None,
            render_settings: Default::default(),
            retention_feedback: None,
            retention_score: None,
            config_version_id: None,
        }
    }

    #[tokio::test]
    async fn repoint_touches_only_active_states() {
        let store = Store::in_memory();
        let jobs = JobStore::open(&store);
        jobs.upsert(job("a", JobStatus::Queued)).await;
        jobs.upsert(job("b", JobStatus::Completed)).await;
        jobs.upsert(job("c", JobStatus::Rendering)).await;
        jobs.repoint_active_jobs("v1").await;

        assert_eq!(
            jobs.get("a").await.unwrap().config_version_id.as_deref(),
            Some("v1")
        );
        assert_eq!(jobs.get("b").await.unwrap().config_version_id, None);
        assert_eq!(
            jobs.get("c").await.unwrap().config_version_id.as_deref(),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn recent_completed_filters_and_orders() {
        let store = Store::in_memory();
        let jobs = JobStore::open(&store);
        for i in 0..5 {
            let status = if i % 2 == 0 {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            jobs.upsert(job(&format!("j{i}"), status)).await;
        }
        let completed = jobs.recent_completed(10).await;
        assert_eq!(completed.len(), 3);
        assert_eq!(completed[0].id, "j4"); // newest first
    }
}
