//! Render quality metric persistence
//!
//! Append-only rows keyed by creation time. Persistence failure degrades to
//! an in-memory ring (≤5000 rows, oldest discarded) — the caller always gets
//! its payload back.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::types::RenderQualityMetric;

use super::{time_key, Store};

/// Bound on the in-memory metric ring.
pub const METRIC_RING_LIMIT: usize = 5000;

pub struct MetricStore {
    tree: Option<sled::Tree>,
    /// Newest at the back. Mirror of the tree tail; authoritative when the
    /// backend is absent or a write fails.
    ring: RwLock<VecDeque<RenderQualityMetric>>,
}

impl MetricStore {
    pub fn open(store: &Store) -> Self {
        let tree = store.tree("render_quality_metrics");
        let mut ring = VecDeque::new();
        if let Some(ref tree) = tree {
            let mut newest: Vec<RenderQualityMetric> = Vec::new();
            for item in tree.iter().rev().take(METRIC_RING_LIMIT) {
                if let Ok((_, value)) = item {
                    if let Ok(m) = serde_json::from_slice(&value) {
                        newest.push(m);
                    }
                }
            }
            for m in newest.into_iter().rev() {
                ring.push_back(m);
            }
        }
        Self {
            tree,
            ring: RwLock::new(ring),
        }
    }

    /// Append one metric row. Never fails: a failed sled write logs and the
    /// ring keeps the row.
    pub async fn insert(&self, metric: RenderQualityMetric) {
        if let Some(ref tree) = self.tree {
            match serde_json::to_vec(&metric) {
                Ok(bytes) => {
                    if let Err(e) =
                        tree.insert(time_key(metric.created_at, &metric.id), bytes)
                    {
                        tracing::warn!(
                            error = %e,
                            job = %metric.job_id,
                            "metric not persisted; kept in memory ring only"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, job = %metric.job_id, "metric serialization failed");
                }
            }
        }
        let mut ring = self.ring.write().await;
        if ring.len() >= METRIC_RING_LIMIT {
            ring.pop_front();
        }
        ring.push_back(metric);
    }

    /// Newest-first listing.
    pub async fn recent(&self, limit: usize) -> Vec<RenderQualityMetric> {
        let ring = self.ring.read().await;
        ring.iter().rev().take(limit).cloned().collect()
    }

    /// Rows created in `[start, end]`, newest first.
    pub async fn in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Vec<RenderQualityMetric> {
        let ring = self.ring.read().await;
        ring.iter()
            .rev()
            .filter(|m| m.created_at >= start && m.created_at <= end)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Rows for one config version inside a window, newest first.
    pub async fn for_config_in_range(
        &self,
        config_version_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RenderQualityMetric> {
        let ring = self.ring.read().await;
        ring.iter()
            .rev()
            .filter(|m| {
                m.config_version_id == config_version_id
                    && m.created_at >= start
                    && m.created_at <= end
            })
            .cloned()
            .collect()
    }

    /// Delete rows whose config version was removed (FK cascade).
    pub async fn cascade_delete_config(&self, config_version_id: &str) {
        if let Some(ref tree) = self.tree {
            let mut doomed = Vec::new();
            for item in tree.iter() {
                if let Ok((key, value)) = item {
                    if let Ok(m) = serde_json::from_slice::<RenderQualityMetric>(&value) {
                        if m.config_version_id == config_version_id {
                            doomed.push(key.to_vec());
                        }
                    }
                }
            }
            for key in doomed {
                let _ = tree.remove(key);
            }
        }
        let mut ring = self.ring.write().await;
        ring.retain(|m| m.config_version_id != config_version_id);
    }
}
