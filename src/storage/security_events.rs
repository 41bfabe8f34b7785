//! Security event log
//!
//! Append-only auth failures and suspicious requests. A bounded in-memory
//! ring (≤500, oldest discarded) backs the tree.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{time_key, Store};

/// Bound on the in-memory security event ring.
pub const SECURITY_RING_LIMIT: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub event_type: String,
    pub meta: serde_json::Value,
}

pub struct SecurityEventStore {
    tree: Option<sled::Tree>,
    ring: RwLock<VecDeque<SecurityEvent>>,
}

impl SecurityEventStore {
    pub fn open(store: &Store) -> Self {
        Self {
            tree: store.tree("security_events"),
            ring: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, event_type: &str, meta: serde_json::Value) {
        let event = SecurityEvent {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            event_type: event_type.to_string(),
            meta,
        };
        tracing::warn!(event = %event.event_type, meta = %event.meta, "security event");
        if let Some(ref tree) = self.tree {
            if let Ok(bytes) = serde_json::to_vec(&event) {
                if let Err(e) = tree.insert(time_key(event.created_at, &event.id), bytes) {
                    tracing::warn!(error = %e, "security event not persisted");
                }
            }
        }
        let mut ring = self.ring.write().await;
        if ring.len() >= SECURITY_RING_LIMIT {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    pub async fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let ring = self.ring.read().await;
        ring.iter().rev().take(limit).cloned().collect()
    }
}
