//! Persistent storage
//!
//! One sled database with a named tree per logical table. "No database
//! available" is a first-class mode: every store keeps an in-memory cache
//! that mirrors its tree and becomes authoritative for the process lifetime
//! when the backend is absent. All writes go through a single writer lock
//! per store.

pub mod config_versions;
pub mod experiments;
pub mod feedback_state;
pub mod jobs;
pub mod metrics;
pub mod security_events;

use std::path::Path;

use thiserror::Error;

pub use config_versions::ConfigVersionStore;
pub use experiments::ExperimentStore;
pub use feedback_state::FeedbackStateStore;
pub use jobs::JobStore;
pub use metrics::MetricStore;
pub use security_events::SecurityEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("config_not_found")]
    ConfigNotFound,
    #[error("config_create_failed: {0}")]
    CreateFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Handle to the sled database, or the in-memory mode marker.
#[derive(Clone)]
pub struct Store {
    db: Option<sled::Db>,
}

impl Store {
    /// Open the database at `path`. A failed open degrades to in-memory
    /// mode instead of failing startup.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        match sled::open(path.as_ref()) {
            Ok(db) => Self { db: Some(db) },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.as_ref().display(),
                    "sled open failed; running with in-memory state only"
                );
                Self { db: None }
            }
        }
    }

    /// Pure in-memory mode (tests, and the degraded path).
    pub fn in_memory() -> Self {
        Self { db: None }
    }

    /// Whether a persistent backend is attached.
    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }

    /// Open a named tree, or `None` in in-memory mode.
    pub(crate) fn tree(&self, name: &str) -> Option<sled::Tree> {
        let db = self.db.as_ref()?;
        match db.open_tree(name) {
            Ok(tree) => Some(tree),
            Err(e) => {
                tracing::warn!(error = %e, tree = name, "failed to open tree");
                None
            }
        }
    }
}

/// Big-endian millisecond timestamp + id suffix: sorts chronologically and
/// stays unique under same-millisecond inserts.
pub(crate) fn time_key(at: chrono::DateTime<chrono::Utc>, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&(at.timestamp_millis().max(0) as u64).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}
