//! Feedback loop state singleton
//!
//! One row keyed by the literal `"global"`. Settings clamp on every save.

use tokio::sync::RwLock;

use crate::types::FeedbackLoopState;

use super::Store;

const GLOBAL_KEY: &[u8] = b"global";

pub struct FeedbackStateStore {
    tree: Option<sled::Tree>,
    cache: RwLock<FeedbackLoopState>,
}

impl FeedbackStateStore {
    pub fn open(store: &Store) -> Self {
        let tree = store.tree("feedback_loop_state");
        let mut state = FeedbackLoopState::default();
        if let Some(ref tree) = tree {
            if let Ok(Some(bytes)) = tree.get(GLOBAL_KEY) {
                if let Ok(loaded) = serde_json::from_slice::<FeedbackLoopState>(&bytes) {
                    state = loaded;
                }
            }
        }
        state.settings.clamp();
        Self {
            tree,
            cache: RwLock::new(state),
        }
    }

    pub async fn load(&self) -> FeedbackLoopState {
        self.cache.read().await.clone()
    }

    pub async fn save(&self, mut state: FeedbackLoopState) {
        state.settings.clamp();
        if let Some(ref tree) = self.tree {
            match serde_json::to_vec(&state) {
                Ok(bytes) => {
                    if let Err(e) = tree.insert(GLOBAL_KEY, bytes) {
                        tracing::warn!(error = %e, "feedback state not persisted");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "feedback state serialization failed"),
            }
        }
        *self.cache.write().await = state;
    }
}
