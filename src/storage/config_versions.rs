//! Config version store
//!
//! Versioned retention parameter sets with a single active row. The sled
//! tree `config_versions` is keyed by creation time (big-endian millis + id)
//! so reverse iteration yields newest-first. A cache of the newest rows
//! mirrors the tree; when the backend is absent the cache is authoritative.
//! The active version is also published through an `ArcSwap` handle for
//! lock-free reads on the scoring path.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::RwLock;

use crate::presets;
use crate::types::{ConfigVersion, RetentionParams};

use super::{time_key, JobStore, Store, StoreError};

/// Newest rows mirrored in memory.
const CACHE_LIMIT: usize = 64;

/// Hard cap on `list` reads.
pub const LIST_LIMIT_MAX: usize = 200;

/// Options for [`ConfigVersionStore::create`].
#[derive(Debug, Default, Clone)]
pub struct CreateOptions {
    pub preset_name: Option<String>,
    pub activate: bool,
    pub note: Option<String>,
    pub actor: Option<String>,
}

pub struct ConfigVersionStore {
    tree: Option<sled::Tree>,
    /// Newest-first mirror of the tree (≤ CACHE_LIMIT rows).
    cache: RwLock<Vec<ConfigVersion>>,
    active: ArcSwapOption<ConfigVersion>,
}

impl ConfigVersionStore {
    pub fn open(store: &Store) -> Self {
        let tree = store.tree("config_versions");
        let mut cache: Vec<ConfigVersion> = Vec::new();
        if let Some(ref tree) = tree {
            for item in tree.iter().rev().take(CACHE_LIMIT) {
                if let Ok((_, value)) = item {
                    if let Ok(version) = serde_json::from_slice::<ConfigVersion>(&value) {
                        cache.push(version);
                    }
                }
            }
        }
        let active = cache.iter().find(|v| v.is_active).cloned();
        Self {
            tree,
            cache: RwLock::new(cache),
            active: ArcSwapOption::from(active.map(Arc::new)),
        }
    }

    /// Seed the store: create the default preset version when empty, promote
    /// the newest row when rows exist but none is active.
    pub async fn ensure_default(&self, jobs: &JobStore) -> Result<ConfigVersion, StoreError> {
        let newest_id = {
            let cache = self.cache.read().await;
            if let Some(active) = cache.iter().find(|v| v.is_active) {
                return Ok(active.clone());
            }
            cache.first().map(|v| v.id.clone())
        };
        if let Some(id) = newest_id {
            // Rows exist but none is active — self-heal by promoting the
            // newest row.
            tracing::warn!(id = %id, "no active config version; promoting newest");
            return self.activate(&id).await;
        }
        let preset = presets::default_preset();
        self.create(
            preset.params,
            CreateOptions {
                preset_name: Some(preset.key.to_string()),
                activate: true,
                note: Some("seeded default preset".to_string()),
                actor: Some("system".to_string()),
            },
            jobs,
        )
        .await
    }

    /// Create a new version. With `activate` set, every active row flips to
    /// inactive and all in-flight jobs re-point to the new version, in one
    /// batched write.
    pub async fn create(
        &self,
        params: RetentionParams,
        opts: CreateOptions,
        jobs: &JobStore,
    ) -> Result<ConfigVersion, StoreError> {
        let mut version =
            ConfigVersion::new(params, opts.preset_name, opts.note, opts.actor);
        version.is_active = opts.activate;

        let mut cache = self.cache.write().await;

        if let Some(ref tree) = self.tree {
            let mut batch = sled::Batch::default();
            if opts.activate {
                for item in tree.iter() {
                    let (key, value) =
                        item.map_err(|e| StoreError::CreateFailed(e.to_string()))?;
                    if let Ok(mut row) = serde_json::from_slice::<ConfigVersion>(&value) {
                        if row.is_active {
                            row.is_active = false;
                            batch.insert(key.to_vec(), serde_json::to_vec(&row)?);
                        }
                    }
                }
            }
            batch.insert(
                time_key(version.created_at, &version.id),
                serde_json::to_vec(&version)?,
            );
            tree.apply_batch(batch)
                .map_err(|e| StoreError::CreateFailed(e.to_string()))?;
        }

        if opts.activate {
            for row in cache.iter_mut() {
                row.is_active = false;
            }
        }
        cache.insert(0, version.clone());
        cache.truncate(CACHE_LIMIT);
        drop(cache);

        if opts.activate {
            self.active.store(Some(Arc::new(version.clone())));
            jobs.repoint_active_jobs(&version.id).await;
        }

        tracing::info!(
            id = %version.id,
            preset = version.preset_name.as_deref().unwrap_or("-"),
            activate = opts.activate,
            "config version created"
        );
        Ok(version)
    }

    /// Activate an existing version by id. Fails with `config_not_found`
    /// for unknown ids.
    pub async fn activate(&self, id: &str) -> Result<ConfigVersion, StoreError> {
        let mut cache = self.cache.write().await;

        let mut target = cache.iter().find(|v| v.id == id).cloned();
        if target.is_none() {
            target = self.find_in_tree(id)?;
        }
        let mut target = target.ok_or(StoreError::ConfigNotFound)?;
        target.is_active = true;

        if let Some(ref tree) = self.tree {
            let mut batch = sled::Batch::default();
            for item in tree.iter() {
                let (key, value) = item?;
                if let Ok(mut row) = serde_json::from_slice::<ConfigVersion>(&value) {
                    if row.id == id {
                        row.is_active = true;
                        batch.insert(key.to_vec(), serde_json::to_vec(&row)?);
                    } else if row.is_active {
                        row.is_active = false;
                        batch.insert(key.to_vec(), serde_json::to_vec(&row)?);
                    }
                }
            }
            tree.apply_batch(batch)?;
        }

        let mut found_in_cache = false;
        for row in cache.iter_mut() {
            if row.id == id {
                row.is_active = true;
                found_in_cache = true;
            } else {
                row.is_active = false;
            }
        }
        if !found_in_cache {
            cache.insert(0, target.clone());
            cache.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            cache.truncate(CACHE_LIMIT);
        }
        drop(cache);

        self.active.store(Some(Arc::new(target.clone())));
        tracing::info!(id = %id, "config version activated");
        Ok(target)
    }

    /// Activate the most recent non-active version. `None` when no other
    /// version exists.
    pub async fn rollback(&self) -> Result<Option<ConfigVersion>, StoreError> {
        let previous_id = {
            let cache = self.cache.read().await;
            cache.iter().find(|v| !v.is_active).map(|v| v.id.clone())
        };
        let previous_id = match previous_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let version = self.activate(&previous_id).await?;
        Ok(Some(version))
    }

    /// Lock-free read of the active version.
    pub fn get_active(&self) -> Option<ConfigVersion> {
        self.active.load_full().map(|arc| (*arc).clone())
    }

    pub async fn get_by_id(&self, id: &str) -> Option<ConfigVersion> {
        {
            let cache = self.cache.read().await;
            if let Some(v) = cache.iter().find(|v| v.id == id) {
                return Some(v.clone());
            }
        }
        self.find_in_tree(id).ok().flatten()
    }

    /// Newest-first listing, capped at 200 rows.
    pub async fn list(&self, limit: usize) -> Vec<ConfigVersion> {
        let limit = limit.clamp(1, LIST_LIMIT_MAX);
        if let Some(ref tree) = self.tree {
            if limit > CACHE_LIMIT {
                let mut rows = Vec::with_capacity(limit);
                for item in tree.iter().rev().take(limit) {
                    if let Ok((_, value)) = item {
                        if let Ok(v) = serde_json::from_slice::<ConfigVersion>(&value) {
                            rows.push(v);
                        }
                    }
                }
                return rows;
            }
        }
        let cache = self.cache.read().await;
        cache.iter().take(limit).cloned().collect()
    }

    fn find_in_tree(&self, id: &str) -> Result<Option<ConfigVersion>, StoreError> {
        let tree = match self.tree {
            Some(ref t) => t,
            None => return Ok(None),
        };
        for item in tree.iter().rev() {
            let (_, value) = item?;
            if let Ok(v) = serde_json::from_slice::<ConfigVersion>(&value) {
                if v.id == id {
                    return Ok(Some(v));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_stores() -> (ConfigVersionStore, JobStore) {
        let store = Store::in_memory();
        (
            ConfigVersionStore::open(&store),
            JobStore::open(&store),
        )
    }

    #[tokio::test]
    async fn ensure_default_seeds_active_version() {
        let (versions, jobs) = memory_stores();
        let v = versions.ensure_default(&jobs).await.unwrap();
        assert!(v.is_active);
        assert_eq!(v.preset_name.as_deref(), Some("premium_creator_mode"));
        assert_eq!(versions.get_active().unwrap().id, v.id);
    }

    #[tokio::test]
    async fn create_with_activate_flips_previous() {
        let (versions, jobs) = memory_stores();
        let a = versions.ensure_default(&jobs).await.unwrap();
        let b = versions
            .create(
                RetentionParams::default(),
                CreateOptions {
                    activate: true,
                    ..Default::default()
                },
                &jobs,
            )
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        let listing = versions.list(10).await;
        let active: Vec<_> = listing.iter().filter(|v| v.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
    }

    #[tokio::test]
    async fn rollback_restores_previous_active() {
        let (versions, jobs) = memory_stores();
        let a = versions.ensure_default(&jobs).await.unwrap();
        let _b = versions
            .create(
                RetentionParams::default(),
                CreateOptions {
                    activate: true,
                    ..Default::default()
                },
                &jobs,
            )
            .await
            .unwrap();
        let restored = versions.rollback().await.unwrap().unwrap();
        assert_eq!(restored.id, a.id);
        assert_eq!(versions.get_active().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn rollback_without_previous_returns_none() {
        let (versions, jobs) = memory_stores();
        versions.ensure_default(&jobs).await.unwrap();
        // Only one version exists — nothing to roll back to.
        assert!(versions.rollback().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activate_unknown_id_fails() {
        let (versions, jobs) = memory_stores();
        versions.ensure_default(&jobs).await.unwrap();
        let err = versions.activate("no-such-id").await.unwrap_err();
        assert!(matches!(err, StoreError::ConfigNotFound));
    }

    #[tokio::test]
    async fn exactly_one_active_after_many_writes() {
        let (versions, jobs) = memory_stores();
        versions.ensure_default(&jobs).await.unwrap();
        for i in 0..10 {
            versions
                .create(
                    RetentionParams::default(),
                    CreateOptions {
                        activate: i % 2 == 0,
                        note: Some(format!("write {i}")),
                        ..Default::default()
                    },
                    &jobs,
                )
                .await
                .unwrap();
        }
        let listing = versions.list(50).await;
        assert_eq!(listing.iter().filter(|v| v.is_active).count(), 1);
    }
}
