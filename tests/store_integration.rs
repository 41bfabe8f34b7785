//! Sled-backed store integration tests
//!
//! Exercises the persistent paths with a tempdir database, including
//! restart recovery and the single-active invariant under real writes.

use std::sync::Arc;

use cutbrain::storage::config_versions::CreateOptions;
use cutbrain::storage::{ConfigVersionStore, JobStore, MetricStore, Store};
use cutbrain::types::RetentionParams;

#[tokio::test]
async fn versions_survive_reopen_with_single_active() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let (a_id, b_id) = {
        let store = Store::open(&path);
        assert!(store.is_persistent());
        let versions = ConfigVersionStore::open(&store);
        let jobs = JobStore::open(&store);
        let a = versions.ensure_default(&jobs).await.unwrap();
        let b = versions
            .create(
                RetentionParams::default(),
                CreateOptions {
                    activate: true,
                    note: Some("second".to_string()),
                    ..Default::default()
                },
                &jobs,
            )
            .await
            .unwrap();
        (a.id, b.id)
    };

    // Reopen: the cache must rebuild from sled with B still active.
    let store = Store::open(&path);
    let versions = ConfigVersionStore::open(&store);
    let active = versions.get_active().unwrap();
    assert_eq!(active.id, b_id);

    let listing = versions.list(10).await;
    assert_eq!(listing.len(), 2);
    assert_eq!(listing.iter().filter(|v| v.is_active).count(), 1);
    assert!(listing.iter().any(|v| v.id == a_id));
}

#[tokio::test]
async fn rollback_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let a_id = {
        let store = Store::open(&path);
        let versions = ConfigVersionStore::open(&store);
        let jobs = JobStore::open(&store);
        let a = versions.ensure_default(&jobs).await.unwrap();
        versions
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
        a.id
    };

    let store = Store::open(&path);
    let versions = ConfigVersionStore::open(&store);
    assert_eq!(versions.get_active().unwrap().id, a_id);
}

#[tokio::test]
async fn self_heal_promotes_newest_when_no_active() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let newest_id = {
        let store = Store::open(&path);
        let versions = ConfigVersionStore::open(&store);
        let jobs = JobStore::open(&store);
        // Rows exist but none was ever activated — the broken invariant.
        let mut newest_id = String::new();
        for _ in 0..2 {
            newest_id = versions
                .create(
                    RetentionParams::default(),
                    CreateOptions::default(),
                    &jobs,
                )
                .await
                .unwrap()
                .id;
        }
        assert!(versions.get_active().is_none());
        newest_id
    };

    let store = Store::open(&path);
    let versions = ConfigVersionStore::open(&store);
    let jobs = JobStore::open(&store);
    let active = versions.ensure_default(&jobs).await.unwrap();
    assert!(active.is_active);
    assert_eq!(active.id, newest_id);
    let listing = versions.list(10).await;
    assert_eq!(listing.iter().filter(|v| v.is_active).count(), 1);
}

#[tokio::test]
async fn metrics_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let store = Store::open(&path);
        let versions = Arc::new(ConfigVersionStore::open(&store));
        let jobs = Arc::new(JobStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        versions.ensure_default(&jobs).await.unwrap();

        let recorder = cutbrain::Recorder::new(versions.clone(), metrics.clone());
        let job = cutbrain::RenderJob {
            id: "persisted-job".to_string(),
            status: cutbrain::types::JobStatus::Completed,
            user_id: None,
            analysis: serde_json::json!({"duration": 30.0}),
            transcript: None,
            cut_list: None,
            render_settings: Default::default(),
            retention_feedback: None,
            retention_score: None,
            config_version_id: None,
        };
        recorder.record(&job).await.unwrap();
    }

    let store = Store::open(&path);
    let metrics = MetricStore::open(&store);
    let rows = metrics.recent(10).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].job_id, "persisted-job");
    assert!(rows[0].score_total >= 0.0 && rows[0].score_total <= 100.0);
}

#[tokio::test]
async fn feedback_loop_skip_reason_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let store = Store::open(&path);
        let states = Arc::new(cutbrain::storage::FeedbackStateStore::open(&store));
        let jobs = Arc::new(JobStore::open(&store));
        let metrics = Arc::new(MetricStore::open(&store));
        let versions = Arc::new(ConfigVersionStore::open(&store));
        versions.ensure_default(&jobs).await.unwrap();

        let feedback_loop =
            cutbrain::FeedbackLoop::new(states, jobs, metrics, versions);
        let report = feedback_loop.run("integration", false).await;
        assert!(!report.applied);
    }

    let store = Store::open(&path);
    let states = cutbrain::storage::FeedbackStateStore::open(&store);
    let state = states.load().await;
    assert!(state.runtime.last_run_at.is_some());
    assert_eq!(state.runtime.last_run_trigger.as_deref(), Some("integration"));
}
