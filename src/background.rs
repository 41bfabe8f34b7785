//! Background tasks
//!
//! The scheduled feedback-loop trigger. Runs forever on a fixed interval;
//! each tick is serialized by the loop's own mutex, so an overlapping manual
//! trigger cannot race it.

use std::sync::Arc;
use std::time::Duration;

use crate::feedback::FeedbackLoop;

/// Spawn the periodic feedback-loop trigger. `interval_minutes = 0`
/// disables scheduling.
pub fn spawn_feedback_scheduler(
    feedback_loop: Arc<FeedbackLoop>,
    interval_minutes: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_minutes == 0 {
        tracing::info!("feedback loop scheduler disabled");
        return None;
    }
    let period = Duration::from_secs(interval_minutes * 60);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = feedback_loop.run("scheduled", false).await;
            tracing::debug!(
                applied = report.applied,
                reason = %report.reason,
                "scheduled feedback loop tick"
            );
        }
    }))
}
