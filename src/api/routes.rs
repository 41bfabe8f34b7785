//! API route definitions
//!
//! All algorithm routes sit behind operator auth; mutations additionally
//! pass the per-IP rate limit. Layer order matters: auth runs first, then
//! the limiter sees only authenticated traffic.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};
use super::middleware::{limit_mutations, require_operator};

/// Build the authenticated algorithm router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        // Config versions
        .route("/config", get(handlers::config::get_config))
        .route("/config", post(handlers::config::create_config))
        .route("/config/versions", get(handlers::config::list_versions))
        .route("/config/activate", post(handlers::config::activate_config))
        .route("/config/rollback", post(handlers::config::rollback_config))
        // Presets
        .route("/preset/apply", post(handlers::config::apply_preset))
        .route("/presets", get(handlers::config::list_presets))
        // Metrics & analysis
        .route("/metrics/recent", get(handlers::metrics::recent_metrics))
        .route("/scorecards", get(handlers::metrics::scorecards))
        .route("/analyze-renders", post(handlers::metrics::analyze_renders))
        .route("/suggestions", get(handlers::metrics::get_suggestions))
        .route("/auto-optimize", post(handlers::metrics::auto_optimize))
        // Prompt translation
        .route("/prompt/apply", post(handlers::prompt::prompt_apply))
        // Experiments
        .route("/experiment/start", post(handlers::experiment::start_experiment))
        .route("/experiment/stop", post(handlers::experiment::stop_experiment))
        .route("/experiment/status", get(handlers::experiment::experiment_status))
        .route("/config-selector", get(handlers::experiment::config_selector))
        // Sample footage
        .route("/sample-footage", get(handlers::footage::list_sample_footage))
        .route("/sample-footage/test", post(handlers::footage::test_sample_footage))
        // Feedback loop
        .route("/feedback-loop/run", post(handlers::feedback::run_feedback_loop))
        .route("/feedback-loop/state", get(handlers::feedback::get_feedback_state))
        .route(
            "/feedback-loop/settings",
            post(handlers::feedback::update_feedback_settings),
        )
        .layer(middleware::from_fn_with_state(state.clone(), limit_mutations))
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state)
}

/// Unauthenticated liveness probe at root level.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(|| async { "ok" }))
}
