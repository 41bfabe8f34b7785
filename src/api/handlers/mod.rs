//! API handlers and shared state

pub mod config;
pub mod experiment;
pub mod feedback;
pub mod footage;
pub mod metrics;
pub mod prompt;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::experiment::Allocator;
use crate::feedback::FeedbackLoop;
use crate::prompt::Translator;
use crate::recorder::Recorder;
use crate::storage::{
    ConfigVersionStore, ExperimentStore, FeedbackStateStore, JobStore, MetricStore,
    SecurityEventStore, Store,
};
use crate::suggest::SuggestionEngine;

use super::middleware::RateLimiter;

/// Operator auth material (owner list lowercased at build time).
pub struct AuthConfig {
    pub owner_emails: Vec<String>,
    pub dev_password: String,
}

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiState {
    pub versions: Arc<ConfigVersionStore>,
    pub metrics: Arc<MetricStore>,
    pub experiments: Arc<ExperimentStore>,
    pub jobs: Arc<JobStore>,
    pub security: Arc<SecurityEventStore>,
    pub feedback_states: Arc<FeedbackStateStore>,
    pub allocator: Arc<Allocator>,
    pub recorder: Arc<Recorder>,
    pub suggestions: Arc<SuggestionEngine>,
    pub feedback_loop: Arc<FeedbackLoop>,
    pub translator: Arc<Translator>,
    /// Entropy-seeded in production; tests inject their own allocator RNG.
    pub rng: Arc<Mutex<StdRng>>,
    pub auth: Arc<AuthConfig>,
    pub limiter: Arc<RateLimiter>,
}

impl ApiState {
    /// Wire every component against one storage handle.
    pub fn build(store: &Store, app_config: &AppConfig) -> Self {
        let versions = Arc::new(ConfigVersionStore::open(store));
        let metrics = Arc::new(MetricStore::open(store));
        let experiments = Arc::new(ExperimentStore::open(store));
        let jobs = Arc::new(JobStore::open(store));
        let security = Arc::new(SecurityEventStore::open(store));
        let feedback_states = Arc::new(FeedbackStateStore::open(store));

        let allocator = Arc::new(Allocator::new(
            experiments.clone(),
            versions.clone(),
            metrics.clone(),
        ));
        let recorder = Arc::new(Recorder::new(versions.clone(), metrics.clone()));
        let suggestions = Arc::new(SuggestionEngine::new(metrics.clone(), versions.clone()));
        let feedback_loop = Arc::new(FeedbackLoop::new(
            feedback_states.clone(),
            jobs.clone(),
            metrics.clone(),
            versions.clone(),
        ));
        let translator = Arc::new(Translator::new(suggestions.clone()));

        Self {
            versions,
            metrics,
            experiments,
            jobs,
            security,
            feedback_states,
            allocator,
            recorder,
            suggestions,
            feedback_loop,
            translator,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
            auth: Arc::new(AuthConfig {
                owner_emails: app_config
                    .auth
                    .owner_emails
                    .iter()
                    .map(|e| e.trim().to_lowercase())
                    .collect(),
                dev_password: app_config.auth.dev_password.clone(),
            }),
            limiter: Arc::new(RateLimiter::new(
                app_config.rate_limit.window_ms,
                app_config.rate_limit.max,
            )),
        }
    }
}
