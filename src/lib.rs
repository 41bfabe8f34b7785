//! Cutbrain: retention tuning for automated video editing
//!
//! Closed-loop tuning of a video-editing retention algorithm.
//!
//! ## Architecture
//!
//! - **Scoring engine**: deterministic feature extraction, per-segment
//!   keep/drop decisions and a retention score in [0,100]
//! - **Config version store**: versioned parameter sets with single-active
//!   election and rollback
//! - **Experiment allocator**: weighted multi-arm assignment for new jobs
//! - **Feedback loop**: production outcome signals folded into new config
//!   versions, gated by confidence and cooldown
//! - **Prompt translator**: deterministic operator prose → parameter deltas

pub mod api;
pub mod background;
pub mod config;
pub mod experiment;
pub mod feedback;
pub mod presets;
pub mod prompt;
pub mod recorder;
pub mod scoring;
pub mod storage;
pub mod suggest;
pub mod types;

// Re-export the parameter schema and core engine types
pub use types::{
    ConfigVersion, Experiment, ExperimentStatus, FeedbackLoopState, RenderJob,
    RenderQualityMetric, RetentionParams, ScoreReport, SegmentDecision, Subscores,
};

// Re-export component entry points
pub use experiment::Allocator;
pub use feedback::FeedbackLoop;
pub use prompt::Translator;
pub use recorder::Recorder;
pub use scoring::evaluate;
pub use storage::Store;
pub use suggest::SuggestionEngine;
