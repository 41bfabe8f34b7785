//! Domain types shared across the engine

pub mod analysis;
pub mod config_version;
pub mod experiment;
pub mod feedback;
pub mod job;
pub mod metric;
pub mod params;
pub mod scoring;

pub use analysis::{
    CutListPayload, EngagementWindow, NormalizedInputs, SegmentSpan, TranscriptCue,
    TranscriptPayload,
};
pub use config_version::ConfigVersion;
pub use experiment::{
    ArmOutcome, Experiment, ExperimentArm, ExperimentStatus, ExperimentStatusReport,
};
pub use feedback::{
    BrainSnapshot, FeedbackLoopRuntime, FeedbackLoopSettings, FeedbackLoopState,
    FeedbackRunReport, RetentionFeedback,
};
pub use job::{JobStatus, RenderJob, RenderSettings};
pub use metric::RenderQualityMetric;
pub use params::{
    FieldSpec, ParamsError, RetentionParams, ScoringWeights, SegmentWeights, FIELD_SPECS,
};
pub use scoring::{
    RenderFeatures, ScoreFlags, ScoreReport, SegmentDecision, SegmentSignal, Subscores,
};
