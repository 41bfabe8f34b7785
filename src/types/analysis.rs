//! Loosely-typed analysis payloads and their canonical forms
//!
//! The upstream pipeline delivers `analysis`, `transcript` and `cut_list` in
//! several shapes (string / array / nested object, snake and camel casings).
//! The tagged variants here model those shapes at the boundary; the scoring
//! engine normalizes them in one place and rejects nothing.

use serde::{Deserialize, Serialize};

/// One viewer-engagement window over `[start, end]` seconds, score in [0,1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EngagementWindow {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default = "neutral_score")]
    pub score: f64,
}

fn neutral_score() -> f64 {
    0.5
}

/// One transcript cue in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptCue {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// A raw cue as the pipeline ships it (camel or snake keys).
#[derive(Debug, Clone, Deserialize)]
pub struct RawCue {
    #[serde(default, alias = "startSec", alias = "start_sec")]
    pub start: f64,
    #[serde(default, alias = "endSec", alias = "end_sec")]
    pub end: f64,
    #[serde(default, alias = "content", alias = "caption")]
    pub text: String,
}

/// Transcript payload variants: a plain string, an array of cues, or a
/// wrapper object carrying the cue array under one of several keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TranscriptPayload {
    Text(String),
    Cues(Vec<RawCue>),
    Nested(NestedTranscript),
}

/// Wrapper-object transcript shape.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedTranscript {
    #[serde(default)]
    pub segments: Vec<RawCue>,
    #[serde(default)]
    pub cues: Vec<RawCue>,
    #[serde(default)]
    pub items: Vec<RawCue>,
    #[serde(default)]
    pub text: Option<String>,
}

/// One cut-list segment as shipped (speed is optional playback rate).
#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    #[serde(default, alias = "startSec", alias = "start_sec")]
    pub start: f64,
    #[serde(default, alias = "endSec", alias = "end_sec")]
    pub end: f64,
    #[serde(default, alias = "playbackRate", alias = "playback_rate")]
    pub speed: Option<f64>,
}

/// Cut-list payload variants: a bare array or `{ "segments": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CutListPayload {
    Segments(Vec<RawSegment>),
    Wrapped(WrappedCutList),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrappedCutList {
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

/// A canonical segment span after normalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentSpan {
    pub start: f64,
    pub end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl SegmentSpan {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Everything the scoring engine needs, in one canonical shape, plus the
/// list of inputs that were absent (diagnostics only).
#[derive(Debug, Clone)]
pub struct NormalizedInputs {
    pub duration_sec: f64,
    pub windows: Vec<EngagementWindow>,
    pub cues: Vec<TranscriptCue>,
    pub segments: Vec<SegmentSpan>,
    pub silence_ratio: f64,
    pub jump_cut_severity: f64,
    pub audio_discontinuity_count: u32,
    pub caption_desync_count: u32,
    pub missing_signals: Vec<String>,
}
