//! Input normalization for the scoring engine
//!
//! `analysis`, `transcript` and `cut_list` arrive as loosely-typed payloads.
//! Everything is collapsed into [`NormalizedInputs`] in one place: nothing is
//! rejected, every absent input is default-filled and recorded in
//! `missing_signals`.

use serde_json::Value;

use crate::types::analysis::{
    CutListPayload, EngagementWindow, NormalizedInputs, RawSegment, SegmentSpan,
    TranscriptCue, TranscriptPayload,
};

/// Hard duration bounds in seconds (1 s .. 6 h).
const DURATION_MIN_SEC: f64 = 1.0;
const DURATION_MAX_SEC: f64 = 21_600.0;

/// Auto-chunk bucket bounds in seconds.
const CHUNK_MIN_SEC: f64 = 1.5;
const CHUNK_MAX_SEC: f64 = 6.5;
const CHUNK_TARGET_BUCKETS: f64 = 10.0;

/// Coerce a JSON value into a finite f64 (numbers or numeric strings).
fn num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// First present key among `keys`, as f64.
fn field_num(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(k).and_then(num))
}

/// A count that may arrive as a number or as an event array.
fn count_or_len(obj: &Value, keys: &[&str]) -> Option<u32> {
    for k in keys {
        match obj.get(k) {
            Some(Value::Array(items)) => return Some(items.len() as u32),
            Some(v) => {
                if let Some(n) = num(v) {
                    return Some(n.max(0.0) as u32);
                }
            }
            None => {}
        }
    }
    None
}

fn parse_windows(analysis: &Value) -> Option<Vec<EngagementWindow>> {
    let raw = analysis
        .get("engagement_windows")
        .or_else(|| analysis.get("engagementWindows"))?;
    let windows: Vec<EngagementWindow> = serde_json::from_value(raw.clone()).ok()?;
    let windows: Vec<EngagementWindow> = windows
        .into_iter()
        .filter(|w| w.end > w.start)
        .map(|mut w| {
            w.score = w.score.clamp(0.0, 1.0);
            w
        })
        .collect();
    if windows.is_empty() {
        None
    } else {
        Some(windows)
    }
}

fn cue_from_raw(raw: crate::types::analysis::RawCue) -> TranscriptCue {
    TranscriptCue {
        start: raw.start.max(0.0),
        end: raw.end.max(raw.start),
        text: raw.text,
    }
}

fn parse_transcript(transcript: Option<&Value>, duration: f64) -> Option<Vec<TranscriptCue>> {
    let value = transcript?;
    if value.is_null() {
        return None;
    }
    let payload: TranscriptPayload = serde_json::from_value(value.clone()).ok()?;
    let cues = match payload {
        TranscriptPayload::Text(text) => {
            if text.trim().is_empty() {
                return None;
            }
            vec![TranscriptCue {
                start: 0.0,
                end: duration,
                text,
            }]
        }
        TranscriptPayload::Cues(raw) => raw.into_iter().map(cue_from_raw).collect(),
        TranscriptPayload::Nested(nested) => {
            let raw = if !nested.segments.is_empty() {
                nested.segments
            } else if !nested.cues.is_empty() {
                nested.cues
            } else if !nested.items.is_empty() {
                nested.items
            } else if let Some(text) = nested.text.filter(|t| !t.trim().is_empty()) {
                return Some(vec![TranscriptCue {
                    start: 0.0,
                    end: duration,
                    text,
                }]);
            } else {
                return None;
            };
            raw.into_iter().map(cue_from_raw).collect()
        }
    };
    let cues: Vec<TranscriptCue> = cues
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .collect();
    if cues.is_empty() {
        None
    } else {
        Some(cues)
    }
}

fn spans_from_raw(raw: Vec<RawSegment>) -> Vec<SegmentSpan> {
    raw.into_iter()
        .filter(|s| s.end > s.start && s.start >= 0.0)
        .map(|s| SegmentSpan {
            start: s.start,
            end: s.end,
            speed: s.speed.filter(|v| v.is_finite() && *v > 0.0),
        })
        .collect()
}

fn parse_cut_list(cut_list: Option<&Value>) -> Option<Vec<SegmentSpan>> {
    let value = cut_list?;
    if value.is_null() {
        return None;
    }
    let payload: CutListPayload = serde_json::from_value(value.clone()).ok()?;
    let spans = match payload {
        CutListPayload::Segments(raw) => spans_from_raw(raw),
        CutListPayload::Wrapped(w) => spans_from_raw(w.segments),
    };
    if spans.is_empty() {
        None
    } else {
        Some(spans)
    }
}

fn parse_edit_plan(analysis: &Value) -> Option<Vec<SegmentSpan>> {
    let plan = analysis
        .get("editPlan")
        .or_else(|| analysis.get("edit_plan"))?;
    let raw: Vec<RawSegment> = serde_json::from_value(plan.get("segments")?.clone()).ok()?;
    let spans = spans_from_raw(raw);
    if spans.is_empty() {
        None
    } else {
        Some(spans)
    }
}

/// Chunk `[0, duration]` into roughly ten buckets of 1.5–6.5 s each.
fn auto_chunk(duration: f64) -> Vec<SegmentSpan> {
    let chunk = (duration / CHUNK_TARGET_BUCKETS).clamp(CHUNK_MIN_SEC, CHUNK_MAX_SEC);
    let mut spans = Vec::new();
    let mut t = 0.0;
    while t < duration {
        let end = (t + chunk).min(duration);
        // Skip trailing slivers shorter than a quarter bucket.
        if end - t >= chunk * 0.25 {
            spans.push(SegmentSpan {
                start: t,
                end,
                speed: None,
            });
        }
        t = end;
    }
    if spans.is_empty() {
        spans.push(SegmentSpan {
            start: 0.0,
            end: duration,
            speed: None,
        });
    }
    spans
}

/// Normalize the three raw payloads into canonical scoring inputs.
///
/// Duration is resolved in a single pass — explicit duration, metadata
/// duration, then the max provided segment end — before any auto-chunking,
/// so auto-chunked segments are computed against the real duration exactly
/// once.
pub fn normalize(
    analysis: &Value,
    transcript: Option<&Value>,
    cut_list: Option<&Value>,
) -> NormalizedInputs {
    let mut missing = Vec::new();

    let provided_segments =
        parse_cut_list(cut_list).or_else(|| parse_edit_plan(analysis));

    let explicit_duration = field_num(analysis, &["duration", "duration_sec", "durationSec"])
        .filter(|d| *d > 0.0)
        .or_else(|| {
            analysis
                .get("metadata")
                .and_then(|m| field_num(m, &["duration", "duration_sec", "durationSec"]))
                .filter(|d| *d > 0.0)
        });
    let segment_max_end = provided_segments
        .as_ref()
        .map(|spans| spans.iter().fold(0.0_f64, |acc, s| acc.max(s.end)))
        .filter(|d| *d > 0.0);
    let duration_sec = explicit_duration
        .or(segment_max_end)
        .unwrap_or(DURATION_MIN_SEC)
        .clamp(DURATION_MIN_SEC, DURATION_MAX_SEC);

    let windows = match parse_windows(analysis) {
        Some(w) => w,
        None => {
            missing.push("engagement_windows".to_string());
            vec![EngagementWindow {
                start: 0.0,
                end: duration_sec,
                score: 0.5,
            }]
        }
    };

    let cues = match parse_transcript(transcript, duration_sec) {
        Some(c) => c,
        None => {
            missing.push("transcript".to_string());
            Vec::new()
        }
    };

    let segments = match provided_segments {
        Some(s) => s,
        None => {
            missing.push("cut_list".to_string());
            auto_chunk(duration_sec)
        }
    };

    let silence_ratio = match field_num(analysis, &["silence_ratio", "silenceRatio"]) {
        Some(v) => v.clamp(0.0, 1.0),
        None => {
            missing.push("silence_ratio".to_string());
            0.0
        }
    };

    let jump_cut_severity =
        match field_num(analysis, &["jump_cut_severity", "jumpCutSeverity"]) {
            Some(v) => v.clamp(0.0, 1.0),
            None => {
                missing.push("jump_cut_severity".to_string());
                0.0
            }
        };

    let audio_discontinuity_count = count_or_len(
        analysis,
        &["audio_discontinuities", "audioDiscontinuities"],
    )
    .unwrap_or(0);
    let caption_desync_count = count_or_len(
        analysis,
        &["caption_desync_events", "captionDesyncEvents"],
    )
    .unwrap_or(0);

    NormalizedInputs {
        duration_sec,
        windows,
        cues,
        segments,
        silence_ratio,
        jump_cut_severity,
        audio_discontinuity_count,
        caption_desync_count,
        missing_signals: missing,
    }
}
