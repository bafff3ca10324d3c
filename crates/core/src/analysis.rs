//! Musical structure model.
//!
//! A track's audio analysis arrives as five sequences of raw, seconds-based
//! intervals (bars, beats, sections, segments, tatums). The raw edges are
//! rarely exact: the first interval can start late, neighbours can leave
//! sub-millisecond gaps, and the last interval can stop short of the track
//! end. Normalization forces every sequence into a contiguous cover of
//! `[0, track_duration]` so the schedulers never have to reason about holes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::source::{RawAnalysis, RawInterval};

/// One level of musical structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Bar,
    Beat,
    Section,
    Segment,
    Tatum,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Bar,
        Granularity::Beat,
        Granularity::Section,
        Granularity::Segment,
        Granularity::Tatum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Bar => "bar",
            Granularity::Beat => "beat",
            Granularity::Section => "section",
            Granularity::Segment => "segment",
            Granularity::Tatum => "tatum",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized interval of a single granularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: Duration,
    pub duration: Duration,
    pub confidence: f32,
}

impl TimeInterval {
    pub fn new(start: Duration, duration: Duration) -> Self {
        TimeInterval {
            start,
            duration,
            confidence: 1.0,
        }
    }

    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start && position < self.end()
    }
}

/// Section-level payload: timing plus the coarse musical attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    pub time: TimeInterval,
    pub loudness: f32,
    pub tempo: f32,
    pub key: i32,
    pub mode: i32,
}

/// Segment-level payload: timing plus per-pitch-class energy and timbre.
///
/// The scheduler only looks at `time`; the coordinator reads the rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub time: TimeInterval,
    pub loudness_start: f32,
    pub pitches: [f32; 12],
    pub timbre: [f32; 12],
}

/// Fully normalized analysis for one track.
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    pub track_duration: Duration,
    pub bars: Vec<TimeInterval>,
    pub beats: Vec<TimeInterval>,
    pub sections: Vec<Section>,
    pub segments: Vec<Segment>,
    pub tatums: Vec<TimeInterval>,
}

impl AudioAnalysis {
    /// Convert a raw service payload into the normalized model.
    ///
    /// Every granularity must be present and non-empty; a track we cannot
    /// schedule against is rejected wholesale.
    pub fn from_raw(mut raw: RawAnalysis, track_duration: Duration) -> Result<Self, EngineError> {
        // Keep payload-carrying sequences in the same order normalization
        // will put their timings in, so the zips below stay aligned.
        raw.sections.sort_by(|a, b| a.start.total_cmp(&b.start));
        raw.segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let bars = normalize(convert(&raw.bars), track_duration, Granularity::Bar)?;
        let beats = normalize(convert(&raw.beats), track_duration, Granularity::Beat)?;
        let tatums = normalize(convert(&raw.tatums), track_duration, Granularity::Tatum)?;

        let section_times = normalize(
            raw.sections.iter().map(|s| interval_from_secs(s.start, s.duration, s.confidence)).collect(),
            track_duration,
            Granularity::Section,
        )?;
        let sections = section_times
            .into_iter()
            .zip(&raw.sections)
            .map(|(time, s)| Section {
                time,
                loudness: s.loudness,
                tempo: s.tempo,
                key: s.key,
                mode: s.mode,
            })
            .collect();

        let segment_times = normalize(
            raw.segments.iter().map(|s| interval_from_secs(s.start, s.duration, s.confidence)).collect(),
            track_duration,
            Granularity::Segment,
        )?;
        let segments = segment_times
            .into_iter()
            .zip(&raw.segments)
            .map(|(time, s)| Segment {
                time,
                loudness_start: s.loudness_start,
                pitches: fixed_vector(&s.pitches),
                timbre: fixed_vector(&s.timbre),
            })
            .collect();

        Ok(AudioAnalysis {
            track_duration,
            bars,
            beats,
            sections,
            segments,
            tatums,
        })
    }

    /// Timing sequence for one granularity, payloads stripped.
    pub fn timing(&self, granularity: Granularity) -> Vec<TimeInterval> {
        match granularity {
            Granularity::Bar => self.bars.clone(),
            Granularity::Beat => self.beats.clone(),
            Granularity::Section => self.sections.iter().map(|s| s.time).collect(),
            Granularity::Segment => self.segments.iter().map(|s| s.time).collect(),
            Granularity::Tatum => self.tatums.clone(),
        }
    }
}

fn convert(raw: &[RawInterval]) -> Vec<TimeInterval> {
    raw.iter()
        .map(|r| interval_from_secs(r.start, r.duration, r.confidence))
        .collect()
}

fn interval_from_secs(start: f64, duration: f64, confidence: f32) -> TimeInterval {
    TimeInterval {
        start: Duration::from_secs_f64(start.max(0.0)),
        duration: Duration::from_secs_f64(duration.max(0.0)),
        confidence,
    }
}

/// Force a sequence into a contiguous, non-overlapping cover of
/// `[0, track_duration]`.
///
/// Invariants on return: `s[0].start == 0`, `s[i].end() == s[i+1].start`,
/// `s[last].end() == track_duration`.
pub fn normalize(
    mut intervals: Vec<TimeInterval>,
    track_duration: Duration,
    granularity: Granularity,
) -> Result<Vec<TimeInterval>, EngineError> {
    if intervals.is_empty() {
        return Err(EngineError::Analysis(format!(
            "{granularity} sequence is empty"
        )));
    }

    intervals.sort_by_key(|iv| iv.start);

    let last = intervals.len() - 1;
    intervals[0].start = Duration::ZERO;
    intervals[last].start = intervals[last].start.min(track_duration);
    for i in 0..last {
        let next_start = intervals[i + 1].start;
        intervals[i].duration = next_start.saturating_sub(intervals[i].start);
    }
    intervals[last].duration = track_duration.saturating_sub(intervals[last].start);

    Ok(intervals)
}

fn fixed_vector(values: &[f32]) -> [f32; 12] {
    let mut out = [0.0; 12];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = *value;
    }
    out
}
