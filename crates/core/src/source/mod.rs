//! Playback source boundary.
//!
//! The engine only ever talks to the music service through [`PlaybackSource`].
//! The wire types here mirror the service's JSON (seconds-based floats);
//! conversion to the `Duration`-based model happens in [`crate::analysis`].

mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub use http::HttpSource;

/// One sample of remote ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub track_id: String,
    pub is_playing: bool,
    /// Playback position as reported by the service, not yet compensated
    /// for request latency.
    pub progress: Duration,
}

/// Track metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    pub duration: Duration,
}

/// Raw analysis payload as returned by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAnalysis {
    #[serde(default)]
    pub bars: Vec<RawInterval>,
    #[serde(default)]
    pub beats: Vec<RawInterval>,
    #[serde(default)]
    pub sections: Vec<RawSection>,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    #[serde(default)]
    pub tatums: Vec<RawInterval>,
}

/// Raw interval in seconds.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawInterval {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSection {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub loudness: f32,
    #[serde(default)]
    pub tempo: f32,
    #[serde(default)]
    pub key: i32,
    #[serde(default)]
    pub mode: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub loudness_start: f32,
    #[serde(default)]
    pub pitches: Vec<f32>,
    #[serde(default)]
    pub timbre: Vec<f32>,
}

/// Errors from the playback source. All of them are transient from the
/// engine's point of view: the poll loop logs and carries on.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Remote music service as seen by the sync engine.
///
/// `poll_currently_playing` is called once per poll tick and must return
/// quickly; the two fetches are only issued on a track change and may be
/// slow. Implementations must put an explicit timeout on every request.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Current playback state, or `None` when the player is idle.
    async fn poll_currently_playing(&self) -> Result<Option<PlaybackSnapshot>, SourceError>;

    async fn fetch_track(&self, track_id: &str) -> Result<TrackInfo, SourceError>;

    async fn fetch_analysis(&self, track_id: &str) -> Result<RawAnalysis, SourceError>;
}
