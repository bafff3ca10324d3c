//! Locally simulated playback clock.

use std::time::Duration;

use tokio::time::Instant;

/// Derives the current track position from a wall-clock anchor.
///
/// The clock is never incremented: reads are pure (`start_offset` plus
/// elapsed wall time) and the only mutation is re-anchoring, which the sync
/// engine performs when it detects drift against the remote ground truth.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    track_id: String,
    start_wall_clock: Instant,
    start_offset: Duration,
}

impl PlaybackClock {
    /// Anchor a new clock for `track_id` at `offset` into the track.
    pub fn anchor(track_id: impl Into<String>, offset: Duration) -> Self {
        PlaybackClock {
            track_id: track_id.into(),
            start_wall_clock: Instant::now(),
            start_offset: offset,
        }
    }

    /// Move the anchor to a new position, keeping the track.
    pub fn re_anchor(&mut self, offset: Duration) {
        self.start_wall_clock = Instant::now();
        self.start_offset = offset;
    }

    /// Current position in the track. Monotonic between anchors.
    pub fn position(&self) -> Duration {
        self.start_offset + self.start_wall_clock.elapsed()
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }
}
