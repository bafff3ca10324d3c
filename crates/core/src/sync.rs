//! Playback synchronization engine.
//!
//! Reconciles the locally simulated playback state with remote ground truth
//! on a fixed poll period. The remote position is only ever a latency-skewed
//! sample, so the engine anchors a local clock to it and corrects the anchor
//! whenever the divergence exceeds the configured threshold. Every
//! correction cancels and resyncs all five interval tracks; a stale timer
//! surviving a re-anchor is the one failure mode this module must never
//! allow.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::analysis::{AudioAnalysis, Granularity};
use crate::clock::PlaybackClock;
use crate::config::Settings;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::source::{PlaybackSnapshot, PlaybackSource, TrackInfo};
use crate::track::IntervalTrack;

struct CurrentTrack {
    info: TrackInfo,
    analysis: Arc<AudioAnalysis>,
}

pub struct SyncEngine {
    source: Arc<dyn PlaybackSource>,
    bus: EventBus,
    poll_interval: Duration,
    drift_threshold: Duration,
    clock: Option<PlaybackClock>,
    current: Option<CurrentTrack>,
    tracks: Vec<IntervalTrack>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn PlaybackSource>, settings: &Settings, bus: EventBus) -> Self {
        let tracks = Granularity::ALL
            .into_iter()
            .map(|granularity| IntervalTrack::new(granularity, bus.clone()))
            .collect();

        SyncEngine {
            source,
            bus,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            drift_threshold: Duration::from_millis(settings.drift_threshold_ms),
            clock: None,
            current: None,
            tracks,
        }
    }

    /// Poll until `shutdown` yields, then tear the session down.
    ///
    /// The next tick is scheduled only after the previous one (including
    /// any slow metadata/analysis fetches) has completed, so ticks never
    /// overlap and a burst of latency cannot pile up polls.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        log::info!(
            "sync engine started (poll every {:?}, drift threshold {:?})",
            self.poll_interval,
            self.drift_threshold
        );

        self.poll_once().await;
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => self.poll_once().await,
            }
        }

        self.clear_session();
        log::info!("sync engine stopped");
    }

    /// One reconciliation pass against the remote source.
    pub async fn poll_once(&mut self) {
        let poll_sent_at = Instant::now();
        let snapshot = match self.source.poll_currently_playing().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                // Transient by definition; the next tick retries.
                log::warn!("playback poll failed: {err}");
                return;
            }
        };

        match snapshot {
            Some(snapshot) if snapshot.is_playing => {
                let same_track = self
                    .current
                    .as_ref()
                    .is_some_and(|c| c.info.id == snapshot.track_id);

                if same_track {
                    self.check_drift(snapshot.progress + poll_sent_at.elapsed());
                } else if let Err(err) = self.start_track(snapshot, poll_sent_at).await {
                    match err {
                        EngineError::Source(err) => {
                            log::warn!("track fetch failed: {err}");
                        }
                        err => {
                            log::error!("cannot schedule track: {err}");
                            self.bus.emit(EngineEvent::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
            _ => self.handle_stopped(),
        }
    }

    /// Tear down the old session and spin up the newly playing track.
    async fn start_track(
        &mut self,
        snapshot: PlaybackSnapshot,
        poll_sent_at: Instant,
    ) -> Result<(), EngineError> {
        self.clear_session();
        log::info!("track changed to {}", snapshot.track_id);

        // The one long-latency path in the engine. Playback keeps moving
        // underneath us, which is why the position is compensated below
        // rather than up front.
        let info = self.source.fetch_track(&snapshot.track_id).await?;
        let raw = self.source.fetch_analysis(&snapshot.track_id).await?;
        let analysis = Arc::new(AudioAnalysis::from_raw(raw, info.duration)?);

        let position = snapshot.progress + poll_sent_at.elapsed();
        self.clock = Some(PlaybackClock::anchor(info.id.clone(), position));
        self.current = Some(CurrentTrack {
            info: info.clone(),
            analysis: Arc::clone(&analysis),
        });

        // Emitted before the tracks are armed: subscribers must hold the
        // analysis before the first interval event can reach them.
        self.bus.emit(EngineEvent::TrackChanged {
            track: info,
            analysis: Arc::clone(&analysis),
        });

        for track in &mut self.tracks {
            track.seed(analysis.timing(track.granularity()));
            track.sync_to(position);
        }

        log::info!(
            "scheduled {} segments / {} beats at {:?}",
            analysis.segments.len(),
            analysis.beats.len(),
            position
        );
        Ok(())
    }

    /// Re-anchor the clock and every track if local and remote have
    /// diverged past the threshold; otherwise leave the timers alone.
    fn check_drift(&mut self, remote: Duration) {
        let Some(clock) = self.clock.as_mut() else {
            return;
        };

        let local = clock.position();
        let drift = if local > remote { local - remote } else { remote - local };
        if drift <= self.drift_threshold {
            return;
        }

        log::info!("drift {drift:?} exceeds threshold, re-anchoring to {remote:?}");
        clock.re_anchor(remote);
        for track in &mut self.tracks {
            track.sync_to(remote);
        }
    }

    fn handle_stopped(&mut self) {
        if self.current.is_none() {
            return;
        }

        log::info!("playback stopped");
        self.clear_session();
        self.bus.emit(EngineEvent::TrackStopped);
    }

    fn clear_session(&mut self) {
        for track in &mut self.tracks {
            track.cancel();
        }
        self.clock = None;
        self.current = None;
    }

    /// Simulated position of the current track, if one is active.
    pub fn position(&self) -> Option<Duration> {
        self.clock.as_ref().map(|clock| clock.position())
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.info.id.as_str())
    }

    /// Active interval index of one granularity's scheduler.
    pub fn active_index(&self, granularity: Granularity) -> Option<usize> {
        self.tracks
            .iter()
            .find(|t| t.granularity() == granularity)
            .filter(|t| !t.is_empty())
            .map(|t| t.active_index())
    }
}
