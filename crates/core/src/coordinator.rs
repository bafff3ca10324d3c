//! Maps engine events onto per-light transitions.
//!
//! Each light owns a band of the 12 pitch classes. On every segment change
//! the coordinator averages the band's energy for the segment now playing
//! and the one after it, turns those averages into palette colors and the
//! segment loudness into brightness, and kicks off one color and one
//! brightness ramp per light, sized at 95% of the segment so the ramp
//! lands just before the next one is requested.

use std::ops::Range;
use std::sync::Arc;

use prism_lights::{Light, Rgb};
use tokio::sync::mpsc;

use crate::analysis::{AudioAnalysis, Granularity, Segment, TimeInterval};
use crate::color::{interpolate, ColorMode};
use crate::config::Settings;
use crate::events::EngineEvent;
use crate::transition::TransitionController;

const RAMP_HEADROOM: f64 = 0.95;

pub struct Coordinator {
    lights: Vec<Arc<dyn Light>>,
    controller: Arc<TransitionController>,
    palette: (Rgb, Rgb),
    color_mode: ColorMode,
    events: mpsc::Receiver<EngineEvent>,
    analysis: Option<Arc<AudioAnalysis>>,
}

impl Coordinator {
    pub fn new(
        lights: Vec<Arc<dyn Light>>,
        controller: Arc<TransitionController>,
        settings: &Settings,
        events: mpsc::Receiver<EngineEvent>,
    ) -> Self {
        Coordinator {
            lights,
            controller,
            palette: settings.palette(),
            color_mode: settings.color_mode,
            events,
            analysis: None,
        }
    }

    /// Consume engine events until the bus closes.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(event).await;
        }
        log::info!("coordinator stopped");
    }

    async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TrackChanged { track, analysis } => {
                log::info!(
                    "now playing: {} - {}",
                    track.artist.as_deref().unwrap_or("unknown artist"),
                    track.name
                );
                self.analysis = Some(analysis);
                self.set_power_all(true).await;
            }
            EngineEvent::TrackStopped => {
                self.analysis = None;
                self.set_power_all(false).await;
            }
            EngineEvent::IntervalChanged {
                granularity: Granularity::Segment,
                index,
                next,
                ..
            } => self.on_segment(index, next),
            EngineEvent::IntervalChanged {
                granularity, index, ..
            } => {
                log::trace!("{granularity} {index} ended");
            }
            EngineEvent::Error { message } => {
                log::error!("engine error: {message}");
            }
        }
    }

    /// Launch the per-light ramps for the segment now beginning.
    fn on_segment(&self, index: usize, next: Option<TimeInterval>) {
        // Last segment of the track: nothing to ramp toward.
        let Some(next_time) = next else {
            return;
        };
        let Some(analysis) = &self.analysis else {
            return;
        };
        let (Some(current), Some(upcoming)) = (
            analysis.segments.get(index),
            analysis.segments.get(index + 1),
        ) else {
            return;
        };

        let ramp = next_time.duration.mul_f64(RAMP_HEADROOM);
        let count = self.lights.len();

        for (i, light) in self.lights.iter().enumerate() {
            let band = pitch_band(i, count);
            let from_color = self.band_color(current, &band);
            let to_color = self.band_color(upcoming, &band);
            let from_brightness = loudness_to_brightness(current.loudness_start);
            let to_brightness = loudness_to_brightness(upcoming.loudness_start);

            let controller = Arc::clone(&self.controller);
            let target = Arc::clone(light);
            tokio::spawn(async move {
                if let Err(err) = controller
                    .transition_color(target, from_color, to_color, ramp)
                    .await
                {
                    log::warn!("color transition failed: {err}");
                }
            });

            let controller = Arc::clone(&self.controller);
            let target = Arc::clone(light);
            tokio::spawn(async move {
                if let Err(err) = controller
                    .transition_brightness(target, from_brightness, to_brightness, ramp)
                    .await
                {
                    log::warn!("brightness transition failed: {err}");
                }
            });
        }
    }

    fn band_color(&self, segment: &Segment, band: &Range<usize>) -> Rgb {
        let energy = band_energy(&segment.pitches, band);
        interpolate(self.palette.0, self.palette.1, energy, self.color_mode)
    }

    async fn set_power_all(&self, on: bool) {
        for light in &self.lights {
            if let Err(err) = light.set_power(on).await {
                log::warn!("power command failed for {}: {err}", light.id());
            }
        }
    }
}

/// Pitch classes owned by light `index` out of `count`.
///
/// Floor-based banding; when 12 doesn't divide evenly the last light
/// absorbs the remainder.
pub fn pitch_band(index: usize, count: usize) -> Range<usize> {
    let start = (index * 12 / count).min(12);
    let end = if index + 1 == count {
        12
    } else {
        ((index + 1) * 12 / count).min(12)
    };
    start..end
}

/// Mean energy of a pitch band; empty bands read as silent.
pub fn band_energy(pitches: &[f32; 12], band: &Range<usize>) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    let sum: f32 = pitches[band.clone()].iter().sum();
    sum / band.len() as f32
}

/// Map segment loudness (dBFS-ish, usually -60..0) to a brightness percent.
pub fn loudness_to_brightness(loudness: f32) -> u8 {
    (((loudness + 50.0).abs() / 100.0).clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_bands_partition_evenly() {
        assert_eq!(pitch_band(0, 3), 0..4);
        assert_eq!(pitch_band(1, 3), 4..8);
        assert_eq!(pitch_band(2, 3), 8..12);
    }

    #[test]
    fn test_uneven_light_count_leaves_remainder_to_last() {
        let bands: Vec<_> = (0..5).map(|i| pitch_band(i, 5)).collect();
        assert_eq!(bands[0], 0..2);
        assert_eq!(bands[4].end, 12);

        // Bands tile the full pitch vector with no gaps.
        for pair in bands.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_single_light_owns_everything() {
        assert_eq!(pitch_band(0, 1), 0..12);
    }

    #[test]
    fn test_band_energy_averages_slice() {
        let mut pitches = [0.0; 12];
        pitches[0] = 1.0;
        pitches[1] = 0.5;
        assert!((band_energy(&pitches, &(0..2)) - 0.75).abs() < f32::EPSILON);
        assert_eq!(band_energy(&pitches, &(6..6)), 0.0);
    }

    #[test]
    fn test_loudness_mapping() {
        assert_eq!(loudness_to_brightness(-50.0), 0);
        assert_eq!(loudness_to_brightness(0.0), 50);
        assert_eq!(loudness_to_brightness(-25.0), 25);
        assert_eq!(loudness_to_brightness(100.0), 100); // clamped
    }
}
