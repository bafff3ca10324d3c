pub use analysis::{normalize, AudioAnalysis, Granularity, Section, Segment, TimeInterval};
pub use clock::PlaybackClock;
pub use color::{interpolate, ColorMode};
pub use config::{ConfigError, ConfigFile, ConfigManager, Settings};
pub use coordinator::{band_energy, loudness_to_brightness, pitch_band, Coordinator};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use source::{
    HttpSource, PlaybackSnapshot, PlaybackSource, RawAnalysis, RawInterval, RawSection,
    RawSegment, SourceError, TrackInfo,
};
pub use sync::SyncEngine;
pub use track::IntervalTrack;
pub use transition::{TransitionController, TransitionKind};

mod analysis;
mod clock;
mod color;
mod config;
mod coordinator;
mod error;
mod events;
mod source;
mod sync;
mod track;
mod transition;
