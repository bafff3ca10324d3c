use crate::source::SourceError;

/// Errors surfaced by the sync and transition engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller passed an out-of-range or nonsensical argument. Nothing was
    /// mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs an active track and there is none.
    #[error("no track is currently active")]
    NoActiveTrack,

    /// The track's audio analysis is missing or unusable. Fatal to the
    /// current track session only; the poll loop keeps running.
    #[error("analysis rejected: {0}")]
    Analysis(String),

    /// A playback source call failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}
