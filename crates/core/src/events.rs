//! Engine event plumbing.
//!
//! Consumers register explicitly via [`EventBus::subscribe`] and receive
//! every subsequent event on their own channel. Emission never blocks: a
//! saturated subscriber loses the event (with a warning), a dropped
//! subscriber is pruned. Events are emitted only after the state mutation
//! they describe has been committed, so a handler can never observe a
//! half-updated cursor.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::analysis::{AudioAnalysis, Granularity, TimeInterval};
use crate::source::TrackInfo;

const SUBSCRIBER_CAPACITY: usize = 256;

/// Everything the engine tells the outside world.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new track started playing. Emitted before the first interval event
    /// of the new track, so consumers always hold the matching analysis.
    TrackChanged {
        track: TrackInfo,
        analysis: Arc<AudioAnalysis>,
    },
    /// Playback stopped or paused.
    TrackStopped,
    /// The active interval of one granularity ended. `current` is the
    /// interval that just finished, `next` the one now beginning (`None` at
    /// the end of the track). `index` is `current`'s position in the
    /// analysis sequence.
    IntervalChanged {
        granularity: Granularity,
        index: usize,
        current: TimeInterval,
        next: Option<TimeInterval>,
    },
    /// A track session died (bad analysis). The engine is idle again.
    Error { message: String },
}

/// Multi-subscriber event fan-out.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<EngineEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber without blocking.
    pub fn emit(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("event subscriber saturated, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
