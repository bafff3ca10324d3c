//! Per-granularity interval scheduler.
//!
//! An [`IntervalTrack`] owns one normalized interval sequence, a cursor for
//! the active interval, and at most one pending timer task. The sync engine
//! reseeds and resyncs it whenever the playback clock is re-anchored.
//!
//! Cancellation is the load-bearing part. A reseed must guarantee that no
//! timer armed for the old sequence can fire afterwards: the timer task
//! re-checks its cancellation epoch and emits while holding the cursor lock,
//! and `cancel` bumps the epoch under that same lock. Once `cancel` returns,
//! any stale task either already emitted or will see the new epoch and exit.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::analysis::{Granularity, TimeInterval};
use crate::events::{EngineEvent, EventBus};

#[derive(Debug)]
struct Cursor {
    active_index: usize,
    epoch: u64,
}

pub struct IntervalTrack {
    granularity: Granularity,
    intervals: Arc<Vec<TimeInterval>>,
    cursor: Arc<Mutex<Cursor>>,
    timer: Option<JoinHandle<()>>,
    bus: EventBus,
}

impl IntervalTrack {
    pub fn new(granularity: Granularity, bus: EventBus) -> Self {
        IntervalTrack {
            granularity,
            intervals: Arc::new(Vec::new()),
            cursor: Arc::new(Mutex::new(Cursor {
                active_index: 0,
                epoch: 0,
            })),
            timer: None,
            bus,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.cursor.lock().active_index
    }

    /// Replace the interval sequence and reset the cursor. Any pending timer
    /// is cancelled first.
    pub fn seed(&mut self, intervals: Vec<TimeInterval>) {
        self.cancel();
        self.intervals = Arc::new(intervals);
        self.cursor.lock().active_index = 0;
    }

    /// Point the cursor at the interval containing `position` and arm a
    /// timer for that interval's end.
    ///
    /// Positions before the first interval clamp to index 0; positions past
    /// the end of the sequence leave the track terminal (cursor on the last
    /// interval, no timer).
    pub fn sync_to(&mut self, position: Duration) {
        self.cancel();
        if self.intervals.is_empty() {
            return;
        }

        let index = self
            .intervals
            .partition_point(|iv| iv.start <= position)
            .saturating_sub(1);
        self.cursor.lock().active_index = index;

        let interval_end = self.intervals[index].end();
        if let Some(fire_in) = interval_end.checked_sub(position) {
            self.arm(fire_in);
        }
    }

    /// Cancel the pending timer without emitting. Idempotent: cancelling an
    /// already-fired or already-cancelled timer is a no-op.
    pub fn cancel(&mut self) {
        self.cursor.lock().epoch += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn arm(&mut self, first_delay: Duration) {
        let granularity = self.granularity;
        let intervals = Arc::clone(&self.intervals);
        let cursor = Arc::clone(&self.cursor);
        let bus = self.bus.clone();
        let epoch = cursor.lock().epoch;

        self.timer = Some(tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::time::sleep(delay).await;

                // Advance and emit in one critical section so a concurrent
                // cancel either fully precedes or fully follows this fire.
                let rearm = {
                    let mut cur = cursor.lock();
                    if cur.epoch != epoch {
                        return;
                    }
                    let index = cur.active_index;
                    let current = intervals[index];
                    let next = intervals.get(index + 1).copied();
                    if next.is_some() {
                        cur.active_index = index + 1;
                    }
                    bus.emit(EngineEvent::IntervalChanged {
                        granularity,
                        index,
                        current,
                        next,
                    });
                    next.map(|n| n.duration)
                };

                // The next fire uses the new interval's own duration rather
                // than a wall-clock recomputation; the engine's drift checks
                // absorb the accumulated error.
                match rearm {
                    Some(next_duration) => delay = next_duration,
                    None => return,
                }
            }
        }));
    }
}

impl Drop for IntervalTrack {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn beats(count: usize, each_ms: u64) -> Vec<TimeInterval> {
        (0..count)
            .map(|i| {
                TimeInterval::new(
                    Duration::from_millis(i as u64 * each_ms),
                    Duration::from_millis(each_ms),
                )
            })
            .collect()
    }

    fn interval_events(
        rx: &mut mpsc::Receiver<EngineEvent>,
    ) -> Vec<(usize, Option<TimeInterval>)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::IntervalChanged { index, next, .. } = event {
                out.push((index, next));
            }
        }
        out
    }

    #[tokio::test]
    async fn test_fires_through_sequence_then_goes_terminal() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut track = IntervalTrack::new(Granularity::Beat, bus);

        track.seed(beats(4, 50));
        track.sync_to(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(320)).await;

        let events = interval_events(&mut rx);
        assert_eq!(events.len(), 4);
        for (i, (index, next)) in events.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(next.is_some(), i < 3);
        }
        assert_eq!(track.active_index(), 3);
    }

    #[tokio::test]
    async fn test_sync_to_mid_track_picks_containing_interval() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut track = IntervalTrack::new(Granularity::Bar, bus);

        track.seed(beats(4, 100));
        track.sync_to(Duration::from_millis(250));
        assert_eq!(track.active_index(), 2);

        // The timer fires at the end of interval 2, ~50ms from now.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let events = interval_events(&mut rx);
        assert_eq!(events.first().map(|(i, _)| *i), Some(2));
    }

    #[tokio::test]
    async fn test_sync_past_end_is_terminal() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut track = IntervalTrack::new(Granularity::Tatum, bus);

        track.seed(beats(3, 40));
        track.sync_to(Duration::from_millis(500));
        assert_eq!(track.active_index(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(interval_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_reseed_kills_pending_timer() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut track = IntervalTrack::new(Granularity::Beat, bus);

        track.seed(beats(2, 50));
        track.sync_to(Duration::ZERO);

        // Reseed before the 50ms timer fires; the old deadline must pass
        // silently and only the new sequence may emit.
        track.seed(beats(2, 1000));
        track.sync_to(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(interval_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut track = IntervalTrack::new(Granularity::Section, bus);

        track.seed(beats(2, 40));
        track.sync_to(Duration::ZERO);
        track.cancel();
        track.cancel();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(interval_events(&mut rx).is_empty());

        // Cancelling after a natural terminal fire is also a no-op.
        track.sync_to(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(interval_events(&mut rx).len(), 2);
        track.cancel();
        track.cancel();
    }
}
