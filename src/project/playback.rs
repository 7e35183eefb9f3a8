use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Cooperative playback clock for interactive preview.
///
/// One tick every `1000/fps` milliseconds advances the playhead a single
/// frame; the tick handler renders that frame and syncs the audio position.
/// Ticks never overlap: a slow handler delays the next tick instead of
/// stacking re-entrant ones.
pub struct PlaybackClock {
    fps: f64,
    playing: Arc<AtomicBool>,
}

impl PlaybackClock {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis((1000.0 / self.fps) as u64)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Stop handle usable from outside the run loop.
    pub fn stopper(&self) -> PlaybackStopper {
        PlaybackStopper {
            playing: Arc::clone(&self.playing),
        }
    }

    /// Drive playback until the handler reports the end of the timeline or
    /// [`PlaybackStopper::stop`] is called. The handler receives the tick
    /// ordinal and returns `false` to end playback (needle hit the end).
    pub async fn run<F>(&self, mut on_tick: F)
    where
        F: FnMut(u64) -> bool,
    {
        self.playing.store(true, Ordering::SeqCst);
        let mut ticker = tokio::time::interval(self.interval());
        // A delayed tick shifts the schedule instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; swallow that first tick so the
        // needle advances only after one real frame interval.
        ticker.tick().await;

        let mut ticks = 0u64;
        while self.playing.load(Ordering::SeqCst) {
            ticker.tick().await;
            ticks += 1;
            if !on_tick(ticks) {
                break;
            }
        }
        self.playing.store(false, Ordering::SeqCst);
        debug!("Playback stopped after {} ticks", ticks);
    }
}

/// Cloneable stop flag for a running clock.
#[derive(Clone)]
pub struct PlaybackStopper {
    playing: Arc<AtomicBool>,
}

impl PlaybackStopper {
    pub fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }
}
