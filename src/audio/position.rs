use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Frame-accurate playback position shared with the audio callback.
///
/// The output callback advances the clock as it writes frames; the control
/// side reads it to report `current_time`. Frames are counted at the rate of
/// the loaded clip, not the device rate.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    inner: Arc<ClockInner>,
}

#[derive(Debug)]
struct ClockInner {
    sample_rate: u32,
    position: AtomicU64,
    total: AtomicU64,
    playing: AtomicBool,
    finished: AtomicBool,
}

impl PlaybackClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                sample_rate: sample_rate.max(1),
                position: AtomicU64::new(0),
                total: AtomicU64::new(0),
                playing: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    /// Start tracking a new clip of `total_frames`, paused at frame 0
    pub fn load(&self, total_frames: u64) {
        self.inner.playing.store(false, Ordering::SeqCst);
        self.inner.total.store(total_frames, Ordering::SeqCst);
        self.inner.position.store(0, Ordering::SeqCst);
        self.inner.finished.store(false, Ordering::SeqCst);
    }

    pub fn unload(&self) {
        self.load(0);
    }

    pub fn set_playing(&self, playing: bool) {
        self.inner.playing.store(playing, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    pub fn position_frames(&self) -> u64 {
        self.inner.position.load(Ordering::SeqCst)
    }

    pub fn total_frames(&self) -> u64 {
        self.inner.total.load(Ordering::SeqCst)
    }

    pub fn position_secs(&self) -> f64 {
        self.position_frames() as f64 / self.inner.sample_rate as f64
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_frames() as f64 / self.inner.sample_rate as f64
    }

    pub fn remaining_secs(&self) -> f64 {
        (self.duration_secs() - self.position_secs()).max(0.0)
    }

    /// Fraction of the clip played, 0.0 when nothing is loaded
    pub fn progress(&self) -> f64 {
        let total = self.total_frames();
        if total == 0 {
            0.0
        } else {
            self.position_frames() as f64 / total as f64
        }
    }

    /// Move to `secs`, clamped to the clip
    pub fn seek(&self, secs: f64) {
        let frame = (secs.max(0.0) * self.inner.sample_rate as f64).round() as u64;
        let clamped = frame.min(self.total_frames());
        self.inner.position.store(clamped, Ordering::SeqCst);
        self.inner.finished.store(false, Ordering::SeqCst);
    }

    /// Advance by up to `frames` while playing. Returns the frame index the
    /// caller should start reading from and how many frames it may read.
    /// Reaching the end stops the clock and raises the finished flag once.
    pub fn advance(&self, frames: u64) -> (u64, u64) {
        if !self.is_playing() {
            return (self.position_frames(), 0);
        }
        let total = self.total_frames();
        let start = self.position_frames();
        let granted = frames.min(total.saturating_sub(start));
        self.inner.position.store(start + granted, Ordering::SeqCst);

        if start + granted >= total {
            self.inner.playing.store(false, Ordering::SeqCst);
            self.inner.finished.store(true, Ordering::SeqCst);
        }
        (start, granted)
    }

    /// True once per clip end
    pub fn take_finished(&self) -> bool {
        self.inner.finished.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_clock_does_not_move() {
        let clock = PlaybackClock::new(24_000);
        clock.load(24_000);

        assert_eq!(clock.advance(512), (0, 0));
        assert_eq!(clock.position_secs(), 0.0);
        assert!(!clock.take_finished());
    }

    #[test]
    fn test_advance_and_finish() {
        let clock = PlaybackClock::new(1_000);
        clock.load(1_500);
        clock.set_playing(true);

        assert_eq!(clock.advance(1_000), (0, 1_000));
        assert_eq!(clock.position_secs(), 1.0);
        assert!((clock.progress() - 2.0 / 3.0).abs() < 1e-9);

        assert_eq!(clock.advance(1_000), (1_000, 500));
        assert!(!clock.is_playing());
        assert_eq!(clock.remaining_secs(), 0.0);
        assert!(clock.take_finished());
        assert!(!clock.take_finished());
    }

    #[test]
    fn test_seek_clamps_and_clears_finished() {
        let clock = PlaybackClock::new(1_000);
        clock.load(2_000);
        clock.set_playing(true);
        clock.advance(5_000);
        assert!(clock.inner.finished.load(Ordering::SeqCst));

        clock.seek(0.5);
        assert_eq!(clock.position_frames(), 500);
        assert!(!clock.take_finished());

        clock.seek(99.0);
        assert_eq!(clock.position_secs(), 2.0);
        clock.seek(-1.0);
        assert_eq!(clock.position_frames(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let clock = PlaybackClock::new(1_000);
        let callback_side = clock.clone();
        clock.load(1_000);
        clock.set_playing(true);

        callback_side.advance(250);
        assert_eq!(clock.position_secs(), 0.25);
    }
}
