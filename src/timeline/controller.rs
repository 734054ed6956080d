//! Playback state machine over a [`Timeline`].
//!
//! The controller owns one [`SegmentPlayer`] and keeps exactly one segment
//! loaded at a time. Hosts call [`PlaybackController::tick`] once per frame;
//! each tick drains player events (segment ended, load failed), retries
//! buffered segments whose audio has arrived, and samples the displayed
//! global time.

use crate::error::TimelineError;
use crate::logging::NarrationLogger;
use crate::timeline::player::{PlayerEvent, SegmentPlayer};
use crate::timeline::recovery::{LoadRecovery, RecoveryResult};
use crate::timeline::{SeekTarget, Timeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Seeking,
    Ended,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Seeking => "seeking",
            PlaybackState::Ended => "ended",
        }
    }
}

/// Whether the active segment's audio is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferState {
    Ready,
    /// Waiting for the segment's audio (synthesis in flight or load retry pending)
    Buffering { index: usize },
    /// Loading kept failing; stays here until the user retries or moves away
    Failed { index: usize, reason: String },
}

/// Everything a progress display needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub state: PlaybackState,
    pub buffer: BufferState,
    pub active_index: usize,
    pub display_time: f64,
    /// `None` while any segment's duration is unknown
    pub total_duration: Option<f64>,
    pub segment_count: usize,
}

impl ControllerSnapshot {
    /// Fraction of the timeline played, when the total is known
    pub fn progress(&self) -> Option<f64> {
        self.total_duration.map(|total| {
            if total > 0.0 {
                (self.display_time / total).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self.buffer, BufferState::Buffering { .. })
    }
}

pub struct PlaybackController<P: SegmentPlayer> {
    player: P,
    timeline: Timeline,
    state: PlaybackState,
    /// State to return to when a seek gesture ends
    resume_state: PlaybackState,
    active_index: usize,
    display_time: f64,
    seek_origin: f64,
    buffer: BufferState,
    /// Local offset to apply once a buffered segment becomes loadable
    pending_offset: f64,
    recovery: LoadRecovery,
    logger: NarrationLogger,
}

impl<P: SegmentPlayer> PlaybackController<P> {
    pub fn new(player: P, max_load_attempts: u32) -> Self {
        Self {
            player,
            timeline: Timeline::default(),
            state: PlaybackState::Idle,
            resume_state: PlaybackState::Paused,
            active_index: 0,
            display_time: 0.0,
            seek_origin: 0.0,
            buffer: BufferState::Ready,
            pending_offset: 0.0,
            recovery: LoadRecovery::new(max_load_attempts),
            logger: NarrationLogger::new(),
        }
    }

    pub fn with_logger(mut self, logger: NarrationLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn buffer(&self) -> &BufferState {
        &self.buffer
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn display_time(&self) -> f64 {
        self.display_time
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Install a new view of the segment list.
    ///
    /// A timeline from a different generation run (epoch) or with a different
    /// segment count resets the cursor to segment 0, time 0. A newer view of
    /// the same run keeps the cursor and unblocks any segment that was
    /// waiting for its audio.
    pub fn set_timeline(&mut self, timeline: Timeline) {
        let same_run =
            timeline.epoch() == self.timeline.epoch() && timeline.len() == self.timeline.len();
        self.timeline = timeline;

        if same_run {
            self.resume_buffered();
        } else {
            self.reset_cursor();
        }
    }

    pub fn play(&mut self) -> Result<(), TimelineError> {
        if self.timeline.is_empty() {
            return Err(TimelineError::EmptyTimeline);
        }

        match self.state {
            PlaybackState::Seeking => {
                self.resume_state = PlaybackState::Playing;
                return Ok(());
            }
            PlaybackState::Ended => {
                self.state = PlaybackState::Playing;
                self.player.unload();
                let first = self.timeline.first_playable().unwrap_or(0);
                self.activate(first, 0.0);
                return Ok(());
            }
            _ => {}
        }

        self.state = PlaybackState::Playing;
        match self.buffer.clone() {
            BufferState::Failed { index, .. } => {
                self.recovery.forget(index);
                let offset = self.pending_offset;
                self.activate(index, offset);
            }
            BufferState::Buffering { .. } => {}
            BufferState::Ready if self.player.loaded_index() == Some(self.active_index) => {
                if let Err(e) = self.player.play() {
                    let offset = self.player.current_time();
                    self.handle_failure(self.active_index, offset, e.to_string());
                }
            }
            BufferState::Ready => {
                let offset = self
                    .timeline
                    .start_offset(self.active_index)
                    .map(|start| (self.display_time - start).max(0.0))
                    .unwrap_or(0.0);
                self.activate(self.active_index, offset);
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.player.pause();
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Seeking => self.resume_state = PlaybackState::Paused,
            _ => {}
        }
    }

    pub fn toggle(&mut self) -> Result<(), TimelineError> {
        let playing = self.state == PlaybackState::Playing
            || (self.state == PlaybackState::Seeking && self.resume_state == PlaybackState::Playing);
        if playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Start a scrub gesture. Fails while the total duration is undefined.
    pub fn begin_seek(&mut self) -> Result<(), TimelineError> {
        self.timeline.total_duration()?;
        if self.state == PlaybackState::Seeking {
            return Ok(());
        }

        self.resume_state = match self.state {
            PlaybackState::Playing => PlaybackState::Playing,
            _ => PlaybackState::Paused,
        };
        self.seek_origin = self.display_time;
        self.player.pause();
        self.state = PlaybackState::Seeking;
        Ok(())
    }

    /// Follow the gesture. The displayed time is clamped to the timeline.
    pub fn scrub_to(&mut self, target: f64) -> Result<f64, TimelineError> {
        if self.state != PlaybackState::Seeking {
            return Err(TimelineError::NotSeeking);
        }
        if target.is_nan() {
            return Err(TimelineError::InvalidTarget(target));
        }
        let total = self.timeline.total_duration()?;
        self.display_time = target.clamp(0.0, total);
        Ok(self.display_time)
    }

    /// Finish the gesture and move playback to wherever it was released
    pub fn end_seek(&mut self) -> Result<SeekTarget, TimelineError> {
        if self.state != PlaybackState::Seeking {
            return Err(TimelineError::NotSeeking);
        }
        self.state = self.resume_state;
        let target = self.timeline.resolve(self.display_time)?;

        if target.index != self.active_index {
            self.player.unload();
        }
        self.logger
            .log_seek(self.seek_origin, self.display_time, target.index, target.offset);
        self.activate(target.index, target.offset);
        Ok(target)
    }

    /// Jump straight to a global time (click on the progress bar)
    pub fn seek(&mut self, target: f64) -> Result<SeekTarget, TimelineError> {
        self.begin_seek()?;
        if let Err(e) = self.scrub_to(target) {
            self.cancel_gesture();
            return Err(e);
        }
        self.end_seek()
    }

    /// Move to the start of the next narrated segment. No-op at the last one.
    pub fn skip_forward(&mut self) {
        self.cancel_gesture();
        if let Some(next) = self.timeline.next_playable_after(self.active_index) {
            self.move_to(next);
        }
    }

    /// Move to the start of the previous narrated segment, or restart the
    /// current one when there is none before it.
    pub fn skip_back(&mut self) {
        if self.timeline.is_empty() {
            return;
        }
        self.cancel_gesture();
        let target = self
            .timeline
            .previous_playable_before(self.active_index)
            .unwrap_or(self.active_index);
        self.move_to(target);
    }

    /// Process player events and sample the displayed time for this frame
    pub fn tick(&mut self) -> ControllerSnapshot {
        while let Some(event) = self.player.poll_event() {
            self.handle_event(event);
        }
        self.resume_buffered();

        if self.state == PlaybackState::Playing && self.buffer == BufferState::Ready {
            if let Ok(start) = self.timeline.start_offset(self.active_index) {
                // audio may outlast its measured duration
                let mut local = self.player.current_time();
                if let Some(duration) = self.timeline.segment(self.active_index).and_then(|s| s.duration) {
                    local = local.min(duration);
                }
                let now = start + local;
                if now > self.display_time {
                    self.display_time = now;
                }
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            buffer: self.buffer.clone(),
            active_index: self.active_index,
            display_time: self.display_time,
            total_duration: self.timeline.total_duration().ok(),
            segment_count: self.timeline.len(),
        }
    }

    fn reset_cursor(&mut self) {
        self.player.unload();
        self.state = PlaybackState::Idle;
        self.resume_state = PlaybackState::Paused;
        self.active_index = 0;
        self.display_time = 0.0;
        self.seek_origin = 0.0;
        self.buffer = BufferState::Ready;
        self.pending_offset = 0.0;
        self.recovery.clear();
    }

    fn cancel_gesture(&mut self) {
        if self.state == PlaybackState::Seeking {
            self.state = self.resume_state;
            self.display_time = self.seek_origin;
            if self.state == PlaybackState::Playing && self.buffer == BufferState::Ready {
                if let Err(e) = self.player.play() {
                    let offset = self.player.current_time();
                    self.handle_failure(self.active_index, offset, e.to_string());
                }
            }
        }
    }

    fn move_to(&mut self, index: usize) {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Ended) {
            self.state = PlaybackState::Paused;
        }
        if index != self.active_index {
            self.player.unload();
        }
        if let BufferState::Failed { index: failed, .. } = self.buffer {
            if failed == index {
                self.recovery.forget(index);
            }
        }
        self.activate(index, 0.0);
    }

    /// Make `index` the active segment positioned at `offset`.
    ///
    /// Narration-missing segments are passed over. Without audio the
    /// controller buffers; with audio it loads (if needed), seeks and resumes
    /// playback when the current intent is to play.
    fn activate(&mut self, index: usize, offset: f64) {
        let (skipped, resource) = match self.timeline.segment(index) {
            Some(segment) => (segment.is_skipped(), segment.resource.clone()),
            None => return,
        };

        if skipped {
            match self.timeline.next_playable_after(index) {
                Some(next) => self.activate(next, 0.0),
                None => {
                    self.active_index = index;
                    self.finish();
                }
            }
            return;
        }

        self.active_index = index;
        if let Ok(start) = self.timeline.start_offset(index) {
            self.display_time = start + offset;
        }

        let resource = match resource {
            Some(resource) => resource,
            None => {
                if self.player.loaded_index().is_some() {
                    self.player.unload();
                }
                self.pending_offset = offset;
                if self.buffer != (BufferState::Buffering { index }) {
                    self.logger.log_buffering(index);
                }
                self.buffer = BufferState::Buffering { index };
                return;
            }
        };

        if self.player.loaded_index() != Some(index) {
            if let Err(e) = self.player.load(index, &resource) {
                self.handle_failure(index, offset, e.to_string());
                return;
            }
            self.recovery.record_success(index);
        }
        if let Err(e) = self.player.seek(offset) {
            self.handle_failure(index, offset, e.to_string());
            return;
        }

        self.buffer = BufferState::Ready;
        self.pending_offset = 0.0;
        if self.state == PlaybackState::Playing {
            if let Err(e) = self.player.play() {
                self.handle_failure(index, offset, e.to_string());
            }
        }
    }

    fn handle_failure(&mut self, index: usize, offset: f64, reason: String) {
        self.player.unload();
        self.pending_offset = offset;

        let result = self.recovery.record_failure(index, &reason);
        self.logger
            .log_segment_load_failed(index, &reason, self.recovery.attempts(index));
        self.buffer = match result {
            RecoveryResult::Retry(_) => BufferState::Buffering { index },
            RecoveryResult::Failed(message) => BufferState::Failed {
                index,
                reason: message,
            },
        };
    }

    fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ended { index } => {
                // Stale completions (after a seek or pause) are dropped
                if index != self.active_index || self.state != PlaybackState::Playing {
                    return;
                }
                match self.timeline.next_playable_after(index) {
                    Some(next) => {
                        self.logger.log_segment_advanced(index, next);
                        self.player.unload();
                        self.activate(next, 0.0);
                    }
                    None => self.finish(),
                }
            }
            PlayerEvent::Failed { index, reason } => {
                if index == self.active_index {
                    let offset = self.player.current_time();
                    self.handle_failure(index, offset, reason);
                }
            }
        }
    }

    fn resume_buffered(&mut self) {
        if let BufferState::Buffering { index } = self.buffer {
            let loadable = self
                .timeline
                .segment(index)
                .map(|s| s.is_skipped() || s.resource.is_some())
                .unwrap_or(false);
            if loadable {
                let offset = self.pending_offset;
                self.activate(index, offset);
            }
        }
    }

    fn finish(&mut self) {
        self.player.pause();
        self.state = PlaybackState::Ended;
        self.buffer = BufferState::Ready;
        if let Ok(total) = self.timeline.total_duration() {
            self.display_time = total;
        }
        self.logger.log_playback_ended(self.display_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::{wrap_pcm, TTS_SAMPLE_RATE};
    use crate::timeline::{
        AudioResource, NarrationStatus, ResourceTracker, Segment, SimulatedPlayer,
    };

    fn resource(tracker: &ResourceTracker, seconds: f64) -> AudioResource {
        let bytes = (seconds * TTS_SAMPLE_RATE as f64) as usize * 2;
        tracker.register(wrap_pcm(&vec![0u8; bytes], TTS_SAMPLE_RATE).unwrap())
    }

    fn ready_timeline(epoch: u64, durations: &[f64]) -> Timeline {
        let tracker = ResourceTracker::new();
        let segments = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| Segment::ready(i, d, resource(&tracker, d)))
            .collect();
        Timeline::new(epoch, segments)
    }

    fn controller_with(timeline: Timeline) -> PlaybackController<SimulatedPlayer> {
        let mut controller = PlaybackController::new(SimulatedPlayer::new(), 3);
        controller.set_timeline(timeline);
        controller
    }

    fn run(controller: &mut PlaybackController<SimulatedPlayer>, dt: f64, frames: usize) -> Vec<f64> {
        (0..frames)
            .map(|_| {
                controller.player_mut().advance(dt);
                controller.tick().display_time
            })
            .collect()
    }

    #[test]
    fn test_single_segment_plays_to_end() {
        let mut controller = controller_with(ready_timeline(1, &[4.0]));
        assert_eq!(controller.state(), PlaybackState::Idle);

        controller.play().unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);

        run(&mut controller, 0.5, 10);
        assert_eq!(controller.state(), PlaybackState::Ended);
        assert_eq!(controller.display_time(), 4.0);
        assert_eq!(controller.snapshot().progress(), Some(1.0));
    }

    #[test]
    fn test_playback_is_monotonic_across_boundaries() {
        let mut controller = controller_with(ready_timeline(1, &[1.0, 1.5, 0.5]));
        controller.play().unwrap();

        let times = run(&mut controller, 0.1, 40);
        assert!(times.windows(2).all(|w| w[1] >= w[0]), "{:?}", times);
        assert_eq!(controller.state(), PlaybackState::Ended);
        assert_eq!(controller.display_time(), 3.0);
        assert_eq!(controller.player().load_history(), &[0, 1, 2]);
    }

    #[test]
    fn test_audio_longer_than_measured_duration_stays_monotonic() {
        let tracker = ResourceTracker::new();
        let timeline = Timeline::new(
            1,
            vec![
                Segment::ready(0, 1.0, resource(&tracker, 2.0)),
                Segment::ready(1, 1.0, resource(&tracker, 1.0)),
            ],
        );
        let mut controller = controller_with(timeline);
        controller.play().unwrap();

        let times = run(&mut controller, 0.25, 16);
        assert!(times.windows(2).all(|w| w[1] >= w[0]), "{:?}", times);
        assert!(times.iter().all(|&t| t <= 2.0), "{:?}", times);
        assert_eq!(times[5], 1.0);
        assert_eq!(controller.state(), PlaybackState::Ended);
        assert_eq!(controller.display_time(), 2.0);
    }

    #[test]
    fn test_seek_into_unsynthesized_segment_buffers() {
        let tracker = ResourceTracker::new();
        let unsynthesized = |index| Segment {
            index,
            duration: Some(2.0),
            resource: None,
            narration: NarrationStatus::Pending,
        };
        let timeline = Timeline::new(
            1,
            vec![
                Segment::ready(0, 2.0, resource(&tracker, 2.0)),
                unsynthesized(1),
                unsynthesized(2),
            ],
        );
        let mut controller = controller_with(timeline);
        controller.play().unwrap();

        let target = controller.seek(3.5).unwrap();
        assert_eq!(target, SeekTarget { index: 1, offset: 1.5 });

        let snapshot = controller.tick();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.buffer, BufferState::Buffering { index: 1 });
        assert_eq!(snapshot.active_index, 1);
        assert_eq!(snapshot.display_time, 3.5);
        assert_eq!(controller.player().loaded_index(), None);

        // Audio arrives: playback resumes at the requested offset
        let timeline = Timeline::new(
            1,
            vec![
                Segment::ready(0, 2.0, resource(&tracker, 2.0)),
                Segment::ready(1, 2.0, resource(&tracker, 2.0)),
                unsynthesized(2),
            ],
        );
        controller.set_timeline(timeline);
        let snapshot = controller.tick();
        assert_eq!(snapshot.buffer, BufferState::Ready);
        assert_eq!(controller.player().loaded_index(), Some(1));
        assert!(controller.player().is_playing());
        assert_eq!(controller.player().current_time(), 1.5);
    }

    #[test]
    fn test_auto_advance_waits_at_pending_boundary() {
        let tracker = ResourceTracker::new();
        let timeline = Timeline::new(
            3,
            vec![Segment::ready(0, 1.0, resource(&tracker, 1.0)), Segment::pending(1)],
        );
        let mut controller = controller_with(timeline);
        controller.play().unwrap();

        run(&mut controller, 0.25, 6);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.buffer, BufferState::Buffering { index: 1 });
        assert_eq!(snapshot.display_time, 1.0);
        assert_eq!(snapshot.total_duration, None);
        assert_eq!(snapshot.progress(), None);
        assert!(controller.begin_seek().is_err());
    }

    #[test]
    fn test_failed_load_retries_then_surfaces_error() {
        let mut controller = controller_with(ready_timeline(1, &[2.0]));
        controller.player_mut().fail_next_loads(10);

        controller.play().unwrap();
        assert_eq!(controller.buffer(), &BufferState::Buffering { index: 0 });
        controller.tick();
        assert_eq!(controller.buffer(), &BufferState::Buffering { index: 0 });
        controller.tick();
        assert!(matches!(controller.buffer(), BufferState::Failed { index: 0, .. }));

        // No further automatic attempts
        controller.tick();
        assert_eq!(controller.player().load_history().len(), 3);

        // An explicit play retries
        controller.player_mut().fail_next_loads(0);
        controller.play().unwrap();
        assert_eq!(controller.buffer(), &BufferState::Ready);
        assert!(controller.player().is_playing());
    }

    #[test]
    fn test_seeking_ignores_player_updates() {
        let mut controller = controller_with(ready_timeline(1, &[2.0, 2.0]));
        controller.play().unwrap();
        run(&mut controller, 0.5, 2);

        controller.begin_seek().unwrap();
        controller.scrub_to(3.0).unwrap();
        controller.player_mut().play().unwrap();
        controller.player_mut().advance(0.5);
        assert_eq!(controller.tick().display_time, 3.0);

        controller.end_seek().unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.active_index(), 1);
        assert_eq!(controller.player().current_time(), 1.0);
    }

    #[test]
    fn test_seek_restores_paused_state() {
        let mut controller = controller_with(ready_timeline(1, &[3.0, 5.0, 2.0]));
        controller.seek(7.5).unwrap();

        assert_eq!(controller.state(), PlaybackState::Paused);
        assert_eq!(controller.active_index(), 1);
        assert_eq!(controller.display_time(), 7.5);
        assert!(!controller.player().is_playing());

        assert_eq!(controller.scrub_to(1.0), Err(TimelineError::NotSeeking));
    }

    #[test]
    fn test_skips_clamp_to_range() {
        let mut controller = controller_with(ready_timeline(1, &[1.0, 1.0]));
        controller.play().unwrap();
        run(&mut controller, 0.25, 2);

        controller.skip_back();
        assert_eq!(controller.active_index(), 0);
        assert_eq!(controller.display_time(), 0.0);
        assert_eq!(controller.player().current_time(), 0.0);

        controller.skip_forward();
        assert_eq!(controller.active_index(), 1);
        assert_eq!(controller.display_time(), 1.0);

        controller.skip_forward();
        assert_eq!(controller.active_index(), 1);
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_missing_narration_is_skipped() {
        let tracker = ResourceTracker::new();
        let timeline = Timeline::new(
            1,
            vec![
                Segment::ready(0, 1.0, resource(&tracker, 1.0)),
                Segment::missing(1),
                Segment::ready(2, 1.0, resource(&tracker, 1.0)),
            ],
        );
        let mut controller = controller_with(timeline);
        controller.play().unwrap();

        run(&mut controller, 0.25, 12);
        assert_eq!(controller.state(), PlaybackState::Ended);
        assert_eq!(controller.display_time(), 2.0);
        assert_eq!(controller.player().load_history(), &[0, 2]);
    }

    #[test]
    fn test_play_after_end_restarts() {
        let mut controller = controller_with(ready_timeline(1, &[1.0]));
        controller.play().unwrap();
        run(&mut controller, 0.5, 3);
        assert_eq!(controller.state(), PlaybackState::Ended);

        controller.play().unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.display_time(), 0.0);
        assert_eq!(controller.active_index(), 0);
    }

    #[test]
    fn test_new_run_resets_cursor() {
        let mut controller = controller_with(ready_timeline(1, &[1.0, 1.0]));
        controller.play().unwrap();
        controller.skip_forward();
        assert_eq!(controller.active_index(), 1);

        controller.set_timeline(ready_timeline(2, &[1.0, 1.0]));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.active_index(), 0);
        assert_eq!(controller.display_time(), 0.0);
        assert_eq!(controller.player().loaded_index(), None);
    }

    #[test]
    fn test_empty_timeline_cannot_play() {
        let mut controller = PlaybackController::new(SimulatedPlayer::new(), 3);
        assert_eq!(controller.play(), Err(TimelineError::EmptyTimeline));
        assert_eq!(controller.toggle(), Err(TimelineError::EmptyTimeline));
    }
}
