use crate::error::PlaybackError;
use crate::timeline::AudioResource;

/// Something that happened to the loaded segment since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ended { index: usize },
    Failed { index: usize, reason: String },
}

/// Play/pause/seek over one segment's audio at a time.
///
/// The controller drives exactly one player; loading a new segment replaces
/// whatever was loaded before. Completion and asynchronous failures are
/// reported through [`SegmentPlayer::poll_event`] rather than callbacks.
pub trait SegmentPlayer {
    fn load(&mut self, index: usize, resource: &AudioResource) -> Result<(), PlaybackError>;

    fn unload(&mut self);

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    /// Move the local position of the loaded segment
    fn seek(&mut self, offset: f64) -> Result<(), PlaybackError>;

    /// Local position within the loaded segment, in seconds
    fn current_time(&self) -> f64;

    fn loaded_index(&self) -> Option<usize>;

    fn poll_event(&mut self) -> Option<PlayerEvent>;
}
