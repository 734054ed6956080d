//! Ordered narration segments presented as one continuous timeline.

pub mod controller;
pub mod player;
pub mod recovery;
pub mod simulated;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::audio::wav::WavContainer;
use crate::error::TimelineError;

pub use controller::{BufferState, ControllerSnapshot, PlaybackController, PlaybackState};
pub use player::{PlayerEvent, SegmentPlayer};
pub use recovery::{LoadRecovery, RecoveryResult};
pub use simulated::SimulatedPlayer;

/// Narration state of a single slide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationStatus {
    /// Synthesis has not finished yet
    Pending,
    Ready,
    /// Synthesis failed; the segment occupies no time and is skipped
    Missing,
}

/// Counts packaged containers that are still alive.
///
/// Every [`AudioResource`] registered through a tracker decrements the
/// shared counter when its last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, container: WavContainer) -> AudioResource {
        self.live.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        AudioResource {
            inner: Arc::new(ResourceInner {
                id,
                container,
                live: self.live.clone(),
            }),
        }
    }

    /// Number of registered containers not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct ResourceInner {
    id: u64,
    container: WavContainer,
    live: Arc<AtomicUsize>,
}

impl Drop for ResourceInner {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared handle to a segment's packaged audio
#[derive(Clone)]
pub struct AudioResource {
    inner: Arc<ResourceInner>,
}

impl AudioResource {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Handle that does not keep the container alive
    pub fn downgrade(&self) -> WeakAudioResource {
        WeakAudioResource {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn container(&self) -> &WavContainer {
        &self.inner.container
    }
}

impl fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioResource")
            .field("id", &self.inner.id)
            .field("bytes", &self.inner.container.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WeakAudioResource {
    inner: Weak<ResourceInner>,
}

impl WeakAudioResource {
    /// True once every [`AudioResource`] clone has been dropped
    pub fn is_released(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

/// One slide's narration within the timeline
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub duration: Option<f64>,
    pub resource: Option<AudioResource>,
    pub narration: NarrationStatus,
}

impl Segment {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            duration: None,
            resource: None,
            narration: NarrationStatus::Pending,
        }
    }

    pub fn ready(index: usize, duration: f64, resource: AudioResource) -> Self {
        Self {
            index,
            duration: Some(duration),
            resource: Some(resource),
            narration: NarrationStatus::Ready,
        }
    }

    pub fn missing(index: usize) -> Self {
        Self {
            index,
            duration: Some(0.0),
            resource: None,
            narration: NarrationStatus::Missing,
        }
    }

    /// Duration as it counts on the timeline. Missing narration occupies no time.
    pub fn effective_duration(&self) -> Option<f64> {
        match self.narration {
            NarrationStatus::Missing => Some(0.0),
            _ => self.duration,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.narration == NarrationStatus::Missing
    }
}

/// Where a global time lands on the timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub index: usize,
    pub offset: f64,
}

/// An ordered, contiguous sequence of segments tagged with the epoch of the
/// generation run that produced it.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    epoch: u64,
    segments: Vec<Segment>,
}

impl Timeline {
    /// Segment indices are renumbered to match their position.
    pub fn new(epoch: u64, mut segments: Vec<Segment>) -> Self {
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.index = i;
        }
        Self { epoch, segments }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.segments.len().checked_sub(1)
    }

    /// All effective durations, or the first segment whose duration is unknown
    pub fn durations(&self) -> Result<Vec<f64>, TimelineError> {
        if self.segments.is_empty() {
            return Err(TimelineError::EmptyTimeline);
        }
        self.segments.iter().map(checked_duration).collect()
    }

    /// Sum of all durations. Undefined while any duration is unknown.
    pub fn total_duration(&self) -> Result<f64, TimelineError> {
        Ok(self.durations()?.iter().sum())
    }

    /// Global time at which segment `index` starts
    pub fn start_offset(&self, index: usize) -> Result<f64, TimelineError> {
        if index >= self.segments.len() {
            return Err(TimelineError::IndexOutOfRange {
                index,
                len: self.segments.len(),
            });
        }
        self.segments[..index]
            .iter()
            .map(checked_duration)
            .sum::<Result<f64, TimelineError>>()
    }

    pub fn resolve(&self, target: f64) -> Result<SeekTarget, TimelineError> {
        if target.is_nan() {
            return Err(TimelineError::InvalidTarget(target));
        }
        let durations = self.durations()?;
        resolve_global_time(&durations, target)
            .map(|(index, offset)| SeekTarget { index, offset })
            .ok_or(TimelineError::InvalidTarget(target))
    }

    /// First non-skipped segment after `index`
    pub fn next_playable_after(&self, index: usize) -> Option<usize> {
        self.segments
            .iter()
            .skip(index + 1)
            .find(|s| !s.is_skipped())
            .map(|s| s.index)
    }

    /// Last non-skipped segment before `index`
    pub fn previous_playable_before(&self, index: usize) -> Option<usize> {
        self.segments
            .iter()
            .take(index)
            .rev()
            .find(|s| !s.is_skipped())
            .map(|s| s.index)
    }

    pub fn first_playable(&self) -> Option<usize> {
        self.segments.iter().find(|s| !s.is_skipped()).map(|s| s.index)
    }
}

fn checked_duration(segment: &Segment) -> Result<f64, TimelineError> {
    match segment.effective_duration() {
        None => Err(TimelineError::DurationUnknown {
            index: segment.index,
        }),
        Some(value) if !value.is_finite() || value < 0.0 => Err(TimelineError::InvalidDuration {
            index: segment.index,
            value,
        }),
        Some(value) => Ok(value),
    }
}

/// Map a global time onto `(segment index, local offset)`.
///
/// Segment `i` owns `[S_i, S_i + D_i)`, so a boundary belongs to the segment
/// starting there. Targets at or past the end clamp to the end of the last
/// segment; negative targets clamp to zero. Returns `None` for an empty list
/// or a NaN target.
pub fn resolve_global_time(durations: &[f64], target: f64) -> Option<(usize, f64)> {
    if durations.is_empty() || target.is_nan() {
        return None;
    }
    let target = target.max(0.0);

    let mut start = 0.0;
    let mut last_start = 0.0;
    for (i, &duration) in durations.iter().enumerate() {
        if target < start + duration {
            return Some((i, (target - start).clamp(0.0, duration)));
        }
        last_start = start;
        start += duration;
    }

    let last = durations.len() - 1;
    Some((last, (target - last_start).clamp(0.0, durations[last])))
}
