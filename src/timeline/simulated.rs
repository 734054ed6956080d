use std::collections::VecDeque;

use crate::error::PlaybackError;
use crate::timeline::player::{PlayerEvent, SegmentPlayer};
use crate::timeline::AudioResource;

#[derive(Debug, Clone)]
struct LoadedSegment {
    index: usize,
    duration: f64,
    position: f64,
}

/// A segment player driven by an explicit clock instead of audio hardware.
///
/// Time only moves when [`SimulatedPlayer::advance`] is called, which makes
/// controller behavior reproducible in tests and in dry runs. Segment length
/// comes from the container header.
#[derive(Debug, Default)]
pub struct SimulatedPlayer {
    loaded: Option<LoadedSegment>,
    playing: bool,
    events: VecDeque<PlayerEvent>,
    failing_loads: u32,
    load_history: Vec<usize>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `load` fail
    pub fn fail_next_loads(&mut self, count: u32) {
        self.failing_loads = count;
    }

    /// Report an asynchronous failure of the loaded segment
    pub fn fail_loaded(&mut self, reason: &str) {
        if let Some(loaded) = self.loaded.take() {
            self.playing = false;
            self.events.push_back(PlayerEvent::Failed {
                index: loaded.index,
                reason: reason.to_string(),
            });
        }
    }

    /// Move the clock forward by `dt` seconds
    pub fn advance(&mut self, dt: f64) {
        if !self.playing {
            return;
        }
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.position += dt.max(0.0);
            if loaded.position >= loaded.duration {
                loaded.position = loaded.duration;
                self.playing = false;
                self.events.push_back(PlayerEvent::Ended {
                    index: loaded.index,
                });
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Indices passed to `load`, in call order (including failed loads)
    pub fn load_history(&self) -> &[usize] {
        &self.load_history
    }
}

impl SegmentPlayer for SimulatedPlayer {
    fn load(&mut self, index: usize, resource: &AudioResource) -> Result<(), PlaybackError> {
        self.load_history.push(index);
        self.loaded = None;
        self.playing = false;

        if self.failing_loads > 0 {
            self.failing_loads -= 1;
            return Err(PlaybackError::LoadFailed {
                index,
                reason: "simulated load failure".to_string(),
            });
        }

        let duration = resource
            .container()
            .header()
            .ok()
            .and_then(|header| header.nominal_duration())
            .ok_or_else(|| PlaybackError::LoadFailed {
                index,
                reason: "unreadable WAVE header".to_string(),
            })?;

        self.loaded = Some(LoadedSegment {
            index,
            duration,
            position: 0.0,
        });
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = None;
        self.playing = false;
        self.events.clear();
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        match &self.loaded {
            Some(_) => {
                self.playing = true;
                Ok(())
            }
            None => Err(PlaybackError::ResourceMissing {
                index: self.load_history.last().copied().unwrap_or(0),
            }),
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, offset: f64) -> Result<(), PlaybackError> {
        match self.loaded.as_mut() {
            Some(loaded) => {
                loaded.position = offset.clamp(0.0, loaded.duration);
                Ok(())
            }
            None => Err(PlaybackError::ResourceMissing {
                index: self.load_history.last().copied().unwrap_or(0),
            }),
        }
    }

    fn current_time(&self) -> f64 {
        self.loaded.as_ref().map(|l| l.position).unwrap_or(0.0)
    }

    fn loaded_index(&self) -> Option<usize> {
        self.loaded.as_ref().map(|l| l.index)
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop_front()
    }
}
