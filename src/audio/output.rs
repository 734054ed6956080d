use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, error, info};

use crate::audio::decoder::decode_wav;
use crate::audio::device::{output_config, OutputDevices};
use crate::audio::position::PlaybackClock;
use crate::audio::resampler::LinearResampler;
use crate::error::PlaybackError;
use crate::timeline::player::{PlayerEvent, SegmentPlayer};
use crate::timeline::{AudioResource, WeakAudioResource};

type SharedClip = Arc<Mutex<Option<Arc<Vec<f32>>>>>;

/// Plays narration segments on a cpal output device.
///
/// One output stream is opened up front and stays running; loading a segment
/// swaps the clip the stream reads from. Clips are decoded, mixed down to
/// mono and resampled to the device rate on load, then cached for as long as
/// their resource is alive.
pub struct DevicePlayer {
    _stream: Stream,
    device_name: String,
    device_rate: u32,
    clip: SharedClip,
    clock: PlaybackClock,
    volume: Arc<AtomicU32>,
    stream_error: Arc<Mutex<Option<String>>>,
    loaded: Option<usize>,
    cache: ClipCache,
}

impl DevicePlayer {
    /// Open the named device, or the default one
    pub fn open(device: Option<&str>, volume: f32) -> Result<Self, PlaybackError> {
        let devices = OutputDevices::new()?;
        let device = devices.select(device)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown device".to_string());

        let supported = output_config(&device)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let device_rate = config.sample_rate.0;

        let clip: SharedClip = Arc::new(Mutex::new(None));
        let clock = PlaybackClock::new(device_rate);
        let volume = Arc::new(AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()));
        let stream_error = Arc::new(Mutex::new(None));

        let shared = CallbackShared {
            clip: Arc::clone(&clip),
            clock: clock.clone(),
            volume: Arc::clone(&volume),
            stream_error: Arc::clone(&stream_error),
        };
        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32>(&device, &config, shared)?,
            SampleFormat::I16 => create_stream::<i16>(&device, &config, shared)?,
            SampleFormat::U16 => create_stream::<u16>(&device, &config, shared)?,
            other => {
                return Err(PlaybackError::InitializationFailed(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };
        stream
            .play()
            .map_err(|e| PlaybackError::StreamError(format!("Failed to start stream: {}", e)))?;

        info!(
            "Opened output device '{}' at {} Hz, {} channel(s)",
            device_name, device_rate, config.channels
        );

        Ok(Self {
            _stream: stream,
            device_name,
            device_rate,
            clip,
            clock,
            volume,
            stream_error,
            loaded: None,
            cache: ClipCache::default(),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn prepare(&mut self, index: usize, resource: &AudioResource) -> Result<Arc<Vec<f32>>, PlaybackError> {
        self.cache.prune();
        if let Some(samples) = self.cache.get(resource) {
            return Ok(samples);
        }

        let decoded = decode_wav(resource.container())
            .map_err(|e| PlaybackError::LoadFailed {
                index,
                reason: e.to_string(),
            })?
            .into_mono();
        let mut resampler = LinearResampler::new(decoded.sample_rate, self.device_rate, 1);
        let samples = Arc::new(resampler.process(&decoded.samples));
        debug!(
            "Prepared segment {}: {} frames at {} Hz",
            index,
            samples.len(),
            self.device_rate
        );

        self.cache.insert(resource, Arc::clone(&samples));
        Ok(samples)
    }
}

impl SegmentPlayer for DevicePlayer {
    fn load(&mut self, index: usize, resource: &AudioResource) -> Result<(), PlaybackError> {
        self.unload();
        let samples = self.prepare(index, resource)?;
        let frames = samples.len() as u64;

        if let Ok(mut clip) = self.clip.lock() {
            *clip = Some(samples);
        }
        self.clock.load(frames);
        self.loaded = Some(index);
        Ok(())
    }

    fn unload(&mut self) {
        self.clock.unload();
        if let Ok(mut clip) = self.clip.lock() {
            *clip = None;
        }
        self.loaded = None;
        self.cache.prune();
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        match self.loaded {
            Some(_) => {
                self.clock.set_playing(true);
                Ok(())
            }
            None => Err(PlaybackError::ResourceMissing { index: 0 }),
        }
    }

    fn pause(&mut self) {
        self.clock.set_playing(false);
    }

    fn seek(&mut self, offset: f64) -> Result<(), PlaybackError> {
        match self.loaded {
            Some(_) => {
                self.clock.seek(offset);
                Ok(())
            }
            None => Err(PlaybackError::ResourceMissing { index: 0 }),
        }
    }

    fn current_time(&self) -> f64 {
        self.clock.position_secs()
    }

    fn loaded_index(&self) -> Option<usize> {
        self.loaded
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        let index = self.loaded?;

        let failure = self.stream_error.lock().ok().and_then(|mut slot| slot.take());
        if let Some(reason) = failure {
            self.unload();
            return Some(PlayerEvent::Failed { index, reason });
        }

        if self.clock.take_finished() {
            return Some(PlayerEvent::Ended { index });
        }
        None
    }
}

struct CachedClip {
    owner: WeakAudioResource,
    samples: Arc<Vec<f32>>,
}

/// Device-rate clips keyed by resource id. Entries whose resource has been
/// released are dropped by `prune`.
#[derive(Default)]
struct ClipCache {
    entries: HashMap<u64, CachedClip>,
}

impl ClipCache {
    fn get(&self, resource: &AudioResource) -> Option<Arc<Vec<f32>>> {
        self.entries
            .get(&resource.id())
            .map(|entry| Arc::clone(&entry.samples))
    }

    fn insert(&mut self, resource: &AudioResource, samples: Arc<Vec<f32>>) {
        self.entries.insert(
            resource.id(),
            CachedClip {
                owner: resource.downgrade(),
                samples,
            },
        );
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.owner.is_released());
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("Dropped {} cached clips of released narration", dropped);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct CallbackShared {
    clip: SharedClip,
    clock: PlaybackClock,
    volume: Arc<AtomicU32>,
    stream_error: Arc<Mutex<Option<String>>>,
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: CallbackShared,
) -> Result<Stream, PlaybackError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    T: cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let CallbackShared {
        clip,
        clock,
        volume,
        stream_error,
    } = shared;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let gain = f32::from_bits(volume.load(Ordering::Relaxed));
                let frames = (data.len() / channels) as u64;

                let current = clip.try_lock().ok().and_then(|slot| slot.clone());
                let (start, granted) = match current {
                    Some(_) => clock.advance(frames),
                    None => (0, 0),
                };

                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let value = match &current {
                        Some(samples) if (i as u64) < granted => {
                            samples.get((start + i as u64) as usize).copied().unwrap_or(0.0) * gain
                        }
                        _ => 0.0,
                    };
                    for sample in frame.iter_mut() {
                        *sample = cpal::Sample::from_sample(value);
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                if let Ok(mut slot) = stream_error.lock() {
                    *slot = Some(err.to_string());
                }
            },
            None,
        )
        .map_err(|e| PlaybackError::StreamError(format!("Failed to build stream: {}", e)))
}
