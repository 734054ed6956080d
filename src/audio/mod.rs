//! Narration audio: packaging raw speech PCM into WAV, measuring it, and
//! playing it back on an output device.

pub mod decoder;
pub mod device;
pub mod duration;
pub mod output;
pub mod position;
pub mod resampler;
pub mod wav;

pub use decoder::{decode_wav, DecodedAudio};
pub use device::OutputDevices;
pub use duration::{DecodeContext, DurationMeter, FALLBACK_DURATION_SECS};
pub use output::DevicePlayer;
pub use position::PlaybackClock;
pub use resampler::LinearResampler;
pub use wav::{wrap_pcm, wrap_pcm_base64, WavContainer, WavHeader, TTS_SAMPLE_RATE, WAV_HEADER_LEN};
