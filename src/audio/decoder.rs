use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::wav::WavContainer;
use crate::error::DecodeError;

/// Fully decoded PCM, interleaved f32
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels down to one
    pub fn into_mono(self) -> Self {
        if self.channels <= 1 {
            return self;
        }
        let channels = self.channels;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Self {
            samples,
            channels: 1,
            sample_rate: self.sample_rate,
        }
    }
}

/// Decode a packaged narration clip into f32 samples
pub fn decode_wav(container: &WavContainer) -> Result<DecodedAudio, DecodeError> {
    let source = MediaSourceStream::new(
        Box::new(Cursor::new(container.as_bytes().to_vec())),
        Default::default(),
    );
    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat {
            format: format!("WAV probe failed: {}", e),
        })?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat {
            format: "No audio track found".to_string(),
        })?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::CorruptedData("missing sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut channels = 0usize;
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(DecodeError::DecodeFailed(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;
        let spec = *decoded.spec();
        channels = spec.channels.count();

        let needed = decoded.capacity() * channels;
        if buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            buffer = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(sample_buffer) = buffer.as_mut() {
            sample_buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buffer.samples());
        }
    }

    Ok(DecodedAudio {
        samples,
        channels: channels.max(1),
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::wrap_pcm;

    fn pcm_of(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_recovers_samples() {
        let values: Vec<i16> = (0..2400).map(|i| if i % 2 == 0 { 16384 } else { -16384 }).collect();
        let container = wrap_pcm(&pcm_of(&values), 24_000).unwrap();

        let decoded = decode_wav(&container).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.frames(), 2400);
        assert!((decoded.duration_secs() - 0.1).abs() < 1e-9);
        assert!((decoded.samples[0] - 0.5).abs() < 1e-3);
        assert!((decoded.samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let container = WavContainer::from_bytes(b"definitely not audio".to_vec());
        assert!(decode_wav(&container).is_err());
    }

    #[test]
    fn test_into_mono_averages_frames() {
        let stereo = DecodedAudio {
            samples: vec![1.0, 0.0, 0.5, 0.5],
            channels: 2,
            sample_rate: 48_000,
        };
        let mono = stereo.into_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.5, 0.5]);
    }
}
