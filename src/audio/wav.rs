//! Packaging of raw speech-synthesis PCM into a RIFF/WAVE container.
//!
//! The speech service returns headerless, mono, signed 16-bit little-endian
//! samples encoded as base64. Players need a self-describing container, so the
//! samples are prefixed with the canonical 44-byte WAVE header and otherwise
//! left untouched.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{DecodeError, PackagingError};

/// Sample rate of narration audio produced by the speech service
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Size of the canonical PCM WAVE header
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// A complete, playable WAVE byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavContainer {
    bytes: Vec<u8>,
}

impl WavContainer {
    /// Wrap bytes that are already laid out as a WAVE stream (e.g. read from disk).
    /// No validation happens here; `header()` reports whether the layout holds.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw PCM payload following the header (empty if the stream is too short)
    pub fn pcm(&self) -> &[u8] {
        self.bytes.get(WAV_HEADER_LEN..).unwrap_or(&[])
    }

    /// Parse the header fields back out of the container
    pub fn header(&self) -> Result<WavHeader, DecodeError> {
        WavHeader::parse(&self.bytes)
    }
}

impl AsRef<[u8]> for WavContainer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decode a base64 PCM payload and wrap it in a WAVE container.
pub fn wrap_pcm_base64(base64_pcm: &str, sample_rate: u32) -> Result<WavContainer, PackagingError> {
    let pcm = STANDARD
        .decode(base64_pcm.trim())
        .map_err(|e| PackagingError::InvalidBase64(e.to_string()))?;
    wrap_pcm(&pcm, sample_rate)
}

/// Wrap raw mono 16-bit PCM bytes in a WAVE container.
pub fn wrap_pcm(pcm: &[u8], sample_rate: u32) -> Result<WavContainer, PackagingError> {
    if pcm.len() % 2 != 0 {
        return Err(PackagingError::OddLength { len: pcm.len() });
    }
    if sample_rate == 0 || sample_rate > u32::MAX / 2 {
        return Err(PackagingError::InvalidSampleRate { rate: sample_rate });
    }
    let data_size = u32::try_from(pcm.len())
        .ok()
        .filter(|size| *size <= u32::MAX - 36)
        .ok_or(PackagingError::TooLarge { len: pcm.len() })?;

    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    // fmt chunk
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    bytes.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    bytes.extend_from_slice(&CHANNELS.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    bytes.extend_from_slice(pcm);

    Ok(WavContainer { bytes })
}

/// Header fields of a canonical 44-byte PCM WAVE stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(DecodeError::CorruptedData(format!(
                "stream is {} bytes, shorter than a WAVE header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(DecodeError::UnsupportedFormat {
                format: "not a RIFF/WAVE stream".to_string(),
            });
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(DecodeError::CorruptedData("unexpected chunk layout".to_string()));
        }

        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let u32_at = |offset: usize| {
            u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
        };

        Ok(Self {
            riff_size: u32_at(4),
            format_tag: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Duration implied by the header alone:
    /// `data_size / (sample_rate * channels * bits_per_sample / 8)`.
    pub fn nominal_duration(&self) -> Option<f64> {
        let bytes_per_second =
            self.sample_rate as f64 * self.channels as f64 * (self.bits_per_sample as f64 / 8.0);
        if bytes_per_second > 0.0 {
            Some(self.data_size as f64 / bytes_per_second)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn le_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    #[test]
    fn test_header_layout_is_byte_exact() {
        let pcm: Vec<u8> = (0..200u8).collect();
        let wav = wrap_pcm(&pcm, TTS_SAMPLE_RATE).unwrap();
        let bytes = wav.as_bytes();

        assert_eq!(bytes.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(le_u32(bytes, 4), 36 + 200);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(le_u32(bytes, 16), 16);
        assert_eq!(le_u16(bytes, 20), 1);
        assert_eq!(le_u16(bytes, 22), 1);
        assert_eq!(le_u32(bytes, 24), 24_000);
        assert_eq!(le_u32(bytes, 28), 48_000);
        assert_eq!(le_u16(bytes, 32), 2);
        assert_eq!(le_u16(bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(le_u32(bytes, 40), 200);
        assert_eq!(&bytes[44..], pcm.as_slice());
    }

    #[test]
    fn test_header_tracks_sample_rate() {
        for rate in [8_000u32, 16_000, 22_050, 44_100, 48_000] {
            let wav = wrap_pcm(&[0u8; 10], rate).unwrap();
            let header = wav.header().unwrap();
            assert_eq!(header.sample_rate, rate);
            assert_eq!(header.byte_rate, rate * 2);
            assert_eq!(header.data_size, 10);
            assert_eq!(header.riff_size, 46);
        }
    }

    #[test]
    fn test_wrap_is_deterministic() {
        let pcm = [1u8, 2, 3, 4, 250, 251];
        let first = wrap_pcm(&pcm, TTS_SAMPLE_RATE).unwrap();
        let second = wrap_pcm(&pcm, TTS_SAMPLE_RATE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrap_from_base64() {
        let pcm = [0x10u8, 0x00, 0xF0, 0xFF];
        let encoded = STANDARD.encode(pcm);

        let wav = wrap_pcm_base64(&encoded, TTS_SAMPLE_RATE).unwrap();
        assert_eq!(wav.pcm(), &pcm);
        assert_eq!(wav.header().unwrap().data_size, 4);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result = wrap_pcm_base64("not*valid*base64", TTS_SAMPLE_RATE);
        assert!(matches!(result, Err(PackagingError::InvalidBase64(_))));
    }

    #[test]
    fn test_odd_length_is_rejected() {
        let encoded = STANDARD.encode([1u8, 2, 3]);
        let result = wrap_pcm_base64(&encoded, TTS_SAMPLE_RATE);
        assert!(matches!(result, Err(PackagingError::OddLength { len: 3 })));
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        assert!(matches!(
            wrap_pcm(&[0, 0], 0),
            Err(PackagingError::InvalidSampleRate { rate: 0 })
        ));
    }

    #[test]
    fn test_empty_pcm_produces_bare_header() {
        let wav = wrap_pcm(&[], TTS_SAMPLE_RATE).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(wav.header().unwrap().nominal_duration(), Some(0.0));
    }

    #[test]
    fn test_nominal_duration() {
        // One second of 24 kHz mono 16-bit audio
        let wav = wrap_pcm(&vec![0u8; 48_000], TTS_SAMPLE_RATE).unwrap();
        let duration = wav.header().unwrap().nominal_duration().unwrap();
        assert!((duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_short_and_foreign_streams() {
        assert!(matches!(WavHeader::parse(b"RIFF"), Err(DecodeError::CorruptedData(_))));

        let mut bytes = wrap_pcm(&[0u8; 4], TTS_SAMPLE_RATE).unwrap().into_bytes();
        bytes[0..4].copy_from_slice(b"OggS");
        assert!(matches!(
            WavHeader::parse(&bytes),
            Err(DecodeError::UnsupportedFormat { .. })
        ));
    }
}
