use std::io::Cursor;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use log::{debug, warn};
use symphonia::core::codecs::{CodecRegistry, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, Probe};
use tokio::sync::Mutex;

use crate::audio::wav::WavContainer;
use crate::error::DecodeError;

/// Duration reported when a container cannot be decoded
pub const FALLBACK_DURATION_SECS: f64 = 5.0;

/// The shared context suspends itself after this much inactivity
const IDLE_SUSPEND_AFTER: Duration = Duration::from_secs(30);

static SHARED_CONTEXT: OnceLock<Arc<Mutex<DecodeContext>>> = OnceLock::new();

/// Lifecycle of a decoding context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Unavailable(String),
}

/// Decoder registries plus the bookkeeping needed to suspend and resume them.
///
/// One context is created lazily per process (see [`shared_context`]) and is
/// never torn down; it only moves between `Running` and `Suspended`.
pub struct DecodeContext {
    state: ContextState,
    probe: &'static Probe,
    codecs: &'static CodecRegistry,
    created_at: Instant,
    last_used: Instant,
    decodes: u64,
}

impl DecodeContext {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: ContextState::Running,
            probe: symphonia::default::get_probe(),
            codecs: symphonia::default::get_codecs(),
            created_at: now,
            last_used: now,
            decodes: 0,
        }
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Number of successful decodes performed through this context
    pub fn decodes(&self) -> u64 {
        self.decodes
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Suspend the context (power saving, inactivity)
    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            debug!("Decode context suspended");
            self.state = ContextState::Suspended;
        }
    }

    /// Mark the decoding capability as missing on this platform
    pub fn mark_unavailable(&mut self, reason: impl Into<String>) {
        self.state = ContextState::Unavailable(reason.into());
    }

    /// Bring a suspended context back. Must complete before any decode.
    pub async fn resume(&mut self) -> Result<(), DecodeError> {
        if self.state == ContextState::Running && self.last_used.elapsed() > IDLE_SUSPEND_AFTER {
            self.suspend();
        }

        match &self.state {
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                tokio::task::yield_now().await;
                self.state = ContextState::Running;
                debug!("Decode context resumed");
                Ok(())
            }
            ContextState::Unavailable(reason) => Err(DecodeError::ContextUnavailable(reason.clone())),
        }
    }

    /// Decode the whole stream, returning (frames, sample_rate)
    fn decode_frames(&mut self, bytes: &[u8]) -> Result<(u64, u32), DecodeError> {
        if self.state != ContextState::Running {
            return Err(DecodeError::ContextUnavailable("context is not running".to_string()));
        }
        self.last_used = Instant::now();

        let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = self
            .probe
            .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("WAV probe failed: {}", e),
            })?;
        let mut format_reader = probed.format;

        let track = format_reader
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

        let mut decoder = self
            .codecs
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

        let mut frames = 0u64;
        loop {
            let packet = match format_reader.next_packet() {
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
            frames += decoded.frames() as u64;
        }

        self.decodes += 1;
        Ok((frames, sample_rate))
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide decoding context, created on first use
pub fn shared_context() -> Arc<Mutex<DecodeContext>> {
    SHARED_CONTEXT
        .get_or_init(|| Arc::new(Mutex::new(DecodeContext::new())))
        .clone()
}

/// Determines playback duration of packaged narration
#[derive(Clone)]
pub struct DurationMeter {
    context: Arc<Mutex<DecodeContext>>,
    fallback_secs: f64,
}

impl DurationMeter {
    /// Meter backed by the shared process-wide context
    pub fn new(fallback_secs: f64) -> Self {
        Self::with_context(shared_context(), fallback_secs)
    }

    pub fn with_context(context: Arc<Mutex<DecodeContext>>, fallback_secs: f64) -> Self {
        Self {
            context,
            fallback_secs,
        }
    }

    pub fn fallback_secs(&self) -> f64 {
        self.fallback_secs
    }

    /// Measure a container's duration in seconds. Never fails: undecodable
    /// audio yields the fallback, and a missing decoder yields the header
    /// formula.
    pub async fn measure(&self, container: &WavContainer) -> f64 {
        match self.try_measure(container).await {
            Ok(secs) => secs,
            Err(DecodeError::ContextUnavailable(reason)) => {
                let nominal = container.header().ok().and_then(|h| h.nominal_duration());
                warn!("Decoder unavailable ({}), using header duration {:?}", reason, nominal);
                nominal.unwrap_or(self.fallback_secs)
            }
            Err(e) => {
                warn!("Failed to decode audio data: {}; using {}s", e, self.fallback_secs);
                self.fallback_secs
            }
        }
    }

    pub async fn try_measure(&self, container: &WavContainer) -> Result<f64, DecodeError> {
        let header = container.header()?;
        let available = container.pcm().len();
        if header.data_size as usize > available {
            return Err(DecodeError::CorruptedData(format!(
                "data chunk declares {} bytes but only {} are present",
                header.data_size, available
            )));
        }
        if header.data_size == 0 {
            return Ok(0.0);
        }

        let mut context = self.context.lock().await;
        context.resume().await?;
        let (frames, sample_rate) = context.decode_frames(container.as_bytes())?;
        if sample_rate == 0 {
            return Err(DecodeError::CorruptedData("zero sample rate".to_string()));
        }
        Ok(frames as f64 / sample_rate as f64)
    }
}

impl Default for DurationMeter {
    fn default() -> Self {
        Self::new(FALLBACK_DURATION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::{wrap_pcm, TTS_SAMPLE_RATE};

    fn isolated_meter() -> (DurationMeter, Arc<Mutex<DecodeContext>>) {
        let context = Arc::new(Mutex::new(DecodeContext::new()));
        (DurationMeter::with_context(context.clone(), FALLBACK_DURATION_SECS), context)
    }

    fn tone(seconds: f64) -> WavContainer {
        let samples = (seconds * TTS_SAMPLE_RATE as f64) as usize;
        let pcm: Vec<u8> = (0..samples)
            .flat_map(|n| (((n % 64) as i16 - 32) * 512).to_le_bytes())
            .collect();
        wrap_pcm(&pcm, TTS_SAMPLE_RATE).unwrap()
    }

    #[tokio::test]
    async fn test_measures_decoded_duration() {
        let (meter, context) = isolated_meter();

        let secs = meter.measure(&tone(1.5)).await;
        assert!((secs - 1.5).abs() < 1e-3, "got {}", secs);
        assert_eq!(context.lock().await.decodes(), 1);
    }

    #[tokio::test]
    async fn test_truncated_container_falls_back() {
        let (meter, _) = isolated_meter();
        let mut bytes = tone(1.0).into_bytes();
        bytes.truncate(bytes.len() / 2);

        let secs = meter.measure(&WavContainer::from_bytes(bytes)).await;
        assert_eq!(secs, FALLBACK_DURATION_SECS);
    }

    #[tokio::test]
    async fn test_garbage_falls_back() {
        let (meter, _) = isolated_meter();
        let garbage = WavContainer::from_bytes(vec![0xAB; 128]);

        assert_eq!(meter.measure(&garbage).await, FALLBACK_DURATION_SECS);
        assert!(meter.try_measure(&garbage).await.is_err());
    }

    #[tokio::test]
    async fn test_suspended_context_is_resumed_before_decoding() {
        let (meter, context) = isolated_meter();
        context.lock().await.suspend();
        assert_eq!(*context.lock().await.state(), ContextState::Suspended);

        let secs = meter.measure(&tone(0.5)).await;
        assert!((secs - 0.5).abs() < 1e-3);
        assert_eq!(*context.lock().await.state(), ContextState::Running);
    }

    #[tokio::test]
    async fn test_unavailable_context_uses_header_formula() {
        let (meter, context) = isolated_meter();
        context.lock().await.mark_unavailable("no decoder on this platform");

        let secs = meter.measure(&tone(2.0)).await;
        assert!((secs - 2.0).abs() < 1e-9);
        assert_eq!(context.lock().await.decodes(), 0);
    }

    #[tokio::test]
    async fn test_empty_container_has_zero_duration() {
        let (meter, _) = isolated_meter();
        let empty = wrap_pcm(&[], TTS_SAMPLE_RATE).unwrap();
        assert_eq!(meter.measure(&empty).await, 0.0);
    }

    #[tokio::test]
    async fn test_shared_context_is_created_once() {
        let first = shared_context();
        let second = shared_context();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
