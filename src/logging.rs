use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Session event kept in the in-memory history
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: SessionEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventType {
    GenerationStarted,
    StructureReady,
    VisualFallback,
    NarrationSynthesized,
    NarrationMissing,
    GenerationFailed,
    SegmentAdvanced,
    SeekOperation,
    Buffering,
    SegmentLoadFailed,
    PlaybackEnded,
    SessionReset,
}

impl SessionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventType::GenerationStarted => "GENERATION_STARTED",
            SessionEventType::StructureReady => "STRUCTURE_READY",
            SessionEventType::VisualFallback => "VISUAL_FALLBACK",
            SessionEventType::NarrationSynthesized => "NARRATION_SYNTHESIZED",
            SessionEventType::NarrationMissing => "NARRATION_MISSING",
            SessionEventType::GenerationFailed => "GENERATION_FAILED",
            SessionEventType::SegmentAdvanced => "SEGMENT_ADVANCED",
            SessionEventType::SeekOperation => "SEEK_OPERATION",
            SessionEventType::Buffering => "BUFFERING",
            SessionEventType::SegmentLoadFailed => "SEGMENT_LOAD_FAILED",
            SessionEventType::PlaybackEnded => "PLAYBACK_ENDED",
            SessionEventType::SessionReset => "SESSION_RESET",
        }
    }
}

/// Structured logging for generation sessions and timeline playback.
///
/// Cheap to clone; clones share one bounded event history.
#[derive(Clone)]
pub struct NarrationLogger {
    events: Arc<Mutex<VecDeque<SessionEvent>>>,
    max_events: usize,
}

impl NarrationLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: max_events.max(1),
        }
    }

    /// Install the global logger. Level comes from `NARRATE_LOG_LEVEL`.
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("NARRATE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("Narration logging initialized with level: {}", log_level);
        Ok(())
    }

    pub fn log_event(&self, event_type: SessionEventType, details: String) {
        match event_type {
            SessionEventType::GenerationStarted
            | SessionEventType::StructureReady
            | SessionEventType::NarrationSynthesized
            | SessionEventType::PlaybackEnded
            | SessionEventType::SessionReset => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            SessionEventType::SegmentAdvanced
            | SessionEventType::SeekOperation
            | SessionEventType::Buffering => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            SessionEventType::VisualFallback
            | SessionEventType::NarrationMissing
            | SessionEventType::SegmentLoadFailed => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            SessionEventType::GenerationFailed => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        if let Ok(mut events) = self.events.lock() {
            events.push_back(SessionEvent {
                timestamp: Utc::now(),
                event_type,
                details,
            });
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_generation_started(&self, mode: &str, topic: &str) {
        self.log_event(
            SessionEventType::GenerationStarted,
            format!("Generating '{}' in {} mode", topic, mode),
        );
    }

    pub fn log_structure_ready(&self, slide_count: usize) {
        self.log_event(
            SessionEventType::StructureReady,
            format!("Structured {} slides", slide_count),
        );
    }

    pub fn log_visual_fallback(&self, slide_id: u32, reason: &str) {
        self.log_event(
            SessionEventType::VisualFallback,
            format!("Slide {} uses a stock visual: {}", slide_id, reason),
        );
    }

    pub fn log_narration_synthesized(&self, index: usize, duration_secs: f64) {
        self.log_event(
            SessionEventType::NarrationSynthesized,
            format!("Narration for slide {} ready ({:.2}s)", index + 1, duration_secs),
        );
    }

    pub fn log_narration_missing(&self, index: usize, reason: &str) {
        self.log_event(
            SessionEventType::NarrationMissing,
            format!("Slide {} has no narration: {}", index + 1, reason),
        );
    }

    pub fn log_generation_failed(&self, stage: &str, error: &str) {
        self.log_event(
            SessionEventType::GenerationFailed,
            format!("{} failed: {}", stage, error),
        );
    }

    pub fn log_segment_advanced(&self, from: usize, to: usize) {
        self.log_event(
            SessionEventType::SegmentAdvanced,
            format!("Advanced from segment {} to {}", from, to),
        );
    }

    pub fn log_seek(&self, from_secs: f64, to_secs: f64, index: usize, offset: f64) {
        self.log_event(
            SessionEventType::SeekOperation,
            format!(
                "Seek from {:.2}s to {:.2}s (segment {} at {:.2}s)",
                from_secs, to_secs, index, offset
            ),
        );
    }

    pub fn log_buffering(&self, index: usize) {
        self.log_event(
            SessionEventType::Buffering,
            format!("Waiting for audio of segment {}", index),
        );
    }

    pub fn log_segment_load_failed(&self, index: usize, reason: &str, attempt: u32) {
        self.log_event(
            SessionEventType::SegmentLoadFailed,
            format!("Segment {} failed to load (attempt {}): {}", index, attempt, reason),
        );
    }

    pub fn log_playback_ended(&self, total_secs: f64) {
        self.log_event(
            SessionEventType::PlaybackEnded,
            format!("Playback ended at {:.2}s", total_secs),
        );
    }

    pub fn log_session_reset(&self, epoch: u64, released: usize) {
        self.log_event(
            SessionEventType::SessionReset,
            format!("Session reset to epoch {} ({} audio segments released)", epoch, released),
        );
    }

    /// Most recent events, oldest first
    pub fn recent_events(&self, count: usize) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn events_of_type(&self, event_type: SessionEventType) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(events) => events
                .iter()
                .filter(|e| e.event_type == event_type)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for NarrationLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

/// Measures how long a collaborator call takes
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log at warn level when the operation ran past `threshold`
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
