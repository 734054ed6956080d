use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),
}

impl NarratorError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            NarratorError::Packaging(err) => err.user_message(),
            NarratorError::Decode(err) => err.user_message(),
            NarratorError::Timeline(err) => err.user_message(),
            NarratorError::Playback(err) => err.user_message(),
            NarratorError::Service(err) => err.user_message(),
            NarratorError::Session(err) => err.user_message(),
            NarratorError::Config(err) => err.user_message(),
            NarratorError::File(err) => Self::format_file_error(err),
            NarratorError::Parse(err) => format!("Command error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            NarratorError::Packaging(err) => err.recovery_suggestions(),
            NarratorError::Decode(err) => err.recovery_suggestions(),
            NarratorError::Timeline(err) => err.recovery_suggestions(),
            NarratorError::Playback(err) => err.recovery_suggestions(),
            NarratorError::Service(err) => err.recovery_suggestions(),
            NarratorError::Session(err) => err.recovery_suggestions(),
            NarratorError::Config(err) => err.recovery_suggestions(),
            NarratorError::File(err) => Self::file_error_suggestions(err),
            NarratorError::Parse(_) => vec!["Run with --help to see available commands".to_string()],
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            NarratorError::Packaging(_) => false, // Malformed input is never retried
            NarratorError::Decode(_) => true,     // A fallback duration is always available
            NarratorError::Timeline(err) => err.is_recoverable(),
            NarratorError::Playback(err) => err.is_recoverable(),
            NarratorError::Service(err) => err.is_recoverable(),
            NarratorError::Session(err) => err.is_recoverable(),
            NarratorError::Config(_) => true,
            NarratorError::File(_) => false,
            NarratorError::Parse(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            NarratorError::Packaging(_) => ErrorSeverity::Error,
            NarratorError::Decode(_) => ErrorSeverity::Warning,
            NarratorError::Timeline(TimelineError::DurationUnknown { .. }) => ErrorSeverity::Info,
            NarratorError::Timeline(_) => ErrorSeverity::Warning,
            NarratorError::Playback(PlaybackError::DeviceNotFound { .. }) => ErrorSeverity::Error,
            NarratorError::Playback(PlaybackError::InitializationFailed(_)) => ErrorSeverity::Critical,
            NarratorError::Playback(_) => ErrorSeverity::Error,
            NarratorError::Service(ServiceError::VisualGeneration(_)) => ErrorSeverity::Info,
            NarratorError::Service(_) => ErrorSeverity::Error,
            NarratorError::Session(SessionError::NothingToNarrate) => ErrorSeverity::Info,
            NarratorError::Session(_) => ErrorSeverity::Warning,
            NarratorError::Config(_) => ErrorSeverity::Warning,
            NarratorError::File(_) => ErrorSeverity::Error,
            NarratorError::Parse(_) => ErrorSeverity::Info,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            std::io::ErrorKind::InvalidData => "File contains invalid or corrupted data".to_string(),
            std::io::ErrorKind::UnexpectedEof => "File appears to be truncated or corrupted".to_string(),
            _ => format!("File system error: {}", err),
        }
    }

    fn file_error_suggestions(err: &std::io::Error) -> Vec<String> {
        match err.kind() {
            std::io::ErrorKind::NotFound => vec![
                "Check that the file path is correct".to_string(),
                "Try using absolute path instead of relative path".to_string(),
            ],
            std::io::ErrorKind::PermissionDenied => vec![
                "Check file permissions".to_string(),
                "Ensure the output directory is writable".to_string(),
            ],
            _ => vec!["Try the operation again".to_string()],
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Errors raised while turning raw narration PCM into a WAVE container
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Invalid base64 audio payload: {0}")]
    InvalidBase64(String),

    #[error("PCM payload has odd length {len}; expected whole 16-bit samples")]
    OddLength { len: usize },

    #[error("PCM payload of {len} bytes does not fit a WAVE container")]
    TooLarge { len: usize },

    #[error("Unsupported sample rate: {rate}")]
    InvalidSampleRate { rate: u32 },
}

impl PackagingError {
    pub fn user_message(&self) -> String {
        match self {
            PackagingError::InvalidBase64(_) => {
                "The narration audio returned by the speech service could not be decoded".to_string()
            }
            PackagingError::OddLength { len } => {
                format!("Narration audio is malformed ({} bytes is not a whole number of samples)", len)
            }
            PackagingError::TooLarge { len } => {
                format!("Narration audio is too long to package ({} bytes)", len)
            }
            PackagingError::InvalidSampleRate { rate } => {
                format!("Sample rate {} Hz cannot be used for narration audio", rate)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagingError::InvalidBase64(_) | PackagingError::OddLength { .. } => vec![
                "Regenerate the narration for this presentation".to_string(),
                "Check that the input file contains raw 16-bit PCM encoded as base64".to_string(),
            ],
            PackagingError::TooLarge { .. } => vec![
                "Shorten the speaker notes for this slide".to_string(),
            ],
            PackagingError::InvalidSampleRate { .. } => vec![
                "Use the speech service rate of 24000 Hz".to_string(),
            ],
        }
    }
}

/// Audio decoding errors raised while measuring a container
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Decoding context unavailable: {0}")]
    ContextUnavailable(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported", format)
            }
            DecodeError::CorruptedData(msg) => {
                format!("Audio data appears to be corrupted: {}", msg)
            }
            DecodeError::DecodeFailed(msg) => {
                format!("Failed to decode audio data: {}", msg)
            }
            DecodeError::ContextUnavailable(msg) => {
                format!("Audio decoding is not available: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        vec![
            "A fallback duration is used; progress display may be approximate".to_string(),
            "Regenerate the narration if playback sounds wrong".to_string(),
        ]
    }
}

/// Errors from timeline math
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("Duration of segment {index} is not known yet")]
    DurationUnknown { index: usize },

    #[error("Timeline has no segments")]
    EmptyTimeline,

    #[error("Invalid duration {value} for segment {index}")]
    InvalidDuration { index: usize, value: f64 },

    #[error("Invalid seek target: {0}")]
    InvalidTarget(f64),

    #[error("Segment index {index} out of range ({len} segments)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No seek gesture in progress")]
    NotSeeking,
}

impl TimelineError {
    pub fn user_message(&self) -> String {
        match self {
            TimelineError::DurationUnknown { .. } => {
                "Narration is still being generated - seeking is available once it finishes".to_string()
            }
            TimelineError::EmptyTimeline => "There is nothing to play yet".to_string(),
            TimelineError::InvalidDuration { index, .. } => {
                format!("Slide {} has an invalid narration length", index + 1)
            }
            TimelineError::InvalidTarget(t) => format!("Cannot seek to {}", t),
            TimelineError::IndexOutOfRange { index, len } => {
                format!("Slide {} does not exist (presentation has {})", index + 1, len)
            }
            TimelineError::NotSeeking => "No seek in progress".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            TimelineError::DurationUnknown { .. } => vec![
                "Wait for narration to finish generating".to_string(),
            ],
            TimelineError::EmptyTimeline => vec![
                "Generate a presentation and its narration first".to_string(),
            ],
            _ => vec!["Try the operation again".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, TimelineError::DurationUnknown { .. } | TimelineError::NotSeeking)
    }
}

/// Errors from loading or playing a segment's audio
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Audio for segment {index} is not loaded")]
    ResourceMissing { index: usize },

    #[error("Failed to load segment {index}: {reason}")]
    LoadFailed { index: usize, reason: String },

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl PlaybackError {
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::ResourceMissing { index } => {
                format!("Narration for slide {} is still loading", index + 1)
            }
            PlaybackError::LoadFailed { index, reason } => {
                format!("Narration for slide {} could not be played: {}", index + 1, reason)
            }
            PlaybackError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            PlaybackError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            PlaybackError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlaybackError::ResourceMissing { .. } => vec![
                "Playback resumes automatically once the narration is ready".to_string(),
            ],
            PlaybackError::LoadFailed { .. } => vec![
                "Regenerate the narration for this presentation".to_string(),
                "Skip to another slide".to_string(),
            ],
            PlaybackError::DeviceNotFound { .. } => vec![
                "Check that your audio device is connected".to_string(),
                "Remove preferred_device from the configuration to use the default device".to_string(),
            ],
            PlaybackError::StreamError(_) | PlaybackError::InitializationFailed(_) => vec![
                "Close other applications using exclusive audio access".to_string(),
                "Restart playback".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            PlaybackError::ResourceMissing { .. } => true,
            PlaybackError::LoadFailed { .. } => true, // Retried a bounded number of times
            PlaybackError::DeviceNotFound { .. } => true, // Can fall back to default device
            PlaybackError::StreamError(_) => true,
            PlaybackError::InitializationFailed(_) => false,
        }
    }
}

/// Failures reported by external collaborators
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Content generation failed: {0}")]
    ContentGeneration(String),

    #[error("Visual generation failed: {0}")]
    VisualGeneration(String),

    #[error("Speech synthesis failed: {0}")]
    SpeechSynthesis(String),

    #[error("Deck export failed: {0}")]
    DeckExport(String),

    #[error("Document rasterization failed: {0}")]
    Rasterization(String),
}

impl ServiceError {
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::ContentGeneration(msg) => {
                if msg.is_empty() {
                    "Failed to process document.".to_string()
                } else {
                    msg.clone()
                }
            }
            ServiceError::VisualGeneration(_) => "A stock visual was used for this slide".to_string(),
            ServiceError::SpeechSynthesis(_) => "Audio quota reached. Try again in a minute.".to_string(),
            ServiceError::DeckExport(msg) => format!("Failed to export deck: {}", msg),
            ServiceError::Rasterization(msg) => format!("Failed to render document pages: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ServiceError::ContentGeneration(_) => vec![
                "Try again with a different topic or document".to_string(),
            ],
            ServiceError::VisualGeneration(_) => vec![],
            ServiceError::SpeechSynthesis(_) => vec![
                "Wait a minute and retry the narration step".to_string(),
                "Your slides are kept; only narration needs to be regenerated".to_string(),
            ],
            ServiceError::DeckExport(_) => vec![
                "Check that the output directory is writable".to_string(),
            ],
            ServiceError::Rasterization(_) => vec![
                "Convert mode continues without page images".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ServiceError::ContentGeneration(_) => false,
            ServiceError::VisualGeneration(_) => true, // Degrades to a stock visual
            ServiceError::SpeechSynthesis(_) => true,  // User may retry the narration step
            ServiceError::DeckExport(_) => true,
            ServiceError::Rasterization(_) => true,
        }
    }
}

/// Session state violations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No slides to narrate")]
    NothingToNarrate,

    #[error("No slides to export")]
    NothingToExport,

    #[error("Session was reset while the operation was running")]
    Superseded,

    #[error("Narration failed for every slide: {0}")]
    NarrationFailed(String),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::NothingToNarrate | SessionError::NothingToExport => {
                "Generate a presentation first".to_string()
            }
            SessionError::Superseded => "The presentation was closed before this step finished".to_string(),
            SessionError::NarrationFailed(_) => "Audio quota reached. Try again in a minute.".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            SessionError::NothingToNarrate | SessionError::NothingToExport => {
                vec!["Provide a topic or a document".to_string()]
            }
            SessionError::Superseded => vec![],
            SessionError::NarrationFailed(_) => vec![
                "Wait a minute and retry the narration step".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Superseded)
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/narrated-deck/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Run 'narrate config reset' to restore defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }
}
