use std::io::{self, Write};

use crate::cli::format_time;
use crate::error::{ErrorSeverity, NarratorError, PlaybackError, SessionError};
use crate::session::SessionSnapshot;
use crate::timeline::{BufferState, ControllerSnapshot, NarrationStatus, PlaybackState};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// One-line playback status, e.g. `▶ Playing [████░░] 0:03/0:10 (30.0%) slide 2/3`
    pub fn status_line(snapshot: &ControllerSnapshot) -> String {
        let position = format_time(snapshot.display_time);
        let slide = format!("slide {}/{}", snapshot.active_index + 1, snapshot.segment_count.max(1));

        let timing = match (snapshot.total_duration, snapshot.progress()) {
            (Some(total), Some(progress)) => format!(
                "[{}] {}/{} ({:.1}%)",
                Self::create_progress_bar(progress, 30),
                position,
                format_time(total),
                progress * 100.0
            ),
            _ => format!("{} / --:--", position),
        };

        let buffer = match &snapshot.buffer {
            BufferState::Ready => String::new(),
            BufferState::Buffering { .. } => " (buffering...)".to_string(),
            BufferState::Failed { reason, .. } => format!(" (failed: {})", Self::truncate(reason, 30)),
        };

        format!(
            "{} {} {}{}",
            Self::format_playback_state(snapshot.state),
            timing,
            slide,
            buffer
        )
    }

    /// Redraw the status line in place
    pub fn display_position_update(snapshot: &ControllerSnapshot) {
        print!("\r{:<100}", Self::status_line(snapshot));
        let _ = io::stdout().flush();
    }

    /// Summary of a finished generation session
    pub fn display_session_summary(snapshot: &SessionSnapshot) {
        println!("┌─ Presentation ──────────────────────────────────────────┐");
        println!("│ Topic: {}", Self::truncate(&snapshot.topic, 50));
        println!("│ Phase: {}", snapshot.phase.as_str());
        println!("│ Slides: {}", snapshot.slides.len());

        for (i, slide) in snapshot.slides.iter().enumerate() {
            let narration = match snapshot.narration.get(i) {
                Some(NarrationStatus::Ready) => match snapshot.durations.get(i).copied().flatten() {
                    Some(secs) => format_time(secs),
                    None => "ready".to_string(),
                },
                Some(NarrationStatus::Missing) => "missing".to_string(),
                _ => "pending".to_string(),
            };
            println!("│  {:>2}. {:<40} {:>7}", slide.id, Self::truncate(&slide.title, 40), narration);
        }

        if let Some(error) = &snapshot.error {
            println!("│");
            println!("│ ⚠ {}", error);
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &NarratorError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐", severity_icon, severity.as_str());
        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        Self::display_error_context(error);
        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    fn display_error_context(error: &NarratorError) {
        match error {
            NarratorError::Playback(PlaybackError::DeviceNotFound { .. }) => {
                eprintln!("│");
                eprintln!("│ Use 'narrate devices' to see available devices");
            }
            NarratorError::Session(SessionError::NarrationFailed(_)) => {
                eprintln!("│");
                eprintln!("│ Slides and visuals were kept; only narration is missing");
            }
            NarratorError::Config(_) => {
                eprintln!("│");
                eprintln!("│ Configuration will use default values");
            }
            _ => {}
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Truncate to `max_len` characters, marking the cut with "..."
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    pub fn create_progress_bar(progress: f64, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f64) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_playback_state(state: PlaybackState) -> String {
        match state {
            PlaybackState::Idle => "⏹ Idle".to_string(),
            PlaybackState::Playing => "▶ Playing".to_string(),
            PlaybackState::Paused => "⏸ Paused".to_string(),
            PlaybackState::Seeking => "⇆ Seeking".to_string(),
            PlaybackState::Ended => "⏹ Ended".to_string(),
        }
    }
}
