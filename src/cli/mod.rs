use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::audio::wav::TTS_SAMPLE_RATE;
use crate::models::GenerationMode;

pub mod status;
pub use status::StatusDisplay;

/// Narrated slide deck tool
#[derive(Debug, Parser)]
#[command(name = "narrate")]
#[command(about = "Package slide narration and play it back as one continuous timeline")]
#[command(version)]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Wrap a base64 PCM narration file into a playable WAV file
    Wrap {
        /// File holding base64 encoded 16-bit mono PCM
        input: PathBuf,
        /// Destination WAV file
        output: PathBuf,
        #[arg(long, default_value_t = TTS_SAMPLE_RATE)]
        sample_rate: u32,
    },
    /// Measure the playback duration of WAV files
    Duration {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Map a global time onto a segment and local offset
    Resolve {
        /// Comma separated segment durations in seconds, e.g. "3,5,2"
        #[arg(long)]
        durations: String,
        /// Global time (e.g. "7.5", "1:05", "90s")
        time: String,
    },
    /// Generate a narrated deck from a slide outline and narration files
    Build {
        /// JSON slide outline
        #[arg(long)]
        outline: PathBuf,
        /// Directory holding slide-N.b64 narration files
        #[arg(long)]
        narration: PathBuf,
        #[arg(long, default_value = "")]
        topic: String,
        #[arg(long, value_enum, default_value_t = GenerationMode::Create)]
        mode: GenerationMode,
        /// Source document the outline was extracted from
        #[arg(long)]
        document: Option<PathBuf>,
        /// Directory of page images rendered from the document
        #[arg(long)]
        pages: Option<PathBuf>,
        /// Output directory (defaults to the configured one)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Play WAV segments back to back as one timeline
    Play {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output device name (see `narrate devices`)
        #[arg(long)]
        device: Option<String>,
    },
    /// List audio output devices
    Devices,
    /// Show or reset the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    Show,
    Reset,
}

impl CliApp {
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse a time string in seconds: "90", "90s", "1:30" or "1:30.5"
    pub fn parse_time(time_str: &str) -> Result<f64, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let seconds = if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            minutes as f64 * 60.0 + seconds
        } else {
            trimmed.trim_end_matches('s').parse::<f64>().map_err(|_| invalid())?
        };

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        Ok(seconds)
    }

    /// Parse a comma separated list of segment durations
    pub fn parse_durations(list: &str) -> Result<Vec<f64>, ParseError> {
        let durations = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
                _ => Err(ParseError::InvalidArgument {
                    argument: "durations".to_string(),
                    value: s.to_string(),
                    expected: "non-negative seconds".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if durations.is_empty() {
            return Err(ParseError::MissingArgument {
                command: "resolve".to_string(),
                argument: "durations".to_string(),
            });
        }
        Ok(durations)
    }
}

/// Format seconds as m:ss
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).floor() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(CliApp::parse_time("90").unwrap(), 90.0);
        assert_eq!(CliApp::parse_time("90s").unwrap(), 90.0);
        assert_eq!(CliApp::parse_time("7.5").unwrap(), 7.5);
        assert_eq!(CliApp::parse_time("1:30").unwrap(), 90.0);
        assert_eq!(CliApp::parse_time(" 0:05.5 ").unwrap(), 5.5);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        for input in ["", "abc", "1:60", "1:2:3", "-4", "NaN"] {
            assert!(
                matches!(CliApp::parse_time(input), Err(ParseError::InvalidTimeFormat { .. })),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(CliApp::parse_durations("3,5,2").unwrap(), vec![3.0, 5.0, 2.0]);
        assert_eq!(CliApp::parse_durations(" 1.5 , 0 ,").unwrap(), vec![1.5, 0.0]);
        assert!(matches!(
            CliApp::parse_durations("3,x"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            CliApp::parse_durations("3,-1"),
            Err(ParseError::InvalidArgument { .. })
        ));
        assert!(matches!(
            CliApp::parse_durations(""),
            Err(ParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(7.9), "0:07");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_expand_path() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(CliApp::expand_path("~/decks/out"), home.join("decks/out"));
        }
        assert_eq!(CliApp::expand_path("/abs/path").to_string_lossy(), "/abs/path");
        assert_eq!(CliApp::expand_path("rel/path").to_string_lossy(), "rel/path");
    }

    #[test]
    fn test_cli_parses_commands() {
        let app = CliApp::try_parse_from(["narrate", "resolve", "--durations", "3,5,2", "7.5"]).unwrap();
        match app.command {
            Commands::Resolve { durations, time } => {
                assert_eq!(durations, "3,5,2");
                assert_eq!(time, "7.5");
            }
            other => panic!("unexpected command {:?}", other),
        }

        let app = CliApp::try_parse_from([
            "narrate", "build", "--outline", "o.json", "--narration", "n", "--mode", "convert",
        ])
        .unwrap();
        match app.command {
            Commands::Build { mode, topic, out, .. } => {
                assert_eq!(mode, GenerationMode::Convert);
                assert_eq!(topic, "");
                assert!(out.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }

        let app = CliApp::try_parse_from(["narrate", "wrap", "in.b64", "out.wav"]).unwrap();
        assert!(matches!(app.command, Commands::Wrap { sample_rate: 24_000, .. }));

        assert!(CliApp::try_parse_from(["narrate", "play"]).is_err());
    }
}
