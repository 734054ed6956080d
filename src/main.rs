use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use narrated_deck::audio::duration::DurationMeter;
use narrated_deck::audio::wav::{wrap_pcm_base64, WavContainer};
use narrated_deck::audio::{DevicePlayer, OutputDevices};
use narrated_deck::cli::{format_time, CliApp, Commands, ConfigAction, StatusDisplay};
use narrated_deck::config::ConfigManager;
use narrated_deck::error::{NarratorError, SessionError, TimelineError};
use narrated_deck::logging::NarrationLogger;
use narrated_deck::models::{GenerationMode, SourceDocument};
use narrated_deck::session::local::{
    ManifestWriter, NarrationDirectory, NoVisuals, OutlineFile, PageImageDirectory,
};
use narrated_deck::session::{Collaborators, DocumentRasterizer, Outcome, PresentationSession};
use narrated_deck::timeline::{
    resolve_global_time, PlaybackController, PlaybackState, ResourceTracker, Segment, Timeline,
};

/// Main application controller that coordinates all components
pub struct AppController {
    config_manager: ConfigManager,
    logger: NarrationLogger,
}

impl AppController {
    pub fn new() -> Result<Self, NarratorError> {
        // Initialize logging first (default to 'warn' if unspecified)
        if std::env::var("NARRATE_LOG_LEVEL").is_err() {
            std::env::set_var("NARRATE_LOG_LEVEL", "warn");
        }
        if let Err(e) = NarrationLogger::init() {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = ConfigManager::new()?;
        info!("Application controller initialized");

        Ok(Self {
            config_manager,
            logger: NarrationLogger::new(),
        })
    }

    pub async fn execute_command(&mut self, command: Commands) -> Result<(), NarratorError> {
        match command {
            Commands::Wrap {
                input,
                output,
                sample_rate,
            } => self.wrap(&input, &output, sample_rate).await,
            Commands::Duration { files } => self.measure(&files).await,
            Commands::Resolve { durations, time } => {
                let durations = CliApp::parse_durations(&durations)?;
                let target = CliApp::parse_time(&time)?;
                let (index, offset) =
                    resolve_global_time(&durations, target).ok_or(TimelineError::InvalidTarget(target))?;
                println!("segment {} offset {:.3}s", index, offset);
                Ok(())
            }
            Commands::Build {
                outline,
                narration,
                topic,
                mode,
                document,
                pages,
                out,
            } => {
                let out = out
                    .map(|p| CliApp::expand_path(&p.to_string_lossy()))
                    .unwrap_or_else(|| self.config_manager.get_config().output_directory.clone());
                self.build(&outline, &narration, &topic, mode, document.as_deref(), pages, &out)
                    .await
            }
            Commands::Play { files, device } => self.play(&files, device).await,
            Commands::Devices => {
                let devices = OutputDevices::new()?;
                let default = devices.default_name();
                let names = devices.names();
                if names.is_empty() {
                    println!("No output devices found");
                }
                for name in names {
                    let marker = if Some(&name) == default.as_ref() { "*" } else { " " };
                    println!("{} {}", marker, name);
                }
                Ok(())
            }
            Commands::Config { action } => {
                match action {
                    ConfigAction::Show => {
                        println!("# {}", self.config_manager.config_path().display());
                        let text = toml::to_string_pretty(self.config_manager.get_config())
                            .map_err(narrated_deck::error::ConfigError::from)?;
                        print!("{}", text);
                    }
                    ConfigAction::Reset => {
                        self.config_manager.reset_to_defaults()?;
                        println!("OK: Configuration reset to defaults");
                    }
                }
                Ok(())
            }
        }
    }

    async fn wrap(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), NarratorError> {
        let text = tokio::fs::read_to_string(input).await?;
        let container = wrap_pcm_base64(text.trim(), sample_rate)?;
        let seconds = container
            .header()
            .ok()
            .and_then(|h| h.nominal_duration())
            .unwrap_or_default();
        tokio::fs::write(output, container.as_bytes()).await?;
        println!(
            "OK: {} ({} bytes, {})",
            output.display(),
            container.len(),
            format_time(seconds)
        );
        Ok(())
    }

    async fn measure(&self, files: &[PathBuf]) -> Result<(), NarratorError> {
        let meter = DurationMeter::new(self.config_manager.get_config().fallback_duration_secs);
        for file in files {
            let container = WavContainer::from_bytes(tokio::fs::read(file).await?);
            match meter.try_measure(&container).await {
                Ok(seconds) => println!("{:>8.3}s  {}", seconds, file.display()),
                Err(e) => {
                    let seconds = meter.measure(&container).await;
                    println!("{:>8.3}s  {}  (fallback: {})", seconds, file.display(), e);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn build(
        &self,
        outline: &Path,
        narration: &Path,
        topic: &str,
        mode: GenerationMode,
        document: Option<&Path>,
        pages: Option<PathBuf>,
        out: &Path,
    ) -> Result<(), NarratorError> {
        let outline = OutlineFile::new(outline);
        let slides = outline.load().await?;
        let speech = NarrationDirectory::for_slides(narration, &slides);

        let document = match document {
            Some(path) => {
                let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
                let data = tokio::fs::read(path).await?;
                Some(SourceDocument::new(data, SourceDocument::mime_for_extension(extension)))
            }
            None => None,
        };

        let rasterizer = pages.map(|dir| Arc::new(PageImageDirectory::new(dir)) as Arc<dyn DocumentRasterizer>);
        let collaborators = Collaborators {
            structurer: Arc::new(outline),
            visuals: Arc::new(NoVisuals),
            speech: Arc::new(speech),
            deck_writer: Arc::new(ManifestWriter::new(out)),
            rasterizer,
        };
        let session = PresentationSession::new(collaborators, self.config_manager.get_config().clone());

        if session.generate(topic, document, mode).await? != Outcome::Completed {
            warn!("Generation did not complete");
            return Ok(());
        }

        match session.generate_narration().await {
            Ok(_) => {}
            Err(NarratorError::Session(SessionError::NarrationFailed(reason))) => {
                warn!("No narration could be produced: {}", reason);
                StatusDisplay::display_error(&SessionError::NarrationFailed(reason).into());
            }
            Err(e) => return Err(e),
        }

        tokio::fs::create_dir_all(out).await?;
        let timeline = session.timeline();
        for segment in timeline.segments() {
            if let Some(resource) = &segment.resource {
                let path = out.join(format!("slide-{}.wav", segment.index + 1));
                tokio::fs::write(&path, resource.container().as_bytes()).await?;
                info!("Wrote {}", path.display());
            }
        }

        let manifest = session.export_deck().await?;
        StatusDisplay::display_session_summary(&session.snapshot());
        println!("OK: {}", manifest.display());
        Ok(())
    }

    async fn play(&self, files: &[PathBuf], device: Option<String>) -> Result<(), NarratorError> {
        let config = self.config_manager.get_config().clone();
        let meter = DurationMeter::new(config.fallback_duration_secs);
        let tracker = ResourceTracker::new();

        let mut segments = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let container = WavContainer::from_bytes(tokio::fs::read(file).await?);
            let seconds = meter.measure(&container).await;
            segments.push(Segment::ready(i, seconds, tracker.register(container)));
        }

        let device = device.or_else(|| config.preferred_device.clone());
        let player = DevicePlayer::open(device.as_deref(), config.volume)?;
        println!("Output: {}", player.device_name());
        println!("Keys: <enter> play/pause, n next, b back, s <time> seek, q quit");

        let mut controller = PlaybackController::new(player, config.segment_load_attempts)
            .with_logger(self.logger.clone());
        controller.set_timeline(Timeline::new(1, segments));
        controller.play()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || shutdown_flag.store(true, Ordering::Relaxed)) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // stdin is blocking; read it on its own thread
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut frames = tokio::time::interval(config.frame_interval());
        loop {
            tokio::select! {
                _ = frames.tick() => {
                    let snapshot = controller.tick();
                    StatusDisplay::display_position_update(&snapshot);
                    if snapshot.state == PlaybackState::Ended || shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Some(input) = rx.recv() => {
                    match input.as_str() {
                        "" | "p" => controller.toggle()?,
                        "n" => controller.skip_forward(),
                        "b" => controller.skip_back(),
                        "q" => break,
                        other => match other.strip_prefix("s ") {
                            Some(time) => match CliApp::parse_time(time) {
                                Ok(target) => {
                                    if let Err(e) = controller.seek(target) {
                                        warn!("Seek rejected: {}", e);
                                    }
                                }
                                Err(e) => eprintln!("\n{}", e),
                            },
                            None => eprintln!("\nUnknown key: {}", other),
                        },
                    }
                }
            }
        }

        controller.pause();
        println!();
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = CliApp::parse();

    let mut app = match AppController::new() {
        Ok(app) => app,
        Err(e) => {
            StatusDisplay::display_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.execute_command(cli.command).await {
        log::log!(e.severity().log_level(), "Command failed: {}", e);
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
