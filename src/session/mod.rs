//! Generation session: one owned presentation state driven through
//! structuring, visuals and narration, observed through a watch channel.
//!
//! Only one generation step runs at a time. Every step captures the session
//! epoch when it starts and drops its results if the epoch moved on (the
//! session was reset or a new presentation was started) by the time they
//! arrive.

pub mod local;
pub mod services;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::audio::duration::DurationMeter;
use crate::audio::wav::wrap_pcm_base64;
use crate::config::NarratorConfig;
use crate::error::{NarratorError, ServiceError, SessionError};
use crate::logging::{NarrationLogger, OperationTimer};
use crate::models::{AppPhase, GenerationMode, GenerationProgress, PresentationData, Slide, SourceDocument};
use crate::timeline::{NarrationStatus, ResourceTracker, Segment, Timeline};

pub use services::{
    deck_file_name, fallback_visual, ContentStructurer, DeckWriter, DocumentRasterizer,
    SpeechSynthesizer, VisualGenerator, FALLBACK_VISUALS,
};

const SLOW_SERVICE_CALL: Duration = Duration::from_secs(20);

/// How a generation step finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Another step was already running; nothing was done
    Ignored,
    /// The session was reset while the step ran; its results were discarded
    Superseded,
}

/// External services the session drives
#[derive(Clone)]
pub struct Collaborators {
    pub structurer: Arc<dyn ContentStructurer>,
    pub visuals: Arc<dyn VisualGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub deck_writer: Arc<dyn DeckWriter>,
    pub rasterizer: Option<Arc<dyn DocumentRasterizer>>,
}

/// Observable view of the session. Carries no audio, so holding a snapshot
/// never keeps packaged narration alive.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub epoch: u64,
    pub phase: AppPhase,
    pub topic: String,
    pub slides: Vec<Slide>,
    pub progress: GenerationProgress,
    pub error: Option<String>,
    pub narration: Vec<NarrationStatus>,
    pub durations: Vec<Option<f64>>,
}

struct SessionState {
    epoch: u64,
    phase: AppPhase,
    topic: String,
    slides: Vec<Slide>,
    progress: GenerationProgress,
    error: Option<String>,
    segments: Vec<Segment>,
}

impl SessionState {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            phase: AppPhase::Input,
            topic: String::new(),
            slides: Vec::new(),
            progress: GenerationProgress::default(),
            error: None,
            segments: Vec::new(),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            epoch: self.epoch,
            phase: self.phase,
            topic: self.topic.clone(),
            slides: self.slides.clone(),
            progress: self.progress.clone(),
            error: self.error.clone(),
            narration: self.segments.iter().map(|s| s.narration).collect(),
            durations: self.segments.iter().map(|s| s.duration).collect(),
        }
    }

    fn fully_narrated(&self) -> bool {
        !self.segments.is_empty()
            && self
                .segments
                .iter()
                .all(|s| s.narration == NarrationStatus::Ready)
    }
}

struct Inner {
    state: Mutex<SessionState>,
    busy: AtomicBool,
    cancel: Mutex<CancellationToken>,
    updates: watch::Sender<SessionSnapshot>,
    collaborators: Collaborators,
    meter: DurationMeter,
    tracker: ResourceTracker,
    config: NarratorConfig,
    logger: NarrationLogger,
}

/// Clears the single-flight flag when a step finishes
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared handle to a presentation session. Clones refer to the same session.
#[derive(Clone)]
pub struct PresentationSession {
    inner: Arc<Inner>,
}

impl PresentationSession {
    pub fn new(collaborators: Collaborators, config: NarratorConfig) -> Self {
        let meter = DurationMeter::new(config.fallback_duration_secs);
        Self::with_meter(collaborators, config, meter)
    }

    pub fn with_meter(collaborators: Collaborators, config: NarratorConfig, meter: DurationMeter) -> Self {
        let state = SessionState::new(0);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                busy: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
                updates,
                collaborators,
                meter,
                tracker: ResourceTracker::new(),
                config,
                logger: NarrationLogger::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// Current segment list as a playable timeline
    pub fn timeline(&self) -> Timeline {
        let state = self.state();
        Timeline::new(state.epoch, state.segments.clone())
    }

    /// Packaged narration containers not yet released
    pub fn live_audio_resources(&self) -> usize {
        self.inner.tracker.live()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Build a new presentation from a topic and/or document.
    ///
    /// Replaces whatever presentation the session held. Content structuring
    /// failures are fatal to the attempt; visual failures fall back to stock
    /// imagery.
    pub async fn generate(
        &self,
        topic: &str,
        document: Option<SourceDocument>,
        mode: GenerationMode,
    ) -> Result<Outcome, NarratorError> {
        let Some(_flight) = self.try_begin() else {
            info!("Generation already in progress; request ignored");
            return Ok(Outcome::Ignored);
        };

        let topic = match topic.trim() {
            "" if document.is_some() => "Extracted Presentation".to_string(),
            "" => "New AI Presentation".to_string(),
            t => t.to_string(),
        };
        let (epoch, token) = self.start_new_run(&topic, mode);
        self.inner.logger.log_generation_started(mode.as_str(), &topic);

        let timer = OperationTimer::new("content structuring");
        let structured = cancellable(
            &token,
            self.inner
                .collaborators
                .structurer
                .generate_structure(&topic, document.as_ref(), mode),
        )
        .await;
        timer.finish_with_threshold(SLOW_SERVICE_CALL);

        let mut slides = match structured {
            None => return Ok(Outcome::Superseded),
            Some(Ok(slides)) => slides,
            Some(Err(e)) => {
                self.inner.logger.log_generation_failed("Content structuring", &e.to_string());
                let message = e.user_message();
                let current = self.update(epoch, |state| {
                    state.phase = AppPhase::Error;
                    state.error = Some(message);
                });
                return if current { Err(e.into()) } else { Ok(Outcome::Superseded) };
            }
        };
        for (i, slide) in slides.iter_mut().enumerate() {
            slide.id = i as u32 + 1;
        }
        let total = slides.len();
        self.inner.logger.log_structure_ready(total);

        let current = self.update(epoch, |state| {
            state.segments = (0..total).map(Segment::pending).collect();
            state.slides = slides;
            state.phase = AppPhase::Preview;
        });
        if !current {
            return Ok(Outcome::Superseded);
        }

        match mode {
            GenerationMode::Convert => self.attach_page_images(epoch, &token, document.as_ref(), total).await,
            GenerationMode::Create => self.generate_visuals(epoch, &token, total).await,
        }
    }

    /// Synthesize narration for every slide that does not have it yet.
    ///
    /// Requests go out one at a time. The phase switches to the video player
    /// as soon as the first segment is playable. A slide whose synthesis
    /// fails is marked missing and skipped in playback; the step only fails
    /// when no slide ends up narrated.
    pub async fn generate_narration(&self) -> Result<Outcome, NarratorError> {
        let Some(_flight) = self.try_begin() else {
            info!("Generation already in progress; request ignored");
            return Ok(Outcome::Ignored);
        };
        let token = self.token();

        let (epoch, jobs) = {
            let mut state = self.state();
            if state.slides.is_empty() {
                return Err(SessionError::NothingToNarrate.into());
            }
            if state.fully_narrated() {
                state.phase = AppPhase::VideoPlayer;
                let snapshot = state.snapshot();
                drop(state);
                self.publish(snapshot);
                return Ok(Outcome::Completed);
            }

            let jobs: Vec<(usize, String)> = state
                .segments
                .iter()
                .zip(state.slides.iter())
                .filter(|(segment, _)| segment.narration != NarrationStatus::Ready)
                .map(|(segment, slide)| (segment.index, slide.speaker_notes.clone()))
                .collect();
            // slides narrated by an earlier run count as done
            let total = state.slides.len();
            state.phase = AppPhase::GeneratingVideo;
            state.error = None;
            state.progress = GenerationProgress::new(total - jobs.len(), total, "Generating narration...");
            let snapshot = state.snapshot();
            let epoch = state.epoch;
            drop(state);
            self.publish(snapshot);
            (epoch, jobs)
        };

        let delay = self.inner.config.narration_delay();
        let mut last_failure = None;
        for (n, (index, text)) in jobs.into_iter().enumerate() {
            if n > 0 && !delay.is_zero() && cancellable(&token, tokio::time::sleep(delay)).await.is_none() {
                return Ok(Outcome::Superseded);
            }
            let current = self.update(epoch, |state| {
                state.progress.status = format!("Synthesizing voiceover for slide {}...", index + 1);
            });
            if !current {
                return Ok(Outcome::Superseded);
            }

            let segment = match cancellable(&token, self.narrate(index, &text)).await {
                None => return Ok(Outcome::Superseded),
                Some(Ok(segment)) => segment,
                Some(Err(e)) => {
                    self.inner.logger.log_narration_missing(index, &e.to_string());
                    last_failure = Some(e.to_string());
                    Segment::missing(index)
                }
            };

            let current = self.update(epoch, |state| {
                let ready = segment.narration == NarrationStatus::Ready;
                if let Some(slot) = state.segments.get_mut(index) {
                    *slot = segment;
                }
                state.progress.current_slide += 1;
                if ready && state.phase == AppPhase::GeneratingVideo {
                    state.phase = AppPhase::VideoPlayer;
                }
            });
            if !current {
                return Ok(Outcome::Superseded);
            }
        }

        let mut failed = false;
        let current = self.update(epoch, |state| {
            if state.segments.iter().any(|s| s.narration == NarrationStatus::Ready) {
                state.phase = AppPhase::VideoPlayer;
            } else {
                failed = true;
                state.segments = (0..state.slides.len()).map(Segment::pending).collect();
                state.phase = AppPhase::Preview;
                state.error = Some(SessionError::NarrationFailed(String::new()).user_message());
            }
        });
        if !current {
            return Ok(Outcome::Superseded);
        }
        if failed {
            let reason = last_failure.unwrap_or_else(|| "no narration produced".to_string());
            self.inner.logger.log_generation_failed("Narration", &reason);
            return Err(SessionError::NarrationFailed(reason).into());
        }
        Ok(Outcome::Completed)
    }

    /// Hand the current slides to the deck writer
    pub async fn export_deck(&self) -> Result<PathBuf, NarratorError> {
        let deck = {
            let state = self.state();
            if state.slides.is_empty() {
                return Err(SessionError::NothingToExport.into());
            }
            PresentationData {
                topic: state.topic.clone(),
                slides: state.slides.clone(),
            }
        };

        let writer = &self.inner.collaborators.deck_writer;
        let file_name = deck_file_name(&deck.topic, writer.extension());
        let path = writer.write_deck(&deck, &file_name).await?;
        info!("Exported {} slides to {}", deck.slides.len(), path.display());
        Ok(path)
    }

    /// Leave the video player and return to the slide preview
    pub fn close_player(&self) {
        let snapshot = {
            let mut state = self.state();
            if state.phase != AppPhase::VideoPlayer {
                return;
            }
            state.phase = AppPhase::Preview;
            state.snapshot()
        };
        self.publish(snapshot);
    }

    /// Drop the presentation and all packaged narration, and invalidate any
    /// step still in flight.
    pub fn reset(&self) {
        self.cancel_current();
        let (epoch, released, snapshot) = {
            let mut state = self.state();
            let released = state.segments.iter().filter(|s| s.resource.is_some()).count();
            let epoch = state.epoch + 1;
            *state = SessionState::new(epoch);
            (epoch, released, state.snapshot())
        };
        self.publish(snapshot);
        self.inner.logger.log_session_reset(epoch, released);
    }

    async fn narrate(&self, index: usize, text: &str) -> Result<Segment, ServiceError> {
        let timer = OperationTimer::new(format!("speech synthesis for slide {}", index + 1));
        let pcm = self.inner.collaborators.speech.synthesize(text).await;
        timer.finish_with_threshold(SLOW_SERVICE_CALL);

        let container = wrap_pcm_base64(&pcm?, self.inner.config.sample_rate)
            .map_err(|e| ServiceError::SpeechSynthesis(e.to_string()))?;
        let duration = self.inner.meter.measure(&container).await;
        self.inner.logger.log_narration_synthesized(index, duration);
        Ok(Segment::ready(index, duration, self.inner.tracker.register(container)))
    }

    async fn generate_visuals(
        &self,
        epoch: u64,
        token: &CancellationToken,
        total: usize,
    ) -> Result<Outcome, NarratorError> {
        let current = self.update(epoch, |state| {
            state.progress = GenerationProgress::new(0, total, "Creating AI visuals...");
        });
        if !current {
            return Ok(Outcome::Superseded);
        }

        let delay = self.inner.config.visual_delay();
        for i in 0..total {
            if i > 0 && cancellable(token, tokio::time::sleep(delay)).await.is_none() {
                return Ok(Outcome::Superseded);
            }

            let (slide_id, prompt) = {
                let state = self.state();
                match state.slides.get(i) {
                    Some(slide) if state.epoch == epoch => (slide.id, slide.image_prompt.clone()),
                    _ => return Ok(Outcome::Superseded),
                }
            };

            let visual = cancellable(token, self.inner.collaborators.visuals.generate_visual(&prompt)).await;
            let image_url = match visual {
                None => return Ok(Outcome::Superseded),
                Some(Ok(url)) => url,
                Some(Err(e)) => {
                    self.inner.logger.log_visual_fallback(slide_id, &e.to_string());
                    fallback_visual(&prompt).to_string()
                }
            };

            let current = self.update(epoch, |state| {
                if let Some(slide) = state.slides.get_mut(i) {
                    slide.image_url = Some(image_url);
                }
                state.progress.current_slide = i + 1;
            });
            if !current {
                return Ok(Outcome::Superseded);
            }
        }
        Ok(Outcome::Completed)
    }

    async fn attach_page_images(
        &self,
        epoch: u64,
        token: &CancellationToken,
        document: Option<&SourceDocument>,
        total: usize,
    ) -> Result<Outcome, NarratorError> {
        let mut pages = Vec::new();
        if let (Some(rasterizer), Some(document)) = (&self.inner.collaborators.rasterizer, document) {
            match cancellable(token, rasterizer.rasterize_pages(document)).await {
                None => return Ok(Outcome::Superseded),
                Some(Ok(rendered)) => pages = rendered,
                Some(Err(e)) => log::warn!("Keeping extracted slides without page images: {}", e),
            }
        }

        let current = self.update(epoch, |state| {
            for (slide, page) in state.slides.iter_mut().zip(pages) {
                slide.original_image_url = Some(page);
            }
            state.progress = GenerationProgress::new(total, total, "Extraction complete.");
        });
        Ok(if current { Outcome::Completed } else { Outcome::Superseded })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn token(&self) -> CancellationToken {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn cancel_current(&self) -> CancellationToken {
        let mut cancel = self.inner.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let fresh = CancellationToken::new();
        std::mem::replace(&mut *cancel, fresh.clone()).cancel();
        fresh
    }

    fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FlightGuard(&self.inner.busy))
    }

    /// Start a fresh presentation: new epoch, new cancellation scope, old
    /// narration released.
    fn start_new_run(&self, topic: &str, mode: GenerationMode) -> (u64, CancellationToken) {
        let token = self.cancel_current();
        let (epoch, snapshot) = {
            let mut state = self.state();
            let epoch = state.epoch + 1;
            *state = SessionState::new(epoch);
            state.phase = AppPhase::GeneratingStructure;
            state.topic = topic.to_string();
            state.progress = GenerationProgress::new(
                0,
                0,
                match mode {
                    GenerationMode::Convert => "Extracting original slide content...",
                    GenerationMode::Create => "Designing new presentation...",
                },
            );
            (epoch, state.snapshot())
        };
        self.publish(snapshot);
        (epoch, token)
    }

    /// Apply a change if the session is still on `epoch`, then notify
    /// subscribers. Returns false when the change was stale and dropped.
    fn update(&self, epoch: u64, apply: impl FnOnce(&mut SessionState)) -> bool {
        let snapshot = {
            let mut state = self.state();
            if state.epoch != epoch {
                debug!("Dropping result from epoch {} (now {})", epoch, state.epoch);
                return false;
            }
            apply(&mut state);
            state.snapshot()
        };
        self.publish(snapshot);
        true
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        self.inner.updates.send_replace(snapshot);
    }
}

/// Run `future` unless `token` fires first
async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::local::{ManifestWriter, NoVisuals};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::sync::atomic::AtomicUsize;

    struct FixedOutline(usize);

    #[async_trait]
    impl ContentStructurer for FixedOutline {
        async fn generate_structure(
            &self,
            topic: &str,
            _document: Option<&SourceDocument>,
            _mode: GenerationMode,
        ) -> Result<Vec<Slide>, ServiceError> {
            Ok((0..self.0)
                .map(|i| {
                    let mut slide = Slide::new(0, format!("{} {}", topic, i));
                    slide.speaker_notes = format!("Notes {}", i);
                    slide.image_prompt = "x".repeat(i);
                    slide
                })
                .collect())
        }
    }

    /// Half a second of silence per call; fails on the listed call numbers
    struct ScriptedSpeech {
        calls: AtomicUsize,
        failing_calls: Vec<usize>,
    }

    #[async_trait]
    impl SpeechSynthesizer for ScriptedSpeech {
        async fn synthesize(&self, _text: &str) -> Result<String, ServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_calls.contains(&call) {
                return Err(ServiceError::SpeechSynthesis("429 quota".to_string()));
            }
            Ok(STANDARD.encode(vec![0u8; 24_000]))
        }
    }

    fn session(slides: usize, failing_calls: Vec<usize>) -> (PresentationSession, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let collaborators = Collaborators {
            structurer: Arc::new(FixedOutline(slides)),
            visuals: Arc::new(NoVisuals),
            speech: Arc::new(ScriptedSpeech {
                calls: AtomicUsize::new(0),
                failing_calls,
            }),
            deck_writer: Arc::new(ManifestWriter::new(dir.path())),
            rasterizer: None,
        };
        let config = NarratorConfig {
            visual_delay_ms: 0,
            ..NarratorConfig::default()
        };
        (PresentationSession::new(collaborators, config), dir)
    }

    #[tokio::test]
    async fn test_create_mode_uses_fallback_visuals() {
        let (session, _dir) = session(3, vec![]);
        let outcome = session.generate("", None, GenerationMode::Create).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.topic, "New AI Presentation");
        assert_eq!(snapshot.phase, AppPhase::Preview);
        assert_eq!(snapshot.progress.current_slide, 3);
        let ids: Vec<_> = snapshot.slides.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot.slides[1].image_url.as_deref(), Some(FALLBACK_VISUALS[1]));
        assert_eq!(snapshot.narration, vec![NarrationStatus::Pending; 3]);
    }

    #[tokio::test]
    async fn test_topic_defaults_for_documents() {
        let (session, _dir) = session(1, vec![]);
        let document = SourceDocument::new(b"%PDF".to_vec(), "application/pdf");
        session
            .generate("  ", Some(document), GenerationMode::Convert)
            .await
            .unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.topic, "Extracted Presentation");
        assert_eq!(snapshot.progress.status, "Extraction complete.");
        assert!(snapshot.slides[0].image_url.is_none());
    }

    #[tokio::test]
    async fn test_narration_builds_timeline() {
        let (session, _dir) = session(2, vec![]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();
        session.generate_narration().await.unwrap();

        let timeline = session.timeline();
        assert_eq!(timeline.len(), 2);
        let total = timeline.total_duration().unwrap();
        assert!((total - 1.0).abs() < 1e-3, "total {}", total);
        assert_eq!(session.snapshot().phase, AppPhase::VideoPlayer);
        assert_eq!(session.live_audio_resources(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_marks_missing() {
        let (session, _dir) = session(3, vec![1]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();
        session.generate_narration().await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.narration,
            vec![NarrationStatus::Ready, NarrationStatus::Missing, NarrationStatus::Ready]
        );
        assert_eq!(snapshot.phase, AppPhase::VideoPlayer);

        // Retrying only synthesizes the missing slide
        let mut updates = session.subscribe();
        session.generate_narration().await.unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.narration, vec![NarrationStatus::Ready; 3]);
        assert_eq!(snapshot.progress.current_slide, 3);
        assert_eq!(snapshot.progress.total_slides, 3);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().progress.current_slide, 3);
    }

    #[tokio::test]
    async fn test_retry_progress_reaches_total() {
        let (session, _dir) = session(4, vec![0, 2]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();
        session.generate_narration().await.unwrap();
        assert_eq!(session.snapshot().progress.current_slide, 4);

        session.generate_narration().await.unwrap();
        let progress = session.snapshot().progress;
        assert_eq!(progress.current_slide, 4);
        assert_eq!(progress.total_slides, 4);
    }

    #[tokio::test]
    async fn test_close_player_returns_to_preview() {
        let (session, _dir) = session(2, vec![]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();

        // Only leaves the player view
        session.close_player();
        assert_eq!(session.snapshot().phase, AppPhase::Preview);

        session.generate_narration().await.unwrap();
        assert_eq!(session.snapshot().phase, AppPhase::VideoPlayer);

        session.close_player();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, AppPhase::Preview);
        assert_eq!(snapshot.narration, vec![NarrationStatus::Ready; 2]);
        assert_eq!(session.live_audio_resources(), 2);

        // Narration is kept, so reopening goes straight to the player
        session.generate_narration().await.unwrap();
        assert_eq!(session.snapshot().phase, AppPhase::VideoPlayer);
    }

    #[tokio::test]
    async fn test_total_failure_returns_to_preview() {
        let (session, _dir) = session(2, vec![0, 1]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();

        let err = session.generate_narration().await.unwrap_err();
        assert!(matches!(err, NarratorError::Session(SessionError::NarrationFailed(_))));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, AppPhase::Preview);
        assert_eq!(snapshot.error.as_deref(), Some("Audio quota reached. Try again in a minute."));
        assert_eq!(snapshot.slides.len(), 2);
        assert_eq!(snapshot.narration, vec![NarrationStatus::Pending; 2]);
    }

    #[tokio::test]
    async fn test_reset_releases_audio() {
        let (session, _dir) = session(2, vec![]);
        session.generate("Rust", None, GenerationMode::Create).await.unwrap();
        session.generate_narration().await.unwrap();
        assert_eq!(session.live_audio_resources(), 2);

        session.reset();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, AppPhase::Input);
        assert!(snapshot.slides.is_empty());
        assert!(snapshot.topic.is_empty());
        assert_eq!(session.live_audio_resources(), 0);
    }

    #[tokio::test]
    async fn test_narration_requires_slides() {
        let (session, _dir) = session(0, vec![]);
        let err = session.generate_narration().await.unwrap_err();
        assert!(matches!(err, NarratorError::Session(SessionError::NothingToNarrate)));
    }

    #[tokio::test]
    async fn test_export_writes_named_manifest() {
        let (session, dir) = session(2, vec![]);
        assert!(session.export_deck().await.is_err());

        session.generate("Ship It!", None, GenerationMode::Create).await.unwrap();
        let path = session.export_deck().await.unwrap();
        assert_eq!(path, dir.path().join("ship_it_.json"));
        assert!(path.exists());
    }
}
