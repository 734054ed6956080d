//! File-backed collaborators used by the command line tool.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::ServiceError;
use crate::models::{GenerationMode, PresentationData, Provenance, Slide, SourceDocument};
use crate::session::services::{
    ContentStructurer, DeckWriter, DocumentRasterizer, SpeechSynthesizer, VisualGenerator,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum OutlineDocument {
    Slides(Vec<Slide>),
    Deck { slides: Vec<Slide> },
}

/// Reads the slide outline from a JSON file.
///
/// Accepts either a bare array of slides or an object with a `slides` array.
pub struct OutlineFile {
    path: PathBuf,
}

impl OutlineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<Vec<Slide>, ServiceError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ServiceError::ContentGeneration(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        parse_outline(&text)
    }
}

fn parse_outline(text: &str) -> Result<Vec<Slide>, ServiceError> {
    let slides = match serde_json::from_str::<OutlineDocument>(text) {
        Ok(OutlineDocument::Slides(slides)) | Ok(OutlineDocument::Deck { slides }) => slides,
        Err(e) => {
            return Err(ServiceError::ContentGeneration(format!(
                "outline is not valid slide JSON: {}",
                e
            )))
        }
    };
    if slides.is_empty() {
        return Err(ServiceError::ContentGeneration("outline contains no slides".to_string()));
    }
    Ok(slides)
}

#[async_trait]
impl ContentStructurer for OutlineFile {
    async fn generate_structure(
        &self,
        _topic: &str,
        _document: Option<&SourceDocument>,
        mode: GenerationMode,
    ) -> Result<Vec<Slide>, ServiceError> {
        let provenance = match mode {
            GenerationMode::Convert => Provenance::Extracted,
            GenerationMode::Create => Provenance::Generated,
        };
        let mut slides = self.load().await?;
        for slide in &mut slides {
            if slide.source.is_none() {
                slide.source = Some(provenance);
            }
        }
        Ok(slides)
    }
}

/// Serves pre-synthesized narration: `slide-N.b64` holds base64 PCM for the
/// N-th slide (1-based).
///
/// Slides sharing the same notes (often empty ones) each queue their own
/// file; narration is requested in slide order, so each request takes the
/// next file queued under its text.
pub struct NarrationDirectory {
    files: Mutex<HashMap<String, VecDeque<PathBuf>>>,
}

impl NarrationDirectory {
    pub fn for_slides(directory: &Path, slides: &[Slide]) -> Self {
        let mut files: HashMap<String, VecDeque<PathBuf>> = HashMap::new();
        for (i, slide) in slides.iter().enumerate() {
            files
                .entry(slide.speaker_notes.clone())
                .or_default()
                .push_back(directory.join(format!("slide-{}.b64", i + 1)));
        }
        Self {
            files: Mutex::new(files),
        }
    }

    fn next_file(&self, text: &str) -> Option<PathBuf> {
        let mut files = self.files.lock().ok()?;
        files.get_mut(text).and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl SpeechSynthesizer for NarrationDirectory {
    async fn synthesize(&self, text: &str) -> Result<String, ServiceError> {
        let path = self.next_file(text).ok_or_else(|| {
            ServiceError::SpeechSynthesis("no narration file for this slide".to_string())
        })?;
        debug!("Reading narration from {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ServiceError::SpeechSynthesis(format!("{}: {}", path.display(), e)))
    }
}

/// Visual generator for offline runs; every slide gets a stock visual
pub struct NoVisuals;

#[async_trait]
impl VisualGenerator for NoVisuals {
    async fn generate_visual(&self, _prompt: &str) -> Result<String, ServiceError> {
        Err(ServiceError::VisualGeneration(
            "no visual generator configured".to_string(),
        ))
    }
}

/// Uses page images rendered ahead of time, ordered by file name
pub struct PageImageDirectory {
    directory: PathBuf,
}

impl PageImageDirectory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DocumentRasterizer for PageImageDirectory {
    async fn rasterize_pages(&self, _document: &SourceDocument) -> Result<Vec<String>, ServiceError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| ServiceError::Rasterization(e.to_string()))?;

        let mut pages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::Rasterization(e.to_string()))?
        {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false);
            if is_image {
                pages.push(path);
            }
        }
        pages.sort();
        Ok(pages.into_iter().map(|p| p.to_string_lossy().into_owned()).collect())
    }
}

/// Writes the deck as a JSON manifest of topic and slides
pub struct ManifestWriter {
    directory: PathBuf,
}

impl ManifestWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl DeckWriter for ManifestWriter {
    fn extension(&self) -> &str {
        "json"
    }

    async fn write_deck(&self, deck: &PresentationData, file_name: &str) -> Result<PathBuf, ServiceError> {
        let json = serde_json::to_string_pretty(deck).map_err(|e| ServiceError::DeckExport(e.to_string()))?;
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| ServiceError::DeckExport(e.to_string()))?;

        let path = self.directory.join(file_name);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ServiceError::DeckExport(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}
