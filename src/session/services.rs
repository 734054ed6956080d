//! Contracts for the external collaborators a session orchestrates.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::{GenerationMode, PresentationData, Slide, SourceDocument};

/// Stock visuals substituted when visual generation fails
pub const FALLBACK_VISUALS: [&str; 4] = [
    "https://images.unsplash.com/photo-1460925895917-afdab827c52f?auto=format&fit=crop&q=80&w=1200",
    "https://images.unsplash.com/photo-1551288049-bebda4e38f71?auto=format&fit=crop&q=80&w=1200",
    "https://images.unsplash.com/photo-1553877522-43269d4ea984?auto=format&fit=crop&q=80&w=1200",
    "https://images.unsplash.com/photo-1504384308090-c894fdcc538d?auto=format&fit=crop&q=80&w=1200",
];

/// Turns a topic and/or document into an ordered slide outline
#[async_trait]
pub trait ContentStructurer: Send + Sync {
    async fn generate_structure(
        &self,
        topic: &str,
        document: Option<&SourceDocument>,
        mode: GenerationMode,
    ) -> Result<Vec<Slide>, ServiceError>;
}

/// Produces an image (URL or data URL) for a visual prompt
#[async_trait]
pub trait VisualGenerator: Send + Sync {
    async fn generate_visual(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Produces base64 PCM narration: 24 kHz, mono, signed 16-bit little-endian
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<String, ServiceError>;
}

/// Assembles the exported deck file
#[async_trait]
pub trait DeckWriter: Send + Sync {
    /// File extension of the produced deck, without the dot
    fn extension(&self) -> &str;

    async fn write_deck(
        &self,
        deck: &PresentationData,
        file_name: &str,
    ) -> Result<PathBuf, ServiceError>;
}

/// Renders each page of a document to an image
#[async_trait]
pub trait DocumentRasterizer: Send + Sync {
    async fn rasterize_pages(&self, document: &SourceDocument) -> Result<Vec<String>, ServiceError>;
}

/// Stock visual for a prompt, picked by the prompt's length
pub fn fallback_visual(prompt: &str) -> &'static str {
    FALLBACK_VISUALS[prompt.encode_utf16().count() % FALLBACK_VISUALS.len()]
}

/// File name for an exported deck: every character outside `[a-z0-9]`
/// becomes `_`, the result is lower-cased, and an empty topic falls back to
/// `presentation`.
pub fn deck_file_name(topic: &str, extension: &str) -> String {
    let stem: String = topic
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "presentation".to_string() } else { stem };
    format!("{}.{}", stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_visual_is_chosen_by_prompt_length() {
        assert_eq!(fallback_visual(""), FALLBACK_VISUALS[0]);
        assert_eq!(fallback_visual("abc"), FALLBACK_VISUALS[3]);
        assert_eq!(fallback_visual("abcde"), FALLBACK_VISUALS[1]);
    }

    #[test]
    fn test_deck_file_name() {
        assert_eq!(deck_file_name("Rust 2024: What's New?", "pptx"), "rust_2024__what_s_new_.pptx");
        assert_eq!(deck_file_name("", "pptx"), "presentation.pptx");
        assert_eq!(deck_file_name("Café", "json"), "caf_.json");
    }
}
