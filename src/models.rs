use serde::{Deserialize, Serialize};

/// Visual arrangement of a slide
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayout {
    Title,
    #[default]
    ContentRight,
    ContentLeft,
    DiagramCenter,
}

/// Whether slide content was lifted from a document or written fresh
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Extracted,
    Generated,
}

/// A grounding reference cited by a slide
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlideSource {
    pub uri: String,
    pub title: String,
}

/// One slide as produced by content structuring and enriched by later steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(default)]
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub speaker_notes: String,
    #[serde(default)]
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Full-page capture of the source document, kept for visual fidelity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image_url: Option<String>,
    #[serde(default)]
    pub layout: SlideLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SlideSource>,
}

impl Slide {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: Vec::new(),
            speaker_notes: String::new(),
            image_prompt: String::new(),
            image_url: None,
            original_image_url: None,
            layout: SlideLayout::default(),
            source: None,
            sources: Vec::new(),
        }
    }

    /// The image to show: the original page capture wins over a generated visual
    pub fn display_image(&self) -> Option<&str> {
        self.original_image_url
            .as_deref()
            .or(self.image_url.as_deref())
    }
}

/// Topic plus ordered slides, the unit handed to deck export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PresentationData {
    pub topic: String,
    pub slides: Vec<Slide>,
}

/// Screen the application is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppPhase {
    #[default]
    Input,
    GeneratingStructure,
    GeneratingImages,
    GeneratingVideo,
    Preview,
    VideoPlayer,
    Error,
}

impl AppPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppPhase::Input => "input",
            AppPhase::GeneratingStructure => "generating_structure",
            AppPhase::GeneratingImages => "generating_images",
            AppPhase::GeneratingVideo => "generating_video",
            AppPhase::Preview => "preview",
            AppPhase::VideoPlayer => "video_player",
            AppPhase::Error => "error",
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(
            self,
            AppPhase::GeneratingStructure | AppPhase::GeneratingImages | AppPhase::GeneratingVideo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Design a new presentation, with generated visuals
    #[default]
    Create,
    /// Extract an existing deck or document faithfully, without new visuals
    Convert,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Create => "create",
            GenerationMode::Convert => "convert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationProgress {
    pub current_slide: usize,
    pub total_slides: usize,
    pub status: String,
}

impl GenerationProgress {
    pub fn new(current_slide: usize, total_slides: usize, status: impl Into<String>) -> Self {
        Self {
            current_slide,
            total_slides,
            status: status.into(),
        }
    }
}

/// A document supplied as the basis of a presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl SourceDocument {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Guess the MIME type from a file extension
    pub fn mime_for_extension(extension: &str) -> &'static str {
        match extension.to_lowercase().as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "txt" | "md" => "text/plain",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            _ => "application/octet-stream",
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_json_shape() {
        let json = r#"{
            "title": "Why Rust",
            "content": ["Memory safety", "Speed"],
            "speakerNotes": "Rust gives you both.",
            "imagePrompt": "a crab",
            "layout": "content_left",
            "source": "generated"
        }"#;

        let slide: Slide = serde_json::from_str(json).unwrap();
        assert_eq!(slide.id, 0);
        assert_eq!(slide.content.len(), 2);
        assert_eq!(slide.speaker_notes, "Rust gives you both.");
        assert_eq!(slide.layout, SlideLayout::ContentLeft);
        assert_eq!(slide.source, Some(Provenance::Generated));

        let value = serde_json::to_value(&slide).unwrap();
        assert_eq!(value["imagePrompt"], "a crab");
        assert!(value.get("imageUrl").is_none());
        assert!(value.get("sources").is_none());
    }

    #[test]
    fn test_layout_defaults_when_absent() {
        let slide: Slide = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();
        assert_eq!(slide.layout, SlideLayout::ContentRight);
        assert!(slide.speaker_notes.is_empty());
    }

    #[test]
    fn test_display_image_prefers_original_page() {
        let mut slide = Slide::new(1, "Intro");
        slide.image_url = Some("generated.png".to_string());
        assert_eq!(slide.display_image(), Some("generated.png"));

        slide.original_image_url = Some("page-1.png".to_string());
        assert_eq!(slide.display_image(), Some("page-1.png"));
    }

    #[test]
    fn test_phase_helpers() {
        assert!(AppPhase::GeneratingVideo.is_generating());
        assert!(!AppPhase::Preview.is_generating());
        assert_eq!(AppPhase::VideoPlayer.as_str(), "video_player");
        assert_eq!(AppPhase::default(), AppPhase::Input);
    }

    #[test]
    fn test_mime_guessing() {
        assert_eq!(SourceDocument::mime_for_extension("PDF"), "application/pdf");
        assert!(SourceDocument::new(vec![], "application/pdf").is_pdf());
        assert_eq!(SourceDocument::mime_for_extension("bin"), "application/octet-stream");
    }
}
