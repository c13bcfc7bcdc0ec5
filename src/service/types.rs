//! Domain types exchanged with the diagnosis service.

use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Presentation style requested from the service.
///
/// Changes the tone of the diagnosis and the narration, never its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Persona {
    #[default]
    Technical,
    Presenter,
    Instructor,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Technical, Persona::Presenter, Persona::Instructor];

    /// Name the deployed service expects in the `persona` form field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Persona::Technical => "Technical",
            Persona::Presenter => "YouTuber",
            Persona::Instructor => "Teacher",
        }
    }

    /// Short description for menus.
    pub fn label(self) -> &'static str {
        match self {
            Persona::Technical => "technician mode",
            Persona::Presenter => "video presenter style",
            Persona::Instructor => "teacher mode",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Persona::Technical => "Technical",
            Persona::Presenter => "Presenter",
            Persona::Instructor => "Instructor",
        };
        f.write_str(name)
    }
}

impl FromStr for Persona {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Persona::Technical),
            "presenter" | "youtuber" => Ok(Persona::Presenter),
            "instructor" | "teacher" => Ok(Persona::Instructor),
            _ => Err(AdvisorError::UnknownPersona {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Persona {
    type Error = AdvisorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Persona> for String {
    fn from(persona: Persona) -> Self {
        persona.to_string()
    }
}

/// A submitted question: trimmed, non-empty text plus persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    persona: Persona,
}

impl Query {
    /// Build a query, rejecting empty or whitespace-only text.
    pub fn new(text: &str, persona: Persona) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AdvisorError::EmptyQuery);
        }
        Ok(Self {
            text: text.to_string(),
            persona,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }
}

/// Decoded image bytes with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Structured diagnosis for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisResult {
    pub probable_causes: Vec<String>,
    /// Service confidence in `[0, 1]`.
    pub confidence: f64,
    pub steps: Vec<String>,
    pub cautions: Vec<String>,
    /// Manual pages the answer was drawn from. Empty when nothing matched.
    pub referenced_pages: Vec<u32>,
    pub disclaimer: String,
    /// Rendered manual page illustrating the answer.
    pub visual_page: Option<ImagePayload>,
    pub source_file: Option<String>,
    pub request_id: Option<String>,
    pub next_actions: Option<serde_json::Value>,
    pub video_status: Option<String>,
}

/// Image attached to a slide.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideImage {
    /// Decoded from a `data:` URL.
    Inline(ImagePayload),
    /// Remote reference, fetched by whoever renders it.
    Remote(String),
}

/// One visual unit of the explanatory video.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub kind: String,
    pub caption: String,
    pub image: Option<SlideImage>,
    pub start_offset_seconds: f64,
}

impl Slide {
    /// Caption-only slide, mostly for tests and single-slide fallbacks.
    pub fn caption(kind: &str, caption: &str, start_offset_seconds: f64) -> Self {
        Self {
            kind: kind.to_string(),
            caption: caption.to_string(),
            image: None,
            start_offset_seconds,
        }
    }
}

/// Narrated slide video for one query.
#[derive(Clone, PartialEq)]
pub struct VideoAsset {
    pub script: String,
    /// Encoded narration audio, opaque to the session core.
    pub narration: Vec<u8>,
    /// Non-empty, offsets strictly increasing from 0.
    pub slides: Vec<Slide>,
    /// Duration reported by the service, if any.
    pub duration_hint: Option<f64>,
}

impl fmt::Debug for VideoAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoAsset")
            .field("script_len", &self.script.len())
            .field("narration_len", &self.narration.len())
            .field("slides", &self.slides)
            .field("duration_hint", &self.duration_hint)
            .finish()
    }
}

/// Manuals known to the service and whether their text is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRegistryStatus {
    #[serde(default)]
    pub manuals: Vec<String>,
    #[serde(default)]
    pub is_context_loaded: bool,
    #[serde(default)]
    pub context_length: u64,
    #[serde(default, rename = "is_gemini_cached", skip_serializing_if = "Option::is_none")]
    pub is_cached: Option<bool>,
}

/// Service reply to a manual upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub status: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Plain `{status, message}` reply of the ingest and feedback endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAck {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
