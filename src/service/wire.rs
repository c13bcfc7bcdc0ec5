//! JSON bodies of the diagnosis service and their decoding into domain types.
//!
//! Every contract violation becomes [`RequestError::MalformedResponse`]; a bad
//! body never panics and never reaches the session state.

use crate::defaults;
use crate::playback::timeline::check_slide_order;
use crate::service::error::RequestError;
use crate::service::types::{DiagnosisResult, ImagePayload, Slide, SlideImage, VideoAsset};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DiagnosisBody {
    probable_causes: Vec<String>,
    confidence: f64,
    steps: Vec<String>,
    cautions: Vec<String>,
    disclaimer: String,
    #[serde(default)]
    referenced_pages: Option<Vec<i64>>,
    #[serde(default)]
    next_actions: Option<serde_json::Value>,
    #[serde(default)]
    source_file: Option<String>,
    #[serde(default)]
    visual_page_base64: Option<String>,
    #[serde(default)]
    video_status: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoBody {
    script: String,
    audio_base64: String,
    slides: Vec<SlideBody>,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SlideBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    start_offset_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScriptBody {
    script: String,
}

/// Error body produced by the service framework (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Decode a diagnosis success body.
pub fn decode_diagnosis(body: &str) -> Result<DiagnosisResult, RequestError> {
    let wire: DiagnosisBody = serde_json::from_str(body)
        .map_err(|e| RequestError::malformed(format!("diagnosis body: {e}")))?;

    if !wire.confidence.is_finite() || !(0.0..=1.0).contains(&wire.confidence) {
        return Err(RequestError::malformed(format!(
            "confidence {} outside [0, 1]",
            wire.confidence
        )));
    }

    let referenced_pages = wire
        .referenced_pages
        .unwrap_or_default()
        .into_iter()
        .map(|page| {
            u32::try_from(page)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| RequestError::malformed(format!("invalid page number {page}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let visual_page = match non_empty(wire.visual_page_base64) {
        Some(encoded) => Some(ImagePayload {
            mime: "image/png".to_string(),
            bytes: decode_base64(&encoded, "visual_page_base64")?,
        }),
        None => None,
    };

    Ok(DiagnosisResult {
        probable_causes: wire.probable_causes,
        confidence: wire.confidence,
        steps: wire.steps,
        cautions: wire.cautions,
        referenced_pages,
        disclaimer: wire.disclaimer,
        visual_page,
        source_file: non_empty(wire.source_file),
        request_id: non_empty(wire.request_id),
        next_actions: wire.next_actions.filter(|v| !v.is_null()),
        video_status: non_empty(wire.video_status),
    })
}

/// Decode a video success body.
pub fn decode_video(body: &str) -> Result<VideoAsset, RequestError> {
    let wire: VideoBody = serde_json::from_str(body)
        .map_err(|e| RequestError::malformed(format!("video body: {e}")))?;

    if wire.slides.is_empty() {
        return Err(RequestError::malformed("video has no slides"));
    }

    let narration = decode_base64(&wire.audio_base64, "audio_base64")?;
    if narration.is_empty() {
        return Err(RequestError::malformed("narration audio missing"));
    }

    let mut slides = Vec::with_capacity(wire.slides.len());
    for (index, slide) in wire.slides.into_iter().enumerate() {
        let start_offset_seconds = match (slide.start_offset_seconds, index) {
            (Some(offset), _) => offset,
            (None, 0) => 0.0,
            (None, _) => {
                return Err(RequestError::malformed(format!(
                    "slide {index} has no start offset"
                )));
            }
        };
        let image = match non_empty(slide.image) {
            Some(reference) => Some(decode_slide_image(&reference)?),
            None => None,
        };
        slides.push(Slide {
            kind: non_empty(slide.kind).unwrap_or_else(|| "slide".to_string()),
            caption: non_empty(slide.text)
                .unwrap_or_else(|| defaults::FALLBACK_CAPTION.to_string()),
            image,
            start_offset_seconds,
        });
    }

    check_slide_order(&slides).map_err(|e| RequestError::malformed(e.to_string()))?;

    let duration_hint = wire
        .duration_seconds
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(VideoAsset {
        script: wire.script,
        narration,
        slides,
        duration_hint,
    })
}

/// Decode a script-only body.
pub fn decode_script(body: &str) -> Result<String, RequestError> {
    let wire: ScriptBody = serde_json::from_str(body)
        .map_err(|e| RequestError::malformed(format!("script body: {e}")))?;
    Ok(wire.script)
}

/// Pull the human-readable `detail` out of an error body, if there is one.
pub fn error_detail(body: &str) -> Option<String> {
    let wire: ErrorBody = serde_json::from_str(body).ok()?;
    match wire.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn decode_slide_image(reference: &str) -> Result<SlideImage, RequestError> {
    let Some(rest) = reference.strip_prefix("data:") else {
        return Ok(SlideImage::Remote(reference.to_string()));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| RequestError::malformed("slide image data URL has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| RequestError::malformed("slide image data URL is not base64"))?;
    Ok(SlideImage::Inline(ImagePayload {
        mime: if mime.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime.to_string()
        },
        bytes: decode_base64(data, "slide image")?,
    }))
}

fn decode_base64(encoded: &str, field: &str) -> Result<Vec<u8>, RequestError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| RequestError::malformed(format!("{field} is not valid base64: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
