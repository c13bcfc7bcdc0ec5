//! Transcript sources: where utterances come from.
//!
//! The session core only sees [`CaptureEvent`]s. Whatever produces them
//! (an external speech recognizer, typed text, a test script) implements
//! [`SpeechCapture`].

pub mod command;
pub mod mock;
pub mod text_entry;

pub use command::CommandCapture;
pub use mock::MockCapture;
pub use text_entry::TextEntryCapture;

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

/// Why a capture produced no utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CaptureErrorKind {
    /// Microphone or recognizer access was denied.
    NotAllowed,
    /// Capture ran but heard nothing usable.
    NoSpeech,
    Other(String),
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureErrorKind::NotAllowed => f.write_str("speech capture not allowed"),
            CaptureErrorKind::NoSpeech => f.write_str("no speech detected"),
            CaptureErrorKind::Other(detail) => write!(f, "speech capture failed: {detail}"),
        }
    }
}

/// Result of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Utterance(String),
    Error(CaptureErrorKind),
    /// Stopped before anything was heard.
    Cancelled,
}

impl CaptureEvent {
    /// Utterance event, or `NoSpeech` when the text is blank.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            CaptureEvent::Error(CaptureErrorKind::NoSpeech)
        } else {
            CaptureEvent::Utterance(text.to_string())
        }
    }
}

pub type CaptureSender = mpsc::UnboundedSender<CaptureEvent>;

/// A speech facility producing one event per capture.
pub trait SpeechCapture: Send {
    /// Begin listening. Exactly one event is sent per started capture.
    ///
    /// # Errors
    ///
    /// Returns `Capture` if a capture is already running.
    fn start(&mut self, events: CaptureSender) -> Result<()>;

    /// Stop listening. A running capture reports `Cancelled`.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Short name for status output.
    fn name(&self) -> &str;
}
