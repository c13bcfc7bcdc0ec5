//! Typed-text fallback for terminals without a speech recognizer.
//!
//! The front end owns stdin; while a capture is active it hands the next
//! typed line to [`TextEntryCapture::feed`].

use crate::error::{AdvisorError, Result};
use crate::transcript::{CaptureEvent, CaptureSender, SpeechCapture};

#[derive(Debug, Default)]
pub struct TextEntryCapture {
    pending: Option<CaptureSender>,
}

impl TextEntryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a typed line to the running capture.
    ///
    /// Returns `false` when no capture is waiting for input.
    pub fn feed(&mut self, line: &str) -> bool {
        match self.pending.take() {
            Some(events) => {
                if events.send(CaptureEvent::from_text(line)).is_err() {
                    // Session went away mid-capture
                }
                true
            }
            None => false,
        }
    }
}

impl SpeechCapture for TextEntryCapture {
    fn start(&mut self, events: CaptureSender) -> Result<()> {
        if self.pending.is_some() {
            return Err(AdvisorError::Capture {
                message: "already waiting for typed input".to_string(),
            });
        }
        self.pending = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(events) = self.pending.take()
            && events.send(CaptureEvent::Cancelled).is_err()
        {
            // Session went away mid-capture
        }
    }

    fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    fn name(&self) -> &str {
        "text entry"
    }
}
