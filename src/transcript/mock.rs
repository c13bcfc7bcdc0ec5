//! Scripted transcript source for tests.

use crate::error::{AdvisorError, Result};
use crate::transcript::{CaptureErrorKind, CaptureEvent, CaptureSender, SpeechCapture};
use std::collections::VecDeque;

/// Answers each `start` with the next scripted event.
///
/// With `hold()` queued, the capture stays active until `stop()`.
#[derive(Debug, Default)]
pub struct MockCapture {
    script: VecDeque<Option<CaptureEvent>>,
    active: Option<CaptureSender>,
    starts: usize,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utterance(mut self, text: &str) -> Self {
        self.script
            .push_back(Some(CaptureEvent::Utterance(text.to_string())));
        self
    }

    pub fn with_error(mut self, kind: CaptureErrorKind) -> Self {
        self.script.push_back(Some(CaptureEvent::Error(kind)));
        self
    }

    /// Next capture produces nothing until stopped.
    pub fn hold(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    pub fn start_count(&self) -> usize {
        self.starts
    }
}

impl SpeechCapture for MockCapture {
    fn start(&mut self, events: CaptureSender) -> Result<()> {
        if self.active.is_some() {
            return Err(AdvisorError::Capture {
                message: "mock capture already active".to_string(),
            });
        }
        self.starts += 1;
        match self.script.pop_front() {
            Some(Some(event)) => {
                if events.send(event).is_err() {
                    // Test dropped the receiver
                }
            }
            Some(None) => self.active = Some(events),
            None => {
                if events
                    .send(CaptureEvent::Error(CaptureErrorKind::Other(
                        "no scripted capture".to_string(),
                    )))
                    .is_err()
                {
                    // Test dropped the receiver
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(events) = self.active.take()
            && events.send(CaptureEvent::Cancelled).is_err()
        {
            // Test dropped the receiver
        }
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
