//! External speech-to-text command as a transcript source.
//!
//! Runs the configured recognizer once per capture (for example
//! `listen --once`) and takes its stdout as the utterance.

use crate::error::{AdvisorError, Result};
use crate::transcript::{CaptureErrorKind, CaptureEvent, CaptureSender, SpeechCapture};
use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinHandle;

pub struct CommandCapture {
    program: String,
    args: Vec<String>,
    running: Option<(JoinHandle<()>, CaptureSender)>,
}

impl CommandCapture {
    /// Build from a whitespace-separated command line.
    ///
    /// # Errors
    ///
    /// Returns `Capture` for an empty command line.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| AdvisorError::Capture {
            message: "capture command is empty".to_string(),
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
            running: None,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

async fn run_recognizer(program: String, args: Vec<String>) -> CaptureEvent {
    let output = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            CaptureEvent::from_text(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            CaptureEvent::Error(CaptureErrorKind::Other(format!(
                "{program} failed with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            CaptureEvent::Error(CaptureErrorKind::NotAllowed)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CaptureEvent::Error(CaptureErrorKind::Other(format!("{program} not found")))
        }
        Err(e) => CaptureEvent::Error(CaptureErrorKind::Other(format!(
            "failed to execute {program}: {e}"
        ))),
    }
}

impl SpeechCapture for CommandCapture {
    fn start(&mut self, events: CaptureSender) -> Result<()> {
        if self.is_active() {
            return Err(AdvisorError::Capture {
                message: format!("{} is already listening", self.program),
            });
        }
        let program = self.program.clone();
        let args = self.args.clone();
        let tx = events.clone();
        let task = tokio::spawn(async move {
            let event = run_recognizer(program, args).await;
            if tx.send(event).is_err() {
                // Nobody is waiting for this capture anymore
            }
        });
        self.running = Some((task, events));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((task, events)) = self.running.take()
            && !task.is_finished()
        {
            task.abort();
            if events.send(CaptureEvent::Cancelled).is_err() {
                // Receiver gone, nothing to report to
            }
        }
    }

    fn is_active(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(task, _)| !task.is_finished())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

impl Drop for CommandCapture {
    fn drop(&mut self) {
        if let Some((task, _)) = self.running.take() {
            task.abort();
        }
    }
}
