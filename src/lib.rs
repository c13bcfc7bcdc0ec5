//! advisor - Manual-backed device troubleshooting
//!
//! Turns a spoken or typed problem description into a diagnosis from the
//! device manual, then plays a narrated slide video explaining the fix.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod playback;
pub mod service;
pub mod session;
pub mod transcript;

#[cfg(feature = "cli")]
pub mod cli;

// Composition root
#[cfg(feature = "cli")]
pub mod app;

// Core seams
pub use playback::narration::{Clock, NarrationOutput};
pub use service::client::AdvisorService;
pub use transcript::SpeechCapture;

// Session
pub use session::orchestrator::{SessionDriver, SessionHandle};
pub use session::state::{Event, Outcome, Session, SessionState, VideoState};

// Service types
pub use service::client::HttpAdvisorClient;
pub use service::types::{DiagnosisResult, Persona, Query, Slide, VideoAsset};

// Playback
pub use playback::{Player, Timeline};

// Error handling
pub use error::{AdvisorError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
