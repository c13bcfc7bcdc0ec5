//! Default configuration constants for advisor.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default base URL of the diagnosis service.
pub const BASE_URL: &str = "http://localhost:8000";

/// Default device model sent with every diagnosis request.
///
/// The service indexes one manual per device; this is the model its
/// bundled manual covers.
pub const DEVICE: &str = "TS6330";

/// Seconds jumped back by the rewind control.
pub const REWIND_SECONDS: f64 = 10.0;

/// Player tick interval in milliseconds.
///
/// The narration clock is sampled this often while playing, which keeps the
/// displayed slide at most one tick behind the audio.
pub const TICK_MS: u64 = 250;

/// Manual registry status poll interval in seconds.
pub const STATUS_POLL_SECS: u64 = 5;

/// Slide caption shown when the service sends an empty one.
pub const FALLBACK_CAPTION: &str = "Explanation";

/// Service endpoint paths.
pub const DIAGNOSE_PATH: &str = "/api/diagnose";
pub const GENERATE_VIDEO_PATH: &str = "/api/generate_video";
pub const GENERATE_SCRIPT_PATH: &str = "/api/generate_script";
pub const STATUS_PATH: &str = "/api/status";
pub const UPLOAD_PATH: &str = "/api/upload";
pub const INGEST_PATH: &str = "/api/ingest";
pub const FEEDBACK_PATH: &str = "/api/feedback";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_are_absolute() {
        for path in [
            DIAGNOSE_PATH,
            GENERATE_VIDEO_PATH,
            GENERATE_SCRIPT_PATH,
            STATUS_PATH,
            UPLOAD_PATH,
            INGEST_PATH,
            FEEDBACK_PATH,
        ] {
            assert!(path.starts_with("/api/"), "bad path: {path}");
        }
    }

    #[test]
    fn base_url_is_http() {
        assert!(BASE_URL.starts_with("http://") || BASE_URL.starts_with("https://"));
    }
}
