//! Outcome classification for diagnosis and video requests.
//!
//! Failures are classified by what the response *means*, not by which status
//! code or transport error produced it. Proxies in front of the service
//! report an exhausted time budget with different codes, so every status in
//! the gateway-timeout family maps to [`RequestError::ServiceBusy`].

use thiserror::Error;

/// Classified failure of a diagnosis or video request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Service overloaded or the manual scan ran out of time. Retry shortly.
    #[error("service busy{}", status_suffix(.status))]
    ServiceBusy { status: Option<u16> },

    /// Any other failure: network, configuration, missing manual.
    #[error("request failed{}: {detail}", status_suffix(.status))]
    RequestFailed { status: Option<u16>, detail: String },

    /// The service answered successfully but broke the response contract.
    #[error("malformed response: {detail}")]
    MalformedResponse { detail: String },
}

/// Error of the diagnosis pipeline.
pub type DiagnosisError = RequestError;

/// Error of the video pipeline.
pub type VideoError = RequestError;

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl RequestError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        RequestError::MalformedResponse {
            detail: detail.into(),
        }
    }

    /// Message shown to the user when a diagnosis fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            RequestError::ServiceBusy { .. } => {
                "The service is busy or the manual is taking a long time to scan. \
                 Please wait a moment and try again."
            }
            RequestError::RequestFailed { .. } => {
                "Diagnosis failed. Check your internet connection, the service \
                 configuration, and that a manual has been uploaded."
            }
            RequestError::MalformedResponse { .. } => {
                "The service returned an unexpected answer. Please try again; \
                 if it keeps happening, check the service version."
            }
        }
    }

    /// Short tag for logs and state summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::ServiceBusy { .. } => "service_busy",
            RequestError::RequestFailed { .. } => "request_failed",
            RequestError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

/// Semantic category of an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Backend or an intermediary gave up because processing took too long
    /// or it is overloaded.
    GatewayTimeout,
    Failure,
}

impl ResponseClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => ResponseClass::Success,
            // 408 request timeout, 429 overloaded, 502/503/504 gateway family,
            // 522/524 and 598/599 are proxy-specific timeout codes.
            408 | 429 | 502 | 503 | 504 | 522 | 524 | 598 | 599 => ResponseClass::GatewayTimeout,
            _ => ResponseClass::Failure,
        }
    }

    /// Map a non-success status to its request error.
    ///
    /// Returns `None` for success statuses.
    pub fn error_for(status: u16, detail: &str) -> Option<RequestError> {
        match Self::of(status) {
            ResponseClass::Success => None,
            ResponseClass::GatewayTimeout => Some(RequestError::ServiceBusy {
                status: Some(status),
            }),
            ResponseClass::Failure => Some(RequestError::RequestFailed {
                status: Some(status),
                detail: detail.to_string(),
            }),
        }
    }
}
