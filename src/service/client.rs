//! HTTP client for the diagnosis service.
//!
//! Diagnosis and video calls go through [`AdvisorService`] so the session
//! driver can run against a mock. The peripheral endpoints (status, upload,
//! ingest, script, feedback) are inherent methods used only by the CLI.

use crate::defaults;
use crate::error::{AdvisorError, Result};
use crate::service::error::{DiagnosisError, RequestError, ResponseClass, VideoError};
use crate::service::types::{
    DiagnosisResult, ManualRegistryStatus, Query, ServiceAck, UploadReceipt, VideoAsset,
};
use crate::service::wire;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::sync::Arc;

/// The two request pipelines of a diagnostic cycle.
///
/// Each call issues exactly one outbound request and never retries.
#[async_trait]
pub trait AdvisorService: Send + Sync {
    async fn diagnose(&self, query: &Query) -> std::result::Result<DiagnosisResult, DiagnosisError>;

    async fn generate_video(&self, query: &Query) -> std::result::Result<VideoAsset, VideoError>;
}

#[async_trait]
impl<S: AdvisorService + ?Sized> AdvisorService for Arc<S> {
    async fn diagnose(&self, query: &Query) -> std::result::Result<DiagnosisResult, DiagnosisError> {
        (**self).diagnose(query).await
    }

    async fn generate_video(&self, query: &Query) -> std::result::Result<VideoAsset, VideoError> {
        (**self).generate_video(query).await
    }
}

/// reqwest-backed client for one service deployment.
#[derive(Debug, Clone)]
pub struct HttpAdvisorClient {
    http: reqwest::Client,
    base_url: String,
    device: String,
}

impl HttpAdvisorClient {
    /// Create a client for `base_url`, sending `device` with each diagnosis.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalidValue` if the URL is not http(s).
    pub fn new(base_url: &str, device: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AdvisorError::ConfigInvalidValue {
                key: "service.base_url".to_string(),
                message: format!("'{base_url}' is not an http(s) URL"),
            });
        }
        let device = if device.trim().is_empty() {
            defaults::DEVICE
        } else {
            device.trim()
        };
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            device: device.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn query_form(query: &Query) -> Form {
        Form::new()
            .text("query", query.text().to_string())
            .text("persona", query.persona().wire_name())
    }

    /// Send a form post and return the body of a successful response.
    async fn post_classified(
        &self,
        path: &str,
        form: Form,
    ) -> std::result::Result<String, RequestError> {
        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        classified_body(response).await
    }

    /// Fetch the manual registry status.
    pub async fn status(&self) -> Result<ManualRegistryStatus> {
        let response = self
            .http
            .get(self.url(defaults::STATUS_PATH))
            .send()
            .await
            .map_err(|e| AdvisorError::Service {
                message: format!("Failed to reach {}: {e}", self.base_url),
            })?;
        let body = plain_body(response, "status").await?;
        serde_json::from_str(&body).map_err(|e| AdvisorError::Service {
            message: format!("Unexpected status response: {e}"),
        })
    }

    /// Upload a PDF manual.
    ///
    /// # Errors
    ///
    /// Returns `UploadRejected` for non-PDF files and for service-side
    /// failures, carrying the service's `detail` verbatim when present.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt> {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(AdvisorError::UploadRejected {
                message: format!("{} is not a PDF file", path.display()),
            });
        }
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("manual.pdf")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| AdvisorError::Other(format!("Invalid upload part: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.url(defaults::UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdvisorError::UploadRejected {
                message: format!("Failed to reach {}: {e}", self.base_url),
            })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AdvisorError::UploadRejected {
                message: wire::error_detail(&body).unwrap_or_else(|| status.to_string()),
            });
        }
        serde_json::from_str(&body).map_err(|e| AdvisorError::UploadRejected {
            message: format!("Unexpected upload response: {e}"),
        })
    }

    /// Ask the service to re-read its manuals.
    pub async fn ingest(&self) -> Result<ServiceAck> {
        let response = self
            .http
            .post(self.url(defaults::INGEST_PATH))
            .send()
            .await
            .map_err(|e| AdvisorError::Service {
                message: format!("Failed to reach {}: {e}", self.base_url),
            })?;
        let body = plain_body(response, "ingest").await?;
        serde_json::from_str(&body).map_err(|e| AdvisorError::Service {
            message: format!("Unexpected ingest response: {e}"),
        })
    }

    /// Narration script only, without audio or slides.
    pub async fn generate_script(&self, query: &Query) -> std::result::Result<String, RequestError> {
        let body = self
            .post_classified(defaults::GENERATE_SCRIPT_PATH, Self::query_form(query))
            .await?;
        wire::decode_script(&body)
    }

    /// Report whether a diagnosis helped.
    pub async fn send_feedback(&self, result: &str, comment: Option<&str>) -> Result<ServiceAck> {
        let mut form = Form::new().text("result", result.to_string());
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            form = form.text("comment", comment.to_string());
        }
        let response = self
            .http
            .post(self.url(defaults::FEEDBACK_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AdvisorError::Service {
                message: format!("Failed to reach {}: {e}", self.base_url),
            })?;
        let body = plain_body(response, "feedback").await?;
        serde_json::from_str(&body).map_err(|e| AdvisorError::Service {
            message: format!("Unexpected feedback response: {e}"),
        })
    }
}

#[async_trait]
impl AdvisorService for HttpAdvisorClient {
    async fn diagnose(&self, query: &Query) -> std::result::Result<DiagnosisResult, DiagnosisError> {
        let form = Self::query_form(query).text("device", self.device.clone());
        let body = self.post_classified(defaults::DIAGNOSE_PATH, form).await?;
        wire::decode_diagnosis(&body)
    }

    async fn generate_video(&self, query: &Query) -> std::result::Result<VideoAsset, VideoError> {
        let body = self
            .post_classified(defaults::GENERATE_VIDEO_PATH, Self::query_form(query))
            .await?;
        wire::decode_video(&body)
    }
}

fn transport_error(e: reqwest::Error) -> RequestError {
    if e.is_timeout() {
        RequestError::ServiceBusy { status: None }
    } else {
        RequestError::RequestFailed {
            status: None,
            detail: e.to_string(),
        }
    }
}

async fn classified_body(response: reqwest::Response) -> std::result::Result<String, RequestError> {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) if status.is_success() => return Err(transport_error(e)),
        Err(_) => String::new(),
    };
    let detail = wire::error_detail(&body).unwrap_or_else(|| status.to_string());
    match ResponseClass::error_for(status.as_u16(), &detail) {
        Some(err) => Err(err),
        None => Ok(body),
    }
}

async fn plain_body(response: reqwest::Response, what: &str) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| AdvisorError::Service {
        message: format!("Failed to read {what} response: {e}"),
    })?;
    if !status.is_success() {
        let detail = wire::error_detail(&body).unwrap_or_else(|| status.to_string());
        return Err(AdvisorError::Service {
            message: format!("{what} failed: {detail}"),
        });
    }
    Ok(body)
}
