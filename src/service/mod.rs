//! Diagnosis service: domain types, wire decoding, HTTP client and mock.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;
pub mod wire;

pub use client::{AdvisorService, HttpAdvisorClient};
pub use error::{DiagnosisError, RequestError, ResponseClass, VideoError};
pub use mock::MockService;
pub use types::{
    DiagnosisResult, ImagePayload, ManualRegistryStatus, Persona, Query, ServiceAck, Slide,
    SlideImage, UploadReceipt, VideoAsset,
};
