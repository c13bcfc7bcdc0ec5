//! Scripted service for tests and offline demos.

use crate::service::client::AdvisorService;
use crate::service::error::{DiagnosisError, RequestError, VideoError};
use crate::service::types::{DiagnosisResult, Query, Slide, VideoAsset};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

struct Scripted<T> {
    result: Result<T, RequestError>,
    delay: Duration,
}

/// Service double answering from per-endpoint queues.
///
/// Every call pops the next scripted response, sleeps for its delay and
/// records the query it was given. An exhausted queue answers with
/// `RequestFailed`.
#[derive(Default)]
pub struct MockService {
    diagnoses: Mutex<VecDeque<Scripted<DiagnosisResult>>>,
    videos: Mutex<VecDeque<Scripted<VideoAsset>>>,
    diagnose_calls: Mutex<Vec<Query>>,
    video_calls: Mutex<Vec<Query>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an immediate diagnosis response.
    pub fn with_diagnosis(self, result: Result<DiagnosisResult, DiagnosisError>) -> Self {
        self.with_diagnosis_after(Duration::ZERO, result)
    }

    /// Queue a diagnosis response delivered after `delay`.
    pub fn with_diagnosis_after(
        self,
        delay: Duration,
        result: Result<DiagnosisResult, DiagnosisError>,
    ) -> Self {
        push(&self.diagnoses, Scripted { result, delay });
        self
    }

    /// Queue an immediate video response.
    pub fn with_video(self, result: Result<VideoAsset, VideoError>) -> Self {
        self.with_video_after(Duration::ZERO, result)
    }

    /// Queue a video response delivered after `delay`.
    pub fn with_video_after(self, delay: Duration, result: Result<VideoAsset, VideoError>) -> Self {
        push(&self.videos, Scripted { result, delay });
        self
    }

    pub fn diagnose_calls(&self) -> Vec<Query> {
        snapshot(&self.diagnose_calls)
    }

    pub fn video_calls(&self) -> Vec<Query> {
        snapshot(&self.video_calls)
    }
}

fn push<T>(queue: &Mutex<VecDeque<T>>, item: T) {
    match queue.lock() {
        Ok(mut q) => q.push_back(item),
        Err(poisoned) => poisoned.into_inner().push_back(item),
    }
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    match queue.lock() {
        Ok(mut q) => q.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

fn snapshot<T: Clone>(calls: &Mutex<Vec<T>>) -> Vec<T> {
    match calls.lock() {
        Ok(c) => c.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn record(calls: &Mutex<Vec<Query>>, query: &Query) {
    match calls.lock() {
        Ok(mut c) => c.push(query.clone()),
        Err(poisoned) => poisoned.into_inner().push(query.clone()),
    }
}

async fn answer<T>(scripted: Option<Scripted<T>>, endpoint: &str) -> Result<T, RequestError> {
    match scripted {
        Some(Scripted { result, delay }) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
        None => Err(RequestError::RequestFailed {
            status: None,
            detail: format!("no scripted {endpoint} response"),
        }),
    }
}

#[async_trait]
impl AdvisorService for MockService {
    async fn diagnose(&self, query: &Query) -> Result<DiagnosisResult, DiagnosisError> {
        record(&self.diagnose_calls, query);
        answer(pop(&self.diagnoses), "diagnosis").await
    }

    async fn generate_video(&self, query: &Query) -> Result<VideoAsset, VideoError> {
        record(&self.video_calls, query);
        answer(pop(&self.videos), "video").await
    }
}

/// Diagnosis with one cause and the given referenced pages.
pub fn sample_diagnosis(referenced_pages: &[u32]) -> DiagnosisResult {
    DiagnosisResult {
        probable_causes: vec!["Print head nozzles are clogged".to_string()],
        confidence: 0.85,
        steps: vec![
            "Run a nozzle check from the printer menu".to_string(),
            "Run print head cleaning".to_string(),
        ],
        cautions: vec!["Do not open the cover while cleaning".to_string()],
        referenced_pages: referenced_pages.to_vec(),
        disclaimer: "Based on the uploaded manual.".to_string(),
        visual_page: None,
        source_file: Some("TS6330.pdf".to_string()),
        request_id: None,
        next_actions: None,
        video_status: None,
    }
}

/// Video whose slides start at `offsets`, with a duration hint.
pub fn sample_video(offsets: &[f64], duration_seconds: f64) -> VideoAsset {
    VideoAsset {
        script: "Let's fix the ink problem.".to_string(),
        narration: vec![0u8; 64],
        slides: offsets
            .iter()
            .enumerate()
            .map(|(i, offset)| Slide::caption("step", &format!("Slide {}", i + 1), *offset))
            .collect(),
        duration_hint: Some(duration_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::types::Persona;

    #[tokio::test]
    async fn test_mock_answers_in_order_and_records_queries() {
        let service = MockService::new()
            .with_diagnosis(Ok(sample_diagnosis(&[12])))
            .with_diagnosis(Err(RequestError::ServiceBusy { status: Some(504) }));
        let query = Query::new("インクが出ない", Persona::Technical).unwrap();

        let first = service.diagnose(&query).await.unwrap();
        assert_eq!(first.referenced_pages, vec![12]);
        let second = service.diagnose(&query).await.unwrap_err();
        assert_eq!(second, RequestError::ServiceBusy { status: Some(504) });

        assert_eq!(service.diagnose_calls().len(), 2);
        assert!(service.video_calls().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_queue_fails() {
        let service = MockService::new();
        let query = Query::new("paper jam", Persona::Instructor).unwrap();
        let err = service.generate_video(&query).await.unwrap_err();
        assert_eq!(err.kind(), "request_failed");
        assert_eq!(service.video_calls(), vec![query]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_honoured() {
        let service = MockService::new().with_video_after(
            Duration::from_secs(30),
            Ok(sample_video(&[0.0, 5.0], 10.0)),
        );
        let query = Query::new("paper jam", Persona::Presenter).unwrap();
        let start = tokio::time::Instant::now();
        let video = service.generate_video(&query).await.unwrap();
        assert_eq!(video.slides.len(), 2);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
