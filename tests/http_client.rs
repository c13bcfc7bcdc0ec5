//! HTTP client against a local wiremock server.

use advisor::service::error::RequestError;
use advisor::service::types::SlideImage;
use advisor::{AdvisorError, AdvisorService, HttpAdvisorClient, Persona, Query};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpAdvisorClient {
    HttpAdvisorClient::new(&server.uri(), "Canon TS6330").unwrap()
}

fn ink_query() -> Query {
    Query::new("インクが出ない", Persona::Technical).unwrap()
}

fn diagnosis_body() -> serde_json::Value {
    json!({
        "probable_causes": ["Ink tank is empty", "Print head is clogged"],
        "confidence": 0.82,
        "steps": ["Check the ink level", "Run a cleaning cycle"],
        "cautions": ["Turn the printer off before opening the cover"],
        "disclaimer": "Based on the uploaded manual.",
        "referenced_pages": [12],
        "source_file": "TS6330.pdf",
        "request_id": "req-1"
    })
}

#[tokio::test]
async fn diagnose_decodes_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/diagnose"))
        .and(body_string_contains("Canon TS6330"))
        .and(body_string_contains("Technical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(diagnosis_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).await.diagnose(&ink_query()).await.unwrap();

    assert_eq!(result.probable_causes.len(), 2);
    assert_eq!(result.referenced_pages, vec![12]);
    assert_eq!(result.source_file.as_deref(), Some("TS6330.pdf"));
    assert!(result.visual_page.is_none());
}

#[tokio::test]
async fn gateway_statuses_mean_service_busy() {
    for status in [504u16, 502] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/diagnose"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream timed out"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .diagnose(&ink_query())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::ServiceBusy {
                status: Some(status)
            }
        );
    }
}

#[tokio::test]
async fn server_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/diagnose"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "No manual uploaded"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .diagnose(&ink_query())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RequestError::RequestFailed {
            status: Some(500),
            detail: "No manual uploaded".to_string(),
        }
    );
}

#[tokio::test]
async fn out_of_range_confidence_is_malformed() {
    let server = MockServer::start().await;
    let mut body = diagnosis_body();
    body["confidence"] = json!(1.7);
    Mock::given(method("POST"))
        .and(path("/api/diagnose"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .diagnose(&ink_query())
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::MalformedResponse { .. }));
}

#[tokio::test]
async fn video_decodes_slides_and_narration() {
    let server = MockServer::start().await;
    let audio = STANDARD.encode([1u8, 2, 3, 4]);
    let image = format!("data:image/png;base64,{}", STANDARD.encode([137u8, 80, 78, 71]));
    Mock::given(method("POST"))
        .and(path("/api/generate_video"))
        .and(body_string_contains("YouTuber"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "script": "Let's check the ink.",
            "audio_base64": audio,
            "slides": [
                {"type": "title", "text": "Ink problems", "start_offset_seconds": 0.0},
                {"type": "step", "text": "Open the cover", "image": image, "start_offset_seconds": 5.0},
                {"type": "step", "text": "Check the tank", "start_offset_seconds": 15.0}
            ],
            "duration_seconds": 20.0
        })))
        .mount(&server)
        .await;

    let query = Query::new("インクが出ない", Persona::Presenter).unwrap();
    let asset = client_for(&server)
        .await
        .generate_video(&query)
        .await
        .unwrap();

    assert_eq!(asset.narration, vec![1, 2, 3, 4]);
    assert_eq!(asset.duration_hint, Some(20.0));
    let offsets: Vec<f64> = asset.slides.iter().map(|s| s.start_offset_seconds).collect();
    assert_eq!(offsets, vec![0.0, 5.0, 15.0]);
    assert!(matches!(asset.slides[1].image, Some(SlideImage::Inline(_))));
}

#[tokio::test]
async fn video_without_slides_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate_video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "script": "",
            "audio_base64": STANDARD.encode([0u8; 8]),
            "slides": []
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .generate_video(&ink_query())
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::MalformedResponse { .. }));
}

#[tokio::test]
async fn status_reports_loaded_manuals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "manuals": ["TS6330.pdf"],
            "is_context_loaded": true,
            "context_length": 48213,
            "is_gemini_cached": true
        })))
        .mount(&server)
        .await;

    let status = client_for(&server).await.status().await.unwrap();
    assert_eq!(status.manuals, vec!["TS6330.pdf".to_string()]);
    assert!(status.is_context_loaded);
    assert_eq!(status.is_cached, Some(true));
}

#[tokio::test]
async fn upload_reports_service_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "PDF is encrypted"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manual = dir.path().join("manual.pdf");
    std::fs::write(&manual, b"%PDF-1.4\n").unwrap();

    match client_for(&server).await.upload(&manual).await {
        Err(AdvisorError::UploadRejected { message }) => assert_eq!(message, "PDF is encrypted"),
        other => panic!("Expected UploadRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_refuses_non_pdf_without_contacting_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"not a manual").unwrap();

    let err = client_for(&server).await.upload(&notes).await.unwrap_err();
    assert!(matches!(err, AdvisorError::UploadRejected { .. }));
}

#[tokio::test]
async fn feedback_sends_result_and_comment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/feedback"))
        .and(body_string_contains("resolved"))
        .and(body_string_contains("cleaning fixed it"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client_for(&server)
        .await
        .send_feedback("resolved", Some("cleaning fixed it"))
        .await
        .unwrap();
    assert_eq!(ack.status, "ok");
    assert!(ack.message.is_none());
}

#[tokio::test]
async fn script_endpoint_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate_script"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"script": "First, open the cover."})),
        )
        .mount(&server)
        .await;

    let script = client_for(&server)
        .await
        .generate_script(&ink_query())
        .await
        .unwrap();
    assert_eq!(script, "First, open the cover.");
}
