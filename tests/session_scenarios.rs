//! End-to-end session behavior through the real driver and the scripted service.

use advisor::playback::Player;
use advisor::service::error::RequestError;
use advisor::service::mock::{MockService, sample_diagnosis, sample_video};
use advisor::session::notice::SessionNotice;
use advisor::session::state::{CycleId, RejectReason};
use advisor::transcript::{CaptureErrorKind, CaptureEvent, MockCapture};
use advisor::{
    Outcome, Persona, Query, Session, SessionDriver, SessionState, SpeechCapture, VideoState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn is_settled(session: &Session) -> bool {
    match session.state() {
        SessionState::Ready { video, .. } => video.is_settled(),
        SessionState::Failed { .. } => true,
        _ => false,
    }
}

#[tokio::test(start_paused = true)]
async fn ink_question_plays_three_slides() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Ok(sample_diagnosis(&[12])))
            .with_video(Ok(sample_video(&[0.0, 5.0, 15.0], 20.0))),
    );
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default()).spawn();

    let query = Query::new("インクが出ない", Persona::Technical).unwrap();
    assert_eq!(handle.submit(query).await.unwrap(), Outcome::Applied);
    let session = handle.wait_for(is_settled).await.unwrap();

    assert_eq!(session.state().result().unwrap().referenced_pages, vec![12]);
    let asset = session.state().video_asset().unwrap();
    assert_eq!(asset.slides.len(), 3);

    let player = Player::new(asset).unwrap();
    let timeline = player.timeline();
    assert_eq!(timeline.position().total_seconds, 20.0);
    assert_eq!(timeline.slide_at(0.0).caption, "Slide 1");
    assert_eq!(timeline.slide_at(7.0).caption, "Slide 2");
    assert_eq!(timeline.slide_at(20.0).caption, "Slide 3");

    let calls = service.video_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text(), "インクが出ない");
    assert_eq!(calls[0].persona(), Persona::Technical);
}

#[tokio::test(start_paused = true)]
async fn gateway_timeout_fails_without_video() {
    let service = Arc::new(
        MockService::new().with_diagnosis(Err(RequestError::ServiceBusy { status: Some(504) })),
    );
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default()).spawn();

    handle.submit_text("paper jam").await.unwrap();
    let session = handle.wait_for(is_settled).await.unwrap();

    match session.state() {
        SessionState::Failed { reason, query, .. } => {
            assert!(matches!(reason, RequestError::ServiceBusy { .. }));
            assert_eq!(query.text(), "paper jam");
        }
        other => panic!("Expected Failed, got {other:?}"),
    }
    assert!(service.video_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn video_failure_keeps_diagnosis() {
    let diagnosis = sample_diagnosis(&[3, 4]);
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Ok(diagnosis.clone()))
            .with_video(Err(RequestError::RequestFailed {
                status: Some(500),
                detail: "tts quota exceeded".to_string(),
            })),
    );
    let (handle, _task) = SessionDriver::new(service, Session::default()).spawn();

    handle.submit_text("faint colors").await.unwrap();
    let session = handle.wait_for(is_settled).await.unwrap();

    match session.state() {
        SessionState::Ready { result, video, .. } => {
            assert_eq!(**result, diagnosis);
            assert!(matches!(
                video,
                VideoState::Failed(RequestError::RequestFailed { .. })
            ));
        }
        other => panic!("Expected Ready, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn late_video_from_reset_cycle_is_discarded() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Ok(sample_diagnosis(&[1])))
            .with_video_after(Duration::from_secs(30), Ok(sample_video(&[0.0, 2.0], 4.0)))
            .with_diagnosis(Ok(sample_diagnosis(&[9])))
            .with_video_after(
                Duration::from_secs(5),
                Ok(sample_video(&[0.0, 1.0, 2.0, 3.0], 8.0)),
            ),
    );
    let (notice_tx, notices) = crossbeam_channel::unbounded();
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default())
        .with_notices(notice_tx)
        .spawn();

    handle.submit_text("first").await.unwrap();
    handle
        .wait_for(|s| matches!(s.state().video(), Some(VideoState::Pending)))
        .await
        .unwrap();
    assert_eq!(handle.reset().await.unwrap(), Outcome::Applied);
    assert_eq!(handle.submit_text("second").await.unwrap(), Outcome::Applied);

    let session = handle.wait_for(is_settled).await.unwrap();
    assert_eq!(session.state().cycle(), Some(CycleId(2)));
    assert_eq!(session.state().video_asset().unwrap().slides.len(), 4);

    // Let the first cycle's video arrive.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let after = handle.snapshot();
    assert_eq!(after.state().cycle(), Some(CycleId(2)));
    assert_eq!(after.state().query().unwrap().text(), "second");
    assert_eq!(after.state().video_asset().unwrap().slides.len(), 4);

    assert!(notices.try_iter().any(|n| n
        == SessionNotice::Discarded {
            event: "video_completed".to_string(),
            cycle: Some(1),
        }));
    assert_eq!(service.video_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_duplicate_requests_while_busy() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis_after(Duration::from_secs(10), Ok(sample_diagnosis(&[12])))
            .with_video_after(Duration::from_secs(10), Ok(sample_video(&[0.0], 3.0))),
    );
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default()).spawn();

    handle.submit_text("no power").await.unwrap();
    assert_eq!(
        handle.submit_text("no power").await.unwrap(),
        Outcome::Rejected(RejectReason::Busy)
    );

    handle
        .wait_for(|s| matches!(s.state().video(), Some(VideoState::Pending)))
        .await
        .unwrap();
    assert_eq!(
        handle.submit_text("no power").await.unwrap(),
        Outcome::Rejected(RejectReason::Busy)
    );

    handle.wait_for(is_settled).await.unwrap();
    assert_eq!(service.diagnose_calls().len(), 1);
    assert_eq!(service.video_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn video_follows_only_successful_diagnosis() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Err(RequestError::RequestFailed {
                status: None,
                detail: "connection refused".to_string(),
            }))
            .with_diagnosis(Ok(sample_diagnosis(&[5])))
            .with_video(Ok(sample_video(&[0.0, 4.0], 6.0))),
    );
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default()).spawn();

    handle.submit_text("wifi drops").await.unwrap();
    handle
        .wait_for(|s| matches!(s.state(), SessionState::Failed { .. }))
        .await
        .unwrap();
    assert!(service.video_calls().is_empty());

    assert_eq!(handle.retry().await.unwrap(), Outcome::Applied);
    let session = handle.wait_for(is_settled).await.unwrap();
    assert!(matches!(session.state().video(), Some(VideoState::Ready(_))));

    let diagnose_calls = service.diagnose_calls();
    assert_eq!(diagnose_calls.len(), 2);
    assert_eq!(diagnose_calls[1].text(), "wifi drops");
    assert_eq!(service.video_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_video_is_skipped() {
    let service = Arc::new(MockService::new().with_diagnosis(Ok(sample_diagnosis(&[2]))));
    let (handle, _task) =
        SessionDriver::new(Arc::clone(&service), Session::new(Persona::Presenter, false)).spawn();

    handle.submit_text("scanner lines").await.unwrap();
    let session = handle.wait_for(is_settled).await.unwrap();

    assert_eq!(session.state().video(), Some(&VideoState::Skipped));
    assert!(service.video_calls().is_empty());
    assert_eq!(service.diagnose_calls()[0].persona(), Persona::Presenter);
}

#[tokio::test(start_paused = true)]
async fn spoken_question_starts_one_diagnosis() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis_after(Duration::from_secs(5), Ok(sample_diagnosis(&[12])))
            .with_video(Ok(sample_video(&[0.0, 5.0], 10.0))),
    );
    let (handle, _task) =
        SessionDriver::new(Arc::clone(&service), Session::new(Persona::Presenter, true)).spawn();
    let mut capture = MockCapture::new().with_utterance("インクが出ない");
    let (events_tx, mut events) = mpsc::unbounded_channel();

    assert_eq!(handle.start_capture().await.unwrap(), Outcome::Applied);
    assert!(matches!(
        handle.snapshot().state(),
        SessionState::Capturing { .. }
    ));
    capture.start(events_tx).unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(handle.capture_event(event).await.unwrap(), Outcome::Applied);

    match handle.snapshot().state() {
        SessionState::Diagnosing { cycle, query } => {
            assert_eq!(*cycle, CycleId(1));
            assert_eq!(query.text(), "インクが出ない");
            assert_eq!(query.persona(), Persona::Presenter);
        }
        other => panic!("Expected Diagnosing, got {other:?}"),
    }

    handle.wait_for(is_settled).await.unwrap();
    assert_eq!(capture.start_count(), 1);
    assert_eq!(service.diagnose_calls().len(), 1);
    assert_eq!(service.video_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_capture_keeps_previous_answer() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Ok(sample_diagnosis(&[12])))
            .with_video(Ok(sample_video(&[0.0], 3.0))),
    );
    let (notice_tx, notices) = crossbeam_channel::unbounded();
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default())
        .with_notices(notice_tx)
        .spawn();

    handle.submit_text("paper jam").await.unwrap();
    let answered = handle.wait_for(is_settled).await.unwrap();

    // Blank transcript, then a recognizer that heard nothing.
    let mut capture = MockCapture::new()
        .with_utterance("   ")
        .with_error(CaptureErrorKind::NoSpeech);
    let (events_tx, mut events) = mpsc::unbounded_channel();
    for _ in 0..2 {
        assert_eq!(handle.start_capture().await.unwrap(), Outcome::Applied);
        capture.start(events_tx.clone()).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(handle.capture_event(event).await.unwrap(), Outcome::Applied);
        assert_eq!(handle.snapshot().state(), answered.state());
    }

    assert_eq!(handle.snapshot().state().cycle(), Some(CycleId(1)));
    assert_eq!(service.diagnose_calls().len(), 1);
    assert_eq!(service.video_calls().len(), 1);
    let no_speech = notices
        .try_iter()
        .filter(|n| {
            matches!(
                n,
                SessionNotice::CaptureFailed {
                    reason: CaptureErrorKind::NoSpeech,
                    ..
                }
            )
        })
        .count();
    assert_eq!(no_speech, 2);
}

#[tokio::test(start_paused = true)]
async fn silent_capture_keeps_failure_retryable() {
    let service = Arc::new(
        MockService::new()
            .with_diagnosis(Err(RequestError::ServiceBusy { status: Some(504) }))
            .with_diagnosis(Ok(sample_diagnosis(&[7])))
            .with_video(Ok(sample_video(&[0.0], 2.0))),
    );
    let (handle, _task) = SessionDriver::new(Arc::clone(&service), Session::default()).spawn();

    handle.submit_text("scanner lines").await.unwrap();
    let failed = handle.wait_for(is_settled).await.unwrap();
    assert!(matches!(failed.state(), SessionState::Failed { .. }));

    assert_eq!(handle.start_capture().await.unwrap(), Outcome::Applied);
    assert_eq!(
        handle
            .capture_event(CaptureEvent::from_text("  "))
            .await
            .unwrap(),
        Outcome::Applied
    );
    assert_eq!(handle.snapshot().state(), failed.state());
    assert_eq!(service.diagnose_calls().len(), 1);

    assert_eq!(handle.retry().await.unwrap(), Outcome::Applied);
    let session = handle.wait_for(is_settled).await.unwrap();
    assert!(matches!(session.state(), SessionState::Ready { .. }));
    assert_eq!(service.diagnose_calls()[1].text(), "scanner lines");
}
