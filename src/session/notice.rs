//! Session activity notices for renderers and log followers.

use crate::session::state::{Effect, Event, Outcome, SessionState, Step, VideoState};
use crate::transcript::CaptureErrorKind;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    Transition {
        from: String,
        to: String,
        cycle: Option<u64>,
    },
    DiagnosisRequested {
        cycle: u64,
        query: String,
        persona: String,
    },
    DiagnosisReady {
        cycle: u64,
        causes: usize,
        confidence: f64,
        pages: Vec<u32>,
    },
    DiagnosisFailed {
        cycle: u64,
        kind: String,
        message: String,
    },
    VideoRequested {
        cycle: u64,
    },
    VideoReady {
        cycle: u64,
        slides: usize,
    },
    VideoFailed {
        cycle: u64,
        kind: String,
        message: String,
    },
    Rejected {
        event: String,
        reason: String,
    },
    /// A completion that arrived for a superseded cycle.
    Discarded {
        event: String,
        cycle: Option<u64>,
    },
    CaptureFailed {
        reason: CaptureErrorKind,
        message: String,
    },
}

impl SessionNotice {
    /// Lowest `-v` count at which the notice is shown.
    ///
    /// Rejections are reported to the caller through the returned outcome,
    /// so the notice only matters to log followers.
    pub fn min_verbosity(&self) -> u8 {
        match self {
            SessionNotice::Discarded { .. } => 2,
            SessionNotice::Transition { .. }
            | SessionNotice::Rejected { .. }
            | SessionNotice::DiagnosisRequested { .. }
            | SessionNotice::VideoRequested { .. }
            | SessionNotice::DiagnosisReady { .. } => 1,
            _ => 0,
        }
    }
}

/// Describe what one applied event did.
pub fn describe(before: &SessionState, event: &Event, step: &Step) -> Vec<SessionNotice> {
    let mut notices = Vec::new();
    match step.outcome {
        Outcome::Rejected(reason) => {
            notices.push(SessionNotice::Rejected {
                event: event.name().to_string(),
                reason: reason.to_string(),
            });
            return notices;
        }
        Outcome::Discarded => {
            let cycle = match event {
                Event::DiagnosisCompleted { cycle, .. } | Event::VideoCompleted { cycle, .. } => {
                    Some(cycle.0)
                }
                _ => None,
            };
            notices.push(SessionNotice::Discarded {
                event: event.name().to_string(),
                cycle,
            });
            return notices;
        }
        Outcome::Applied => {}
    }

    let after = step.session.state();
    if before.name() != after.name() {
        notices.push(SessionNotice::Transition {
            from: before.name().to_string(),
            to: after.name().to_string(),
            cycle: after.cycle().map(|c| c.0),
        });
    }

    if let Event::CaptureFailed(kind) = event {
        notices.push(SessionNotice::CaptureFailed {
            reason: kind.clone(),
            message: kind.to_string(),
        });
    }

    match (event, after) {
        (Event::DiagnosisCompleted { .. }, SessionState::Ready { cycle, result, .. }) => {
            notices.push(SessionNotice::DiagnosisReady {
                cycle: cycle.0,
                causes: result.probable_causes.len(),
                confidence: result.confidence,
                pages: result.referenced_pages.clone(),
            });
        }
        (Event::DiagnosisCompleted { .. }, SessionState::Failed { cycle, reason, .. }) => {
            notices.push(SessionNotice::DiagnosisFailed {
                cycle: cycle.0,
                kind: reason.kind().to_string(),
                message: reason.user_message().to_string(),
            });
        }
        (Event::VideoCompleted { .. }, SessionState::Ready { cycle, video, .. }) => match video {
            VideoState::Ready(asset) => notices.push(SessionNotice::VideoReady {
                cycle: cycle.0,
                slides: asset.slides.len(),
            }),
            VideoState::Failed(reason) => notices.push(SessionNotice::VideoFailed {
                cycle: cycle.0,
                kind: reason.kind().to_string(),
                message: reason.to_string(),
            }),
            VideoState::Pending | VideoState::Skipped => {}
        },
        _ => {}
    }

    for effect in &step.effects {
        notices.push(match effect {
            Effect::RequestDiagnosis { cycle, query } => SessionNotice::DiagnosisRequested {
                cycle: cycle.0,
                query: query.text().to_string(),
                persona: query.persona().to_string(),
            },
            Effect::RequestVideo { cycle, .. } => SessionNotice::VideoRequested { cycle: cycle.0 },
        });
    }

    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::error::RequestError;
    use crate::service::mock::sample_diagnosis;
    use crate::service::types::{Persona, Query};
    use crate::session::state::{CycleId, Session};

    #[test]
    fn test_submit_describes_transition_and_request() {
        let session = Session::default();
        let event = Event::Submit(Query::new("paper jam", Persona::Technical).unwrap());
        let before = session.state().clone();
        let step = session.apply(event.clone());
        let notices = describe(&before, &event, &step);
        assert_eq!(
            notices,
            vec![
                SessionNotice::Transition {
                    from: "idle".to_string(),
                    to: "diagnosing".to_string(),
                    cycle: Some(1),
                },
                SessionNotice::DiagnosisRequested {
                    cycle: 1,
                    query: "paper jam".to_string(),
                    persona: "Technical".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_diagnosis_ready_notice() {
        let session = Session::default()
            .apply(Event::Utterance("a".to_string()))
            .session;
        let before = session.state().clone();
        let event = Event::DiagnosisCompleted {
            cycle: CycleId(1),
            result: Ok(sample_diagnosis(&[12, 13])),
        };
        let step = session.apply(event.clone());
        let notices = describe(&before, &event, &step);
        assert!(notices.contains(&SessionNotice::DiagnosisReady {
            cycle: 1,
            causes: 1,
            confidence: 0.85,
            pages: vec![12, 13],
        }));
        assert!(notices.contains(&SessionNotice::VideoRequested { cycle: 1 }));
    }

    #[test]
    fn test_discarded_notice_carries_cycle() {
        let session = Session::default();
        let event = Event::DiagnosisCompleted {
            cycle: CycleId(7),
            result: Err(RequestError::ServiceBusy { status: None }),
        };
        let before = session.state().clone();
        let step = session.apply(event.clone());
        let notices = describe(&before, &event, &step);
        assert_eq!(
            notices,
            vec![SessionNotice::Discarded {
                event: "diagnosis_completed".to_string(),
                cycle: Some(7),
            }]
        );
        assert_eq!(notices[0].min_verbosity(), 2);
    }

    #[test]
    fn test_notice_serializes_with_type_tag() {
        let notice = SessionNotice::VideoReady { cycle: 2, slides: 3 };
        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(json, r#"{"type":"video_ready","cycle":2,"slides":3}"#);
    }

    #[test]
    fn test_capture_failure_notice_carries_kind() {
        let capturing = Session::default().apply(Event::CaptureStarted).session;
        let before = capturing.state().clone();
        let event = Event::CaptureFailed(CaptureErrorKind::Other("mic unplugged".to_string()));
        let step = capturing.apply(event.clone());
        let notices = describe(&before, &event, &step);

        let failure = notices
            .iter()
            .find(|n| matches!(n, SessionNotice::CaptureFailed { .. }))
            .unwrap();
        let json = serde_json::to_string(failure).unwrap();
        assert_eq!(
            json,
            r#"{"type":"capture_failed","reason":{"kind":"other","detail":"mic unplugged"},"message":"speech capture failed: mic unplugged"}"#
        );
        assert_eq!(failure.min_verbosity(), 0);
    }
}
