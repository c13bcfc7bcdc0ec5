//! Session state machine.
//!
//! All state changes go through [`Session::apply`], a pure function from the
//! current session and one event to the next session plus the requests the
//! driver must issue. Request completions carry the [`CycleId`] they were
//! issued for; a completion whose cycle is no longer live is discarded.

use crate::service::error::{DiagnosisError, VideoError};
use crate::service::types::{DiagnosisResult, Persona, Query, VideoAsset};
use crate::transcript::CaptureErrorKind;
use std::fmt;
use std::sync::Arc;

/// Identity of one diagnostic cycle. Strictly increasing per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(pub u64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of the supplementary video for a ready diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoState {
    Pending,
    Ready(Arc<VideoAsset>),
    Failed(VideoError),
    /// Video generation disabled for this session.
    Skipped,
}

impl VideoState {
    /// True once no video response is outstanding.
    pub fn is_settled(&self) -> bool {
        !matches!(self, VideoState::Pending)
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoState::Pending => "pending",
            VideoState::Ready(_) => "ready",
            VideoState::Failed(_) => "failed",
            VideoState::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Listening for an utterance. `resume` is restored if nothing is heard.
    Capturing { resume: Box<SessionState> },
    Diagnosing { cycle: CycleId, query: Query },
    Ready {
        cycle: CycleId,
        query: Query,
        result: Arc<DiagnosisResult>,
        video: VideoState,
    },
    Failed {
        cycle: CycleId,
        query: Query,
        reason: DiagnosisError,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing { .. } => "capturing",
            SessionState::Diagnosing { .. } => "diagnosing",
            SessionState::Ready { .. } => "ready",
            SessionState::Failed { .. } => "failed",
        }
    }

    /// Cycle of the live query, if any.
    pub fn cycle(&self) -> Option<CycleId> {
        match self {
            SessionState::Diagnosing { cycle, .. }
            | SessionState::Ready { cycle, .. }
            | SessionState::Failed { cycle, .. } => Some(*cycle),
            SessionState::Idle | SessionState::Capturing { .. } => None,
        }
    }

    pub fn query(&self) -> Option<&Query> {
        match self {
            SessionState::Diagnosing { query, .. }
            | SessionState::Ready { query, .. }
            | SessionState::Failed { query, .. } => Some(query),
            SessionState::Idle | SessionState::Capturing { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&DiagnosisResult> {
        match self {
            SessionState::Ready { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn video(&self) -> Option<&VideoState> {
        match self {
            SessionState::Ready { video, .. } => Some(video),
            _ => None,
        }
    }

    /// Ready asset, if the video arrived.
    pub fn video_asset(&self) -> Option<&Arc<VideoAsset>> {
        match self.video() {
            Some(VideoState::Ready(asset)) => Some(asset),
            _ => None,
        }
    }

    /// Whether a new utterance may start a cycle from here.
    pub fn accepts_input(&self) -> bool {
        match self {
            SessionState::Idle | SessionState::Capturing { .. } | SessionState::Failed { .. } => {
                true
            }
            SessionState::Ready { video, .. } => video.is_settled(),
            SessionState::Diagnosing { .. } => false,
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Text from a transcript source, submitted with the session persona.
    Utterance(String),
    /// A fully formed query with its own persona.
    Submit(Query),
    /// Start over with the query that failed.
    Retry,
    Reset,
    SetPersona(Persona),
    CaptureStarted,
    CaptureCancelled,
    CaptureFailed(CaptureErrorKind),
    DiagnosisCompleted {
        cycle: CycleId,
        result: Result<DiagnosisResult, DiagnosisError>,
    },
    VideoCompleted {
        cycle: CycleId,
        result: Result<VideoAsset, VideoError>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Utterance(_) => "utterance",
            Event::Submit(_) => "submit",
            Event::Retry => "retry",
            Event::Reset => "reset",
            Event::SetPersona(_) => "set_persona",
            Event::CaptureStarted => "capture_started",
            Event::CaptureCancelled => "capture_cancelled",
            Event::CaptureFailed(_) => "capture_failed",
            Event::DiagnosisCompleted { .. } => "diagnosis_completed",
            Event::VideoCompleted { .. } => "video_completed",
        }
    }
}

/// Outbound request the driver must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestDiagnosis { cycle: CycleId, query: Query },
    RequestVideo { cycle: CycleId, query: Query },
}

/// Why an input was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A diagnosis or its video is still outstanding.
    Busy,
    EmptyUtterance,
    AlreadyCapturing,
    NotCapturing,
    NothingToRetry,
    AlreadyIdle,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Busy => "a request is still in progress",
            RejectReason::EmptyUtterance => "nothing was said",
            RejectReason::AlreadyCapturing => "already listening",
            RejectReason::NotCapturing => "not listening",
            RejectReason::NothingToRetry => "there is no failed query to retry",
            RejectReason::AlreadyIdle => "nothing to reset",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Input refused in the current state; session unchanged.
    Rejected(RejectReason),
    /// Stale or out-of-state completion; session unchanged.
    Discarded,
}

/// Result of applying one event.
#[derive(Debug, Clone)]
pub struct Step {
    pub session: Session,
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

/// The live session: current state plus what the next cycle needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: SessionState,
    persona: Persona,
    video_enabled: bool,
    last_cycle: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Persona::default(), true)
    }
}

impl Session {
    pub fn new(persona: Persona, video_enabled: bool) -> Self {
        Self {
            state: SessionState::Idle,
            persona,
            video_enabled,
            last_cycle: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Most recently issued cycle, if any.
    pub fn last_cycle(&self) -> Option<CycleId> {
        (self.last_cycle > 0).then_some(CycleId(self.last_cycle))
    }

    /// Apply one event.
    pub fn apply(self, event: Event) -> Step {
        match event {
            Event::Utterance(text) => match Query::new(&text, self.persona) {
                Ok(query) => self.submit(query),
                Err(_) if matches!(self.state, SessionState::Capturing { .. }) => {
                    self.apply(Event::CaptureFailed(CaptureErrorKind::NoSpeech))
                }
                Err(_) => self.reject(RejectReason::EmptyUtterance),
            },
            Event::Submit(query) => self.submit(query),
            Event::Retry => match &self.state {
                SessionState::Failed { query, .. } => {
                    let query = query.clone();
                    self.begin_cycle(query)
                }
                _ => self.reject(RejectReason::NothingToRetry),
            },
            Event::Reset => match self.state {
                SessionState::Idle => self.reject(RejectReason::AlreadyIdle),
                _ => self.with_state(SessionState::Idle),
            },
            Event::SetPersona(persona) => {
                let mut session = self;
                session.persona = persona;
                session.applied(Vec::new())
            }
            Event::CaptureStarted => match &self.state {
                SessionState::Capturing { .. } => self.reject(RejectReason::AlreadyCapturing),
                state if state.accepts_input() => {
                    let mut session = self;
                    let resume = std::mem::take(&mut session.state);
                    session.with_state(SessionState::Capturing {
                        resume: Box::new(resume),
                    })
                }
                _ => self.reject(RejectReason::Busy),
            },
            Event::CaptureCancelled | Event::CaptureFailed(_) => {
                let mut session = self;
                match std::mem::take(&mut session.state) {
                    SessionState::Capturing { resume } => session.with_state(*resume),
                    other => {
                        session.state = other;
                        session.discard()
                    }
                }
            }
            Event::DiagnosisCompleted { cycle, result } => {
                let mut session = self;
                match std::mem::take(&mut session.state) {
                    SessionState::Diagnosing { cycle: live, query } if live == cycle => {
                        session.diagnosis_settled(cycle, query, result)
                    }
                    other => {
                        session.state = other;
                        session.discard()
                    }
                }
            }
            Event::VideoCompleted { cycle, result } => {
                let mut session = self;
                match std::mem::take(&mut session.state) {
                    SessionState::Ready {
                        cycle: live,
                        query,
                        result: diagnosis,
                        video: VideoState::Pending,
                    } if live == cycle => {
                        let video = match result {
                            Ok(asset) => VideoState::Ready(Arc::new(asset)),
                            Err(err) => VideoState::Failed(err),
                        };
                        session.with_state(SessionState::Ready {
                            cycle,
                            query,
                            result: diagnosis,
                            video,
                        })
                    }
                    other => {
                        session.state = other;
                        session.discard()
                    }
                }
            }
        }
    }

    fn submit(self, query: Query) -> Step {
        if self.state.accepts_input() {
            self.begin_cycle(query)
        } else {
            self.reject(RejectReason::Busy)
        }
    }

    fn begin_cycle(mut self, query: Query) -> Step {
        self.last_cycle += 1;
        let cycle = CycleId(self.last_cycle);
        self.state = SessionState::Diagnosing {
            cycle,
            query: query.clone(),
        };
        self.applied(vec![Effect::RequestDiagnosis { cycle, query }])
    }

    fn diagnosis_settled(
        mut self,
        cycle: CycleId,
        query: Query,
        result: Result<DiagnosisResult, DiagnosisError>,
    ) -> Step {
        match result {
            Ok(result) => {
                let (video, effects) = if self.video_enabled {
                    (
                        VideoState::Pending,
                        vec![Effect::RequestVideo {
                            cycle,
                            query: query.clone(),
                        }],
                    )
                } else {
                    (VideoState::Skipped, Vec::new())
                };
                self.state = SessionState::Ready {
                    cycle,
                    query,
                    result: Arc::new(result),
                    video,
                };
                self.applied(effects)
            }
            Err(reason) => self.with_state(SessionState::Failed {
                cycle,
                query,
                reason,
            }),
        }
    }

    fn with_state(mut self, state: SessionState) -> Step {
        self.state = state;
        self.applied(Vec::new())
    }

    fn applied(self, effects: Vec<Effect>) -> Step {
        Step {
            session: self,
            effects,
            outcome: Outcome::Applied,
        }
    }

    fn reject(self, reason: RejectReason) -> Step {
        Step {
            session: self,
            effects: Vec::new(),
            outcome: Outcome::Rejected(reason),
        }
    }

    fn discard(self) -> Step {
        Step {
            session: self,
            effects: Vec::new(),
            outcome: Outcome::Discarded,
        }
    }
}
