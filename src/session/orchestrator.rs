//! Session driver: owns the live session and executes its requests.
//!
//! Inputs arrive on one mpsc inbox and are applied one at a time. Each
//! request effect runs as a spawned task that awaits a single service call
//! and posts its completion back, tagged with the cycle it belongs to.
//! Snapshots of the session are published on a watch channel.

use crate::error::{AdvisorError, Result};
use crate::service::client::AdvisorService;
use crate::service::types::{Persona, Query};
use crate::session::notice::{SessionNotice, describe};
use crate::session::state::{Effect, Event, Outcome, Session};
use crate::transcript::{CaptureErrorKind, CaptureEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

struct Envelope {
    event: Event,
    reply: Option<oneshot::Sender<Outcome>>,
}

/// Builder and event loop for one session.
pub struct SessionDriver<S: AdvisorService + 'static> {
    service: Arc<S>,
    session: Session,
    notice_tx: Option<crossbeam_channel::Sender<SessionNotice>>,
}

impl<S: AdvisorService + 'static> SessionDriver<S> {
    pub fn new(service: Arc<S>, session: Session) -> Self {
        Self {
            service,
            session,
            notice_tx: None,
        }
    }

    /// Send activity notices to a renderer.
    pub fn with_notices(mut self, tx: crossbeam_channel::Sender<SessionNotice>) -> Self {
        self.notice_tx = Some(tx);
        self
    }

    /// Start the event loop on the current runtime.
    ///
    /// The loop ends once every [`SessionHandle`] has been dropped.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(self.session.clone());
        let running = RunningSession {
            service: self.service,
            session: self.session,
            notice_tx: self.notice_tx,
            commands: command_rx,
            completions: mpsc::unbounded_channel(),
            state_tx,
        };
        let task = tokio::spawn(running.run());
        (
            SessionHandle {
                commands: command_tx,
                state: state_rx,
            },
            task,
        )
    }
}

struct RunningSession<S: AdvisorService + 'static> {
    service: Arc<S>,
    session: Session,
    notice_tx: Option<crossbeam_channel::Sender<SessionNotice>>,
    commands: mpsc::UnboundedReceiver<Envelope>,
    completions: (mpsc::UnboundedSender<Event>, mpsc::UnboundedReceiver<Event>),
    state_tx: watch::Sender<Session>,
}

impl<S: AdvisorService + 'static> RunningSession<S> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Envelope { event, reply }) => {
                        let outcome = self.handle(event);
                        if let Some(reply) = reply
                            && reply.send(outcome).is_err()
                        {
                            // Caller stopped waiting for the outcome
                        }
                    }
                    None => break,
                },
                Some(event) = self.completions.1.recv() => {
                    self.handle(event);
                }
            }
        }
    }

    fn handle(&mut self, event: Event) -> Outcome {
        let before = self.session.state().clone();
        let step = std::mem::take(&mut self.session).apply(event.clone());

        if let Some(ref tx) = self.notice_tx {
            for notice in describe(&before, &event, &step) {
                if tx.try_send(notice).is_err() {
                    // Renderer gone; notices are best effort
                }
            }
        }

        self.session = step.session;
        if step.outcome == Outcome::Applied {
            self.state_tx.send_replace(self.session.clone());
        }
        for effect in step.effects {
            self.execute(effect);
        }
        step.outcome
    }

    fn execute(&self, effect: Effect) {
        let service = Arc::clone(&self.service);
        let completions = self.completions.0.clone();
        tokio::spawn(async move {
            let event = match effect {
                Effect::RequestDiagnosis { cycle, query } => Event::DiagnosisCompleted {
                    cycle,
                    result: service.diagnose(&query).await,
                },
                Effect::RequestVideo { cycle, query } => Event::VideoCompleted {
                    cycle,
                    result: service.generate_video(&query).await,
                },
            };
            if completions.send(event).is_err() {
                // Session ended while the request was in flight
            }
        });
    }
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Envelope>,
    state: watch::Receiver<Session>,
}

impl SessionHandle {
    /// Apply an event and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the session loop has stopped.
    pub async fn send(&self, event: Event) -> Result<Outcome> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Envelope {
                event,
                reply: Some(reply),
            })
            .map_err(|_| session_closed())?;
        outcome.await.map_err(|_| session_closed())
    }

    /// Submit transcript text with the session persona.
    pub async fn submit_text(&self, text: &str) -> Result<Outcome> {
        self.send(Event::Utterance(text.to_string())).await
    }

    pub async fn submit(&self, query: Query) -> Result<Outcome> {
        self.send(Event::Submit(query)).await
    }

    pub async fn retry(&self) -> Result<Outcome> {
        self.send(Event::Retry).await
    }

    pub async fn reset(&self) -> Result<Outcome> {
        self.send(Event::Reset).await
    }

    pub async fn set_persona(&self, persona: Persona) -> Result<Outcome> {
        self.send(Event::SetPersona(persona)).await
    }

    pub async fn start_capture(&self) -> Result<Outcome> {
        self.send(Event::CaptureStarted).await
    }

    /// Feed the result of a capture into the session.
    pub async fn capture_event(&self, event: CaptureEvent) -> Result<Outcome> {
        let event = match event {
            CaptureEvent::Utterance(text) if text.trim().is_empty() => {
                Event::CaptureFailed(CaptureErrorKind::NoSpeech)
            }
            CaptureEvent::Utterance(text) => Event::Utterance(text),
            CaptureEvent::Error(kind) => Event::CaptureFailed(kind),
            CaptureEvent::Cancelled => Event::CaptureCancelled,
        };
        self.send(event).await
    }

    /// Latest published session.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Wait until the session satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Session>
    where
        F: FnMut(&Session) -> bool,
    {
        let mut rx = self.state.clone();
        let session = rx
            .wait_for(|session| predicate(session))
            .await
            .map_err(|_| session_closed())?;
        Ok((*session).clone())
    }
}

fn session_closed() -> AdvisorError {
    AdvisorError::Other("session loop has stopped".to_string())
}
