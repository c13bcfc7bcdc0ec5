pub mod notice;
pub mod orchestrator;
pub mod state;

pub use notice::SessionNotice;
pub use orchestrator::{SessionDriver, SessionHandle};
pub use state::{CycleId, Effect, Event, Outcome, RejectReason, Session, SessionState, VideoState};
