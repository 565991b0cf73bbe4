//! The guided workout-execution engine.
//!
//! A session walks a trainee through an assigned plan one set at a time:
//! record a set, rest, record the next, move to the next exercise, and at
//! the end fold everything recorded into a single execution record. The
//! state machine in [`session`] is a pure transition core; [`registry`]
//! is the server-side driver that holds one live session per trainee and
//! owns the rest timers.

pub mod aggregator;
pub mod recorder;
pub mod registry;
pub mod session;
pub mod timer;

pub use recorder::SetRecorder;
pub use registry::{SessionRegistry, SessionSnapshot};
pub use session::{SessionState, SetEntry, TickOutcome, Transition, WorkoutSession};
pub use timer::RestTimer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidPlan(String),

    #[error("workout session is already handling a transition")]
    ConcurrentAccess,

    #[error("no active workout session")]
    NoSession,
}
