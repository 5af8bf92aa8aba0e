//! Session timing: timeline, state machine, and the phase scheduler.

mod fsm;
mod scheduler;
mod timeline;

pub use fsm::{SessionEvent, SessionFsm, SessionStatus, TransitionResult};
pub use scheduler::{
    PhaseChange, PhaseScheduler, SessionSink, COUNTDOWN_SECONDS, FINISH_GRACE_SECONDS,
};
pub use timeline::{PhaseKind, PhaseSpec, SessionTimeline};
