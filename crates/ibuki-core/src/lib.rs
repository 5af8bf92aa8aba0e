//! Breathing session kernel: timeline, phase scheduler, and the audio
//! output lifecycle.
//!
//! # Primary API
//!
//! - [`PhaseScheduler`]: derives and drives the session timeline
//! - [`UnlockController`]: owns the output device and its unlock state
//!   machine
//! - [`CueEngine`]: mute gating + device readiness in front of a
//!   [`CueRenderer`]
//! - [`CpalPort`]: production [`DevicePort`] backed by CPAL
//!
//! The scheduler and unlock controller are driven from one logical
//! thread; the only concurrency is the audio callback inside
//! [`CpalPort`], fed through a lock-free channel.
//!
//! # Example
//!
//! ```ignore
//! use ibuki_core::{BreathConfig, PhaseScheduler};
//!
//! let mut scheduler = PhaseScheduler::new(&BreathConfig::default());
//! scheduler.start(clock.now(), &mut cues, &mut sink);
//! loop {
//!     scheduler.tick(clock.now(), &mut cues, &mut sink);
//!     if !scheduler.is_active() {
//!         break;
//!     }
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{
    BreathConfig, DurationBounds, DEFAULT_CYCLES, EXHALE_BOUNDS, HOLD_BOUNDS, INHALE_BOUNDS,
    MAX_CYCLES, MIN_CYCLES,
};

pub mod clock;
pub use clock::{ManualClock, MonotonicClock, SystemClock};

pub(crate) mod lockfree;
pub use lockfree::AtomicFloat;

pub mod session;
pub use session::{
    PhaseChange, PhaseKind, PhaseScheduler, PhaseSpec, SessionStatus, SessionTimeline, SessionSink,
    COUNTDOWN_SECONDS, FINISH_GRACE_SECONDS,
};

pub mod cue;
pub use cue::{CueEngine, CueKind, CueOutcome, CueRenderer, CueSink};

pub mod unlock;
pub use unlock::{
    DeviceLifecycle, DevicePort, EnsureOutcome, Gesture, GestureKind, LifecycleSignal,
    UnlockController,
};

pub mod output;
pub use output::CpalPort;
