//! # ibuki - guided breathing session engine
//!
//! Drives a timed breathing exercise: a gapless timeline of labeled
//! phases (inhale / hold / exhale over several cycles) with a distinct
//! synthesized cue per phase kind, played through a gesture-gated,
//! possibly-interrupted audio output device.
//!
//! ## Architecture
//!
//! ibuki is an umbrella crate that coordinates:
//! - **ibuki-core** - session timing (timeline, state machine, phase
//!   scheduler), the output unlock controller, the CPAL port, and the
//!   cue engine
//! - **ibuki-synth** - procedural cue synthesis (timbre presets, bell
//!   and clap renderers)
//!
//! ## Quick Start
//!
//! ```ignore
//! use ibuki::{BreathConfig, Gesture, IbukiEngine};
//!
//! let mut engine = IbukiEngine::builder()
//!     .config(BreathConfig::default())
//!     .build();
//!
//! // From the tap handler, in the same turn as the gesture:
//! engine.gesture(Gesture::click());
//! engine.toggle(&mut sink);
//!
//! // From the frame/timer callback:
//! engine.tick(&mut sink);
//! ```
//!
//! The engine degrades gracefully: with no audio device, no gesture
//! yet, or a muted user, every cue resolves to "not played" and the
//! session continues with visual feedback only.

/// Re-export of ibuki-core for direct access
pub use ibuki_core as core;

/// Re-export of ibuki-synth for direct access
pub use ibuki_synth as synth;

pub use ibuki_core::{
    BreathConfig,
    CpalPort,
    CueEngine,
    CueKind,
    CueOutcome,
    CueRenderer,
    CueSink,
    DeviceLifecycle,
    DevicePort,
    DurationBounds,
    EnsureOutcome,
    Gesture,
    GestureKind,
    LifecycleSignal,
    ManualClock,
    MonotonicClock,
    PhaseChange,
    PhaseKind,
    PhaseScheduler,
    PhaseSpec,
    SessionSink,
    SessionStatus,
    SessionTimeline,
    SystemClock,
    UnlockController,
    COUNTDOWN_SECONDS,
    FINISH_GRACE_SECONDS,
};

pub use ibuki_synth::{timbre_for, BellPreset, ClapPreset, Timbre, TimbreBank};

mod engine;
pub use engine::{IbukiEngine, IbukiEngineBuilder};

mod error;
pub use error::{Error, Result};
