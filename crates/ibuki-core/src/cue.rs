//! Audio cue engine - mute gating plus device readiness in front of the
//! tone renderer.

use crate::session::PhaseKind;
use crate::unlock::{DevicePort, EnsureOutcome, UnlockController};

/// Every distinct sound the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    Inhale,
    Hold,
    Exhale,
    /// Terminal cue marking session completion.
    End,
    /// Tick played once per pre-roll second.
    Countdown,
}

impl From<PhaseKind> for CueKind {
    fn from(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Inhale => CueKind::Inhale,
            PhaseKind::Hold => CueKind::Hold,
            PhaseKind::Exhale => CueKind::Exhale,
        }
    }
}

/// Renders one cue into a finished mono buffer. Implementations hold no
/// per-cue state; an owned RNG for cosmetic detune is the only allowed
/// mutation.
pub trait CueRenderer {
    fn render(&mut self, kind: CueKind, sample_rate: f64) -> Vec<f32>;
}

/// What happened to a cue request. `Muted` and `Unavailable` are normal
/// outcomes, not errors; the session proceeds with visuals only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueOutcome {
    Played,
    Muted,
    Unavailable,
}

/// Seam the scheduler plays cues through.
pub trait CueSink {
    fn play_cue(&mut self, kind: CueKind) -> CueOutcome;
}

/// Composes mute state, the unlock controller, and a renderer.
pub struct CueEngine<R: CueRenderer, P: DevicePort> {
    renderer: R,
    unlock: UnlockController<P>,
    muted: bool,
}

impl<R: CueRenderer, P: DevicePort> CueEngine<R, P> {
    pub fn new(renderer: R, unlock: UnlockController<P>) -> Self {
        Self {
            renderer,
            unlock,
            muted: false,
        }
    }

    /// Takes effect for future cues only; in-flight voices finish.
    /// Returns whether the state actually changed.
    pub fn set_muted(&mut self, muted: bool) -> bool {
        if self.muted == muted {
            return false;
        }
        self.muted = muted;
        tracing::debug!(muted, "mute state changed");
        true
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn unlock(&self) -> &UnlockController<P> {
        &self.unlock
    }

    pub fn unlock_mut(&mut self) -> &mut UnlockController<P> {
        &mut self.unlock
    }
}

impl<R: CueRenderer, P: DevicePort> CueSink for CueEngine<R, P> {
    fn play_cue(&mut self, kind: CueKind) -> CueOutcome {
        if self.muted {
            return CueOutcome::Muted;
        }

        match self.unlock.ensure_usable() {
            EnsureOutcome::Usable => {
                let sample_rate = self.unlock.port().sample_rate();
                let samples = self.renderer.render(kind, sample_rate);
                match self.unlock.port_mut().submit(samples) {
                    Ok(()) => CueOutcome::Played,
                    Err(err) => {
                        tracing::warn!(?kind, %err, "cue submission failed");
                        self.unlock.mark_needs_refresh();
                        CueOutcome::Unavailable
                    }
                }
            }
            EnsureOutcome::Unavailable => CueOutcome::Unavailable,
        }
    }
}
