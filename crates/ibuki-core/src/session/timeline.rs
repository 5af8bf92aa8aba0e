//! Session timeline built from the configured breathing pattern.

use crate::config::BreathConfig;

/// One labeled segment of a breathing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Inhale,
    Hold,
    Exhale,
}

impl PhaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Inhale => "inhale",
            PhaseKind::Hold => "hold",
            PhaseKind::Exhale => "exhale",
        }
    }
}

/// One phase with a fixed duration. Immutable once a timeline is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    pub duration_seconds: f64,
}

/// The full ordered phase sequence for one session: the 3-phase base
/// pattern repeated `cycles` times, with cumulative end offsets so the
/// scheduler derives per-phase remaining time from the session start
/// timestamp instead of accumulating per-tick deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimeline {
    phases: Vec<PhaseSpec>,
    ends: Vec<f64>,
    total_seconds: f64,
}

impl SessionTimeline {
    /// Build a timeline from a config, clamping every field into range.
    /// Never fails; malformed input maps to documented defaults.
    pub fn build(config: &BreathConfig) -> Self {
        let config = config.clamped();
        let base = [
            (PhaseKind::Inhale, config.inhale_seconds),
            (PhaseKind::Hold, config.hold_seconds),
            (PhaseKind::Exhale, config.exhale_seconds),
        ];

        let mut phases = Vec::with_capacity(base.len() * config.cycles as usize);
        for _ in 0..config.cycles {
            for (kind, duration_seconds) in base {
                phases.push(PhaseSpec {
                    kind,
                    duration_seconds,
                });
            }
        }

        let mut ends = Vec::with_capacity(phases.len());
        let mut acc = 0.0;
        for phase in &phases {
            acc += phase.duration_seconds;
            ends.push(acc);
        }

        Self {
            phases,
            ends,
            total_seconds: acc,
        }
    }

    pub fn empty() -> Self {
        Self {
            phases: Vec::new(),
            ends: Vec::new(),
            total_seconds: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    pub fn phase(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    /// Seconds from session start at which phase `index` ends.
    pub fn end_offset(&self, index: usize) -> Option<f64> {
        self.ends.get(index).copied()
    }
}
