//! Procedural cue synthesis for ibuki.
//!
//! [`TimbreBank`] plugs into `ibuki-core`'s cue engine as its
//! [`CueRenderer`]: each cue kind maps to a static [`timbre`] preset and
//! renders through the shared bell or clap algorithm in [`render`].

use ibuki_core::{CueKind, CueRenderer};
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub mod render;
pub mod timbre;

pub use render::{render_bell, render_clap};
pub use timbre::{timbre_for, BellPreset, ClapPreset, Mode, Partial, Timbre};

/// Maps cue kinds to presets and renders them with an owned seedable
/// RNG. The RNG only drives cosmetic per-partial detune, so a fixed
/// seed makes output fully reproducible.
pub struct TimbreBank {
    rng: SmallRng,
}

impl TimbreBank {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for TimbreBank {
    fn default() -> Self {
        Self::new()
    }
}

impl CueRenderer for TimbreBank {
    fn render(&mut self, kind: CueKind, sample_rate: f64) -> Vec<f32> {
        match timbre_for(kind) {
            Timbre::Bell(preset) => render_bell(preset, sample_rate, &mut self.rng),
            Timbre::Clap(preset) => render_clap(preset, sample_rate, &mut self.rng),
        }
    }
}
