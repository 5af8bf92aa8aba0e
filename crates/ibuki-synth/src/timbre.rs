//! Timbre presets - the fixed acoustic parameters for each cue.
//!
//! Presets are the only place the cue sounds vary; the renderers in
//! [`crate::render`] are shared. Phase kinds map to descending base
//! pitch (inhale highest, exhale lowest) so cues are distinguishable by
//! pitch alone.

use ibuki_core::CueKind;

/// One resonant band-pass mode of the bell body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mode {
    /// Frequency as a ratio of the preset base. The set is inharmonic
    /// on purpose; a pure harmonic series sounds tonal, not bell-like.
    pub ratio: f64,
    pub q: f64,
    pub gain: f64,
    /// Decay time as a fraction of the preset tail.
    pub decay: f64,
}

/// One directly-driven sine partial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub ratio: f64,
    pub gain: f64,
    /// Decay time as a fraction of the preset tail.
    pub decay: f64,
}

/// Parameters of one bell-like cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BellPreset {
    pub base_hz: f64,
    pub peak: f64,
    pub tail_seconds: f64,
    /// Length of the noise-burst excitation.
    pub burst_seconds: f64,
    pub strike_highpass_hz: f64,
    /// High-shelf sheen on the modal bus.
    pub shelf_hz: f64,
    pub shelf_gain_db: f64,
    pub reflection_delay_seconds: f64,
    pub reflection_gain: f64,
    pub modes: &'static [Mode],
    pub partials: &'static [Partial],
}

/// Parameters of the percussive terminal cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClapPreset {
    pub peak: f64,
    pub noise_seconds: f64,
    pub highpass_hz: f64,
    pub lowpass_hz: f64,
    pub body_gain: f64,
    pub body_decay_seconds: f64,
    pub echo_delay_seconds: f64,
    pub echo_gain: f64,
    pub release_end_seconds: f64,
}

/// A cue's sound: resonant bell or percussive clap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timbre {
    Bell(&'static BellPreset),
    Clap(&'static ClapPreset),
}

/// Shared inharmonic mode table; lower partials ring longer.
const BELL_MODES: [Mode; 7] = [
    Mode { ratio: 0.99, q: 25.0, gain: 1.00, decay: 1.00 },
    Mode { ratio: 2.01, q: 28.0, gain: 0.55, decay: 0.90 },
    Mode { ratio: 2.32, q: 26.0, gain: 0.42, decay: 0.85 },
    Mode { ratio: 2.74, q: 24.0, gain: 0.36, decay: 0.80 },
    Mode { ratio: 3.76, q: 22.0, gain: 0.28, decay: 0.70 },
    Mode { ratio: 4.07, q: 20.0, gain: 0.22, decay: 0.60 },
    Mode { ratio: 6.80, q: 18.0, gain: 0.15, decay: 0.50 },
];

const BELL_PARTIALS: [Partial; 4] = [
    Partial { ratio: 1.00, gain: 0.35, decay: 1.00 },
    Partial { ratio: 2.01, gain: 0.22, decay: 0.90 },
    Partial { ratio: 2.74, gain: 0.15, decay: 0.80 },
    Partial { ratio: 3.76, gain: 0.10, decay: 0.70 },
];

const BASE_BELL: BellPreset = BellPreset {
    base_hz: 950.0,
    peak: 0.30,
    tail_seconds: 3.2,
    burst_seconds: 0.012,
    strike_highpass_hz: 300.0,
    shelf_hz: 3500.0,
    shelf_gain_db: 3.0,
    reflection_delay_seconds: 0.028,
    reflection_gain: 0.25,
    modes: &BELL_MODES,
    partials: &BELL_PARTIALS,
};

static INHALE_BELL: BellPreset = BellPreset {
    base_hz: 1100.0,
    ..BASE_BELL
};
static HOLD_BELL: BellPreset = BASE_BELL;
static EXHALE_BELL: BellPreset = BellPreset {
    base_hz: 820.0,
    ..BASE_BELL
};

/// Countdown tick: the middle register with a short tail, so the
/// pre-roll stays unobtrusive.
static COUNTDOWN_BELL: BellPreset = BellPreset {
    peak: 0.22,
    tail_seconds: 0.9,
    ..BASE_BELL
};

static END_CLAP: ClapPreset = ClapPreset {
    peak: 0.63,
    noise_seconds: 0.12,
    highpass_hz: 800.0,
    lowpass_hz: 6000.0,
    body_gain: 0.9,
    body_decay_seconds: 0.18,
    echo_delay_seconds: 0.06,
    echo_gain: 0.4,
    release_end_seconds: 0.22,
};

/// Look up the timbre for a cue kind.
pub fn timbre_for(kind: CueKind) -> Timbre {
    match kind {
        CueKind::Inhale => Timbre::Bell(&INHALE_BELL),
        CueKind::Hold => Timbre::Bell(&HOLD_BELL),
        CueKind::Exhale => Timbre::Bell(&EXHALE_BELL),
        CueKind::Countdown => Timbre::Bell(&COUNTDOWN_BELL),
        CueKind::End => Timbre::Clap(&END_CLAP),
    }
}
