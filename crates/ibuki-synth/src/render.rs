//! Cue renderers - pure functions from a timbre preset to a finished
//! mono buffer.
//!
//! Nothing is retained between invocations; the injected RNG (used for
//! per-partial detune) is the only source of nondeterminism, and it is
//! cosmetic.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};
use rand::Rng;

use crate::timbre::{BellPreset, ClapPreset};

/// Exponential ramps never reach true zero; this is the shared floor.
const ENV_FLOOR: f64 = 1e-4;

const MASTER_ATTACK_SECONDS: f64 = 0.012;
const MASTER_RELEASE_PAD_SECONDS: f64 = 0.35;
const STRIKE_DECAY_SECONDS: f64 = 0.07;
const PARTIAL_ONSET_SECONDS: f64 = 0.005;
/// Each partial drifts slowly down to this fraction of its start pitch.
const PARTIAL_DRIFT: f64 = 0.985;
const DETUNE_SPREAD_CENTS: f64 = 3.0;
const CLAP_ATTACK_SECONDS: f64 = 0.005;

/// Value of an exponential ramp from `from` to `to` over `duration`,
/// sampled at `t`.
fn exp_ramp(from: f64, to: f64, t: f64, duration: f64) -> f64 {
    if t <= 0.0 || duration <= 0.0 {
        return from;
    }
    if t >= duration {
        return to;
    }
    from * (to / from).powf(t / duration)
}

fn make_filter(
    kind: Type<f32>,
    sample_rate: f64,
    hz: f64,
    q: f64,
) -> Option<DirectForm2Transposed<f32>> {
    Coefficients::<f32>::from_params(kind, (sample_rate as f32).hz(), (hz as f32).hz(), q as f32)
        .ok()
        .map(DirectForm2Transposed::<f32>::new)
}

fn guard_sample_rate(sample_rate: f64) -> f64 {
    if sample_rate.is_finite() && sample_rate >= 8_000.0 {
        sample_rate
    } else {
        44_100.0
    }
}

fn noise_burst<R: Rng>(rng: &mut R, len: usize, shape: f64) -> Vec<f64> {
    (0..len)
        .map(|i| (rng.gen::<f64>() * 2.0 - 1.0) * (-(i as f64) / (len as f64 * shape)).exp())
        .collect()
}

/// Render one bell-like cue: struck-noise excitation through an
/// inharmonic resonant bank, plus detuned additive partials, under a
/// fast-attack multi-second-release master envelope.
pub fn render_bell<R: Rng>(preset: &BellPreset, sample_rate: f64, rng: &mut R) -> Vec<f32> {
    let sr = guard_sample_rate(sample_rate);
    let body_seconds = preset.tail_seconds + MASTER_RELEASE_PAD_SECONDS;
    let body_len = (body_seconds * sr).ceil() as usize;
    let nyquist_guard = sr * 0.45;

    let burst_len = ((preset.burst_seconds * sr) as usize).max(1);
    let noise = noise_burst(rng, burst_len, 0.65);

    let mut dry = vec![0.0f64; body_len];

    // Strike transient: high-passed burst under a fast decay.
    if let Some(mut highpass) = make_filter(
        Type::HighPass,
        sr,
        preset.strike_highpass_hz,
        Q_BUTTERWORTH_F32 as f64,
    ) {
        let strike_len = ((STRIKE_DECAY_SECONDS * sr) as usize).min(body_len);
        for (i, slot) in dry.iter_mut().take(strike_len).enumerate() {
            let x = if i < burst_len { noise[i] } else { 0.0 };
            let y = highpass.run(x as f32) as f64;
            let env = exp_ramp(
                preset.peak * 0.7,
                ENV_FLOOR,
                i as f64 / sr,
                STRIKE_DECAY_SECONDS,
            );
            *slot += y * env;
        }
    }

    // Modal body: the same burst through resonant band-passes, each with
    // its own decay, longer for the lower modes.
    let mut modal_bus = vec![0.0f64; body_len];
    for mode in preset.modes {
        let hz = preset.base_hz * mode.ratio;
        if hz >= nyquist_guard {
            continue;
        }
        let Some(mut bandpass) = make_filter(Type::BandPass, sr, hz, mode.q) else {
            continue;
        };
        let decay = preset.tail_seconds * mode.decay;
        let mode_len = ((decay * sr) as usize).min(body_len);
        for (i, slot) in modal_bus.iter_mut().take(mode_len).enumerate() {
            let x = if i < burst_len { noise[i] } else { 0.0 };
            let y = bandpass.run(x as f32) as f64;
            let env = exp_ramp(preset.peak * mode.gain, ENV_FLOOR, i as f64 / sr, decay);
            *slot += y * env;
        }
    }

    // High-shelf sheen on the modal bus before it joins the mix.
    match make_filter(
        Type::HighShelf(preset.shelf_gain_db as f32),
        sr,
        preset.shelf_hz,
        Q_BUTTERWORTH_F32 as f64,
    ) {
        Some(mut shelf) => {
            for (slot, &modal) in dry.iter_mut().zip(modal_bus.iter()) {
                *slot += shelf.run(modal as f32) as f64;
            }
        }
        None => {
            for (slot, &modal) in dry.iter_mut().zip(modal_bus.iter()) {
                *slot += modal;
            }
        }
    }

    // Additive partials with per-invocation detune and slow downward
    // pitch drift.
    for partial in preset.partials {
        let cents = rng.gen_range(-DETUNE_SPREAD_CENTS..DETUNE_SPREAD_CENTS);
        let detune = 2.0f64.powf(cents / 1200.0);
        let start_hz = preset.base_hz * partial.ratio * detune;
        if start_hz >= nyquist_guard {
            continue;
        }
        let end_hz = start_hz * PARTIAL_DRIFT;
        let decay = preset.tail_seconds * partial.decay;
        let partial_len = ((decay * sr) as usize).min(body_len);
        let mut phase = 0.0f64;
        for (i, slot) in dry.iter_mut().take(partial_len).enumerate() {
            let t = i as f64 / sr;
            let hz = exp_ramp(start_hz, end_hz, t, decay);
            phase += std::f64::consts::TAU * hz / sr;
            if t >= PARTIAL_ONSET_SECONDS {
                let env = exp_ramp(
                    partial.gain * preset.peak,
                    ENV_FLOOR,
                    t - PARTIAL_ONSET_SECONDS,
                    decay - PARTIAL_ONSET_SECONDS,
                );
                *slot += phase.sin() * env;
            }
        }
    }

    // Master envelope over the summed paths.
    for (i, sample) in dry.iter_mut().enumerate() {
        let t = i as f64 / sr;
        let env = if t < MASTER_ATTACK_SECONDS {
            exp_ramp(ENV_FLOOR, preset.peak, t, MASTER_ATTACK_SECONDS)
        } else {
            exp_ramp(
                preset.peak,
                ENV_FLOOR,
                t - MASTER_ATTACK_SECONDS,
                body_seconds - MASTER_ATTACK_SECONDS,
            )
        };
        *sample *= env;
    }

    // One quiet early reflection for a touch of room.
    let delay = (preset.reflection_delay_seconds * sr) as usize;
    let mut out = vec![0.0f32; body_len + delay];
    for (i, &sample) in dry.iter().enumerate() {
        out[i] += sample as f32;
        out[i + delay] += (sample * preset.reflection_gain) as f32;
    }
    out
}

/// Render the percussive terminal cue: band-limited noise with a fast
/// decay and one short echo. Deliberately non-resonant.
pub fn render_clap<R: Rng>(preset: &ClapPreset, sample_rate: f64, rng: &mut R) -> Vec<f32> {
    let sr = guard_sample_rate(sample_rate);
    let total_len = (preset.release_end_seconds * sr).ceil() as usize;
    let noise_len = ((preset.noise_seconds * sr) as usize).clamp(1, total_len.max(1));
    let noise = noise_burst(rng, noise_len, 0.6);

    let mut highpass = make_filter(
        Type::HighPass,
        sr,
        preset.highpass_hz,
        Q_BUTTERWORTH_F32 as f64,
    );
    let mut lowpass = make_filter(
        Type::LowPass,
        sr,
        preset.lowpass_hz,
        Q_BUTTERWORTH_F32 as f64,
    );

    let mut body = vec![0.0f64; total_len];
    for (i, slot) in body.iter_mut().enumerate() {
        let mut x = if i < noise_len { noise[i] } else { 0.0 };
        if let Some(filter) = highpass.as_mut() {
            x = filter.run(x as f32) as f64;
        }
        if let Some(filter) = lowpass.as_mut() {
            x = filter.run(x as f32) as f64;
        }
        let env = exp_ramp(
            preset.body_gain,
            ENV_FLOOR,
            i as f64 / sr,
            preset.body_decay_seconds,
        );
        *slot = x * env;
    }

    let delay = (preset.echo_delay_seconds * sr) as usize;
    let mut out = vec![0.0f32; total_len];
    for i in 0..total_len {
        let echo = if i >= delay {
            body[i - delay] * preset.echo_gain
        } else {
            0.0
        };
        let t = i as f64 / sr;
        let master = if t < CLAP_ATTACK_SECONDS {
            exp_ramp(ENV_FLOOR, preset.peak, t, CLAP_ATTACK_SECONDS)
        } else {
            exp_ramp(
                preset.peak,
                ENV_FLOOR,
                t - CLAP_ATTACK_SECONDS,
                preset.release_end_seconds - CLAP_ATTACK_SECONDS,
            )
        };
        out[i] = ((body[i] + echo) * master) as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timbre::{timbre_for, Timbre};
    use approx::assert_relative_eq;
    use ibuki_core::CueKind;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const SR: f64 = 48_000.0;

    fn bell_for(kind: CueKind) -> &'static BellPreset {
        match timbre_for(kind) {
            Timbre::Bell(preset) => preset,
            Timbre::Clap(_) => panic!("expected a bell"),
        }
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count()
    }

    #[test]
    fn test_exp_ramp_endpoints() {
        assert_relative_eq!(exp_ramp(0.5, 0.0001, 0.0, 1.0), 0.5);
        assert_relative_eq!(exp_ramp(0.5, 0.0001, 1.0, 1.0), 0.0001);
        let mid = exp_ramp(0.5, 0.0001, 0.5, 1.0);
        assert!(mid < 0.5 && mid > 0.0001);
    }

    #[test]
    fn test_bell_is_bounded_and_decays() {
        let mut rng = SmallRng::seed_from_u64(7);
        let samples = render_bell(bell_for(CueKind::Inhale), SR, &mut rng);
        assert!(!samples.is_empty());

        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.001, "bell is silent");
        assert!(peak <= 1.0, "bell clips: {peak}");

        let tail_start = samples.len() * 95 / 100;
        let tail_peak = samples[tail_start..]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(
            tail_peak < peak * 0.01,
            "bell does not decay: tail {tail_peak} vs peak {peak}"
        );
    }

    #[test]
    fn test_bell_is_deterministic_per_seed() {
        let preset = bell_for(CueKind::Hold);
        let a = render_bell(preset, SR, &mut SmallRng::seed_from_u64(42));
        let b = render_bell(preset, SR, &mut SmallRng::seed_from_u64(42));
        let c = render_bell(preset, SR, &mut SmallRng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bell_pitch_tracks_preset() {
        // Same seed, so detune differences cannot mask the base pitch.
        let inhale = render_bell(bell_for(CueKind::Inhale), SR, &mut SmallRng::seed_from_u64(1));
        let exhale = render_bell(bell_for(CueKind::Exhale), SR, &mut SmallRng::seed_from_u64(1));
        assert!(
            zero_crossings(&inhale) > zero_crossings(&exhale),
            "inhale should sit above exhale"
        );
    }

    #[test]
    fn test_countdown_bell_is_short() {
        let mut rng = SmallRng::seed_from_u64(5);
        let countdown = render_bell(bell_for(CueKind::Countdown), SR, &mut rng);
        let hold = render_bell(bell_for(CueKind::Hold), SR, &mut rng);
        assert!(countdown.len() < hold.len() / 2);
    }

    #[test]
    fn test_clap_is_short_bounded_and_percussive() {
        let clap = match timbre_for(CueKind::End) {
            Timbre::Clap(preset) => render_clap(preset, SR, &mut SmallRng::seed_from_u64(9)),
            Timbre::Bell(_) => panic!("expected the clap"),
        };
        assert!(!clap.is_empty());
        // Roughly 220ms at 48kHz.
        assert!(clap.len() < (0.3 * SR) as usize);

        let peak = clap.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.001 && peak <= 1.0);

        let tail_start = clap.len() * 95 / 100;
        let tail_peak = clap[tail_start..]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail_peak < peak * 0.05);
    }

    #[test]
    fn test_degenerate_sample_rate_falls_back() {
        let mut rng = SmallRng::seed_from_u64(3);
        let samples = render_bell(bell_for(CueKind::Inhale), f64::NAN, &mut rng);
        assert!(!samples.is_empty());
    }
}
