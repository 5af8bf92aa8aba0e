//! CPAL audio output port.
//!
//! Rendered cue voices cross into the audio callback through a lock-free
//! channel; the callback mixes them into the device buffer and drops each
//! voice the moment its samples are exhausted.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::lockfree::AtomicFloat;
use crate::unlock::DevicePort;

/// How long `probe` waits for its tone to finish mixing.
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);
const PROBE_SECONDS: f64 = 0.02;
const PROBE_AMPLITUDE: f32 = 0.001;
const PROBE_HZ: f64 = 440.0;

/// Upper bound on queued voices; the session never has more than a
/// handful in flight.
const VOICE_QUEUE_CAPACITY: usize = 64;

/// One rendered cue in flight.
pub(crate) struct Voice {
    pub(crate) samples: Vec<f32>,
    pub(crate) position: usize,
    pub(crate) completed: Option<Sender<()>>,
}

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. This is safe
/// because the stream is only touched through `&mut CpalPort` by the
/// owning unlock controller.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

/// Production [`DevicePort`] backed by a CPAL output stream.
///
/// Construction is lazy: no device is touched until `open`, so the
/// unlock controller's `Uninitialized` state is real.
pub struct CpalPort {
    device_index: Option<usize>,
    stream: Option<StreamHandle>,
    running: bool,
    sample_rate: f64,
    channels: usize,
    voice_tx: Option<Sender<Voice>>,
    live_voices: Arc<AtomicUsize>,
    volume: Arc<AtomicFloat>,
}

impl CpalPort {
    pub fn new(device_index: Option<usize>) -> Self {
        Self {
            device_index,
            stream: None,
            running: false,
            sample_rate: 44_100.0,
            channels: 2,
            voice_tx: None,
            live_voices: Arc::new(AtomicUsize::new(0)),
            volume: Arc::new(AtomicFloat::new(1.0)),
        }
    }

    /// Select an output device (takes effect on the next open).
    pub fn set_device(&mut self, index: Option<usize>) {
        self.device_index = index;
    }

    pub fn device_name(&self) -> Result<String> {
        Ok(get_device(self.device_index)?.name()?)
    }

    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .enumerate()
            .map(|(i, d)| Ok(format!("{i}: {}", d.name()?)))
            .collect()
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    fn submit_voice(&mut self, voice: Voice) -> Result<()> {
        let tx = self.voice_tx.as_ref().ok_or(Error::PortClosed)?;
        self.live_voices.fetch_add(1, Ordering::AcqRel);
        if tx.try_send(voice).is_err() {
            self.live_voices.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::PortClosed);
        }
        Ok(())
    }
}

impl DevicePort for CpalPort {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = get_device(self.device_index)?;
        let config = device.default_output_config()?;
        self.sample_rate = config.sample_rate().0 as f64;
        self.channels = config.channels() as usize;

        let (tx, rx) = bounded::<Voice>(VOICE_QUEUE_CAPACITY);
        let live = Arc::clone(&self.live_voices);
        let volume = Arc::clone(&self.volume);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), rx, live, volume)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), rx, live, volume)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), rx, live, volume)?,
            format => {
                return Err(Error::InvalidDevice(format!(
                    "Unsupported sample format: {format:?}"
                )));
            }
        };

        self.voice_tx = Some(tx);
        self.stream = Some(StreamHandle(stream));
        self.running = false;
        tracing::debug!(sample_rate = self.sample_rate, "output stream created");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(Error::PortClosed)?;
        stream.0.play()?;
        self.running = true;
        Ok(())
    }

    fn probe(&mut self) -> Result<()> {
        if !self.running {
            return Err(Error::PortClosed);
        }
        let count = (self.sample_rate * PROBE_SECONDS) as usize;
        let samples = (0..count)
            .map(|i| {
                let t = i as f64 / self.sample_rate;
                ((2.0 * std::f64::consts::PI * PROBE_HZ * t).sin() as f32) * PROBE_AMPLITUDE
            })
            .collect();

        let (done_tx, done_rx) = bounded(1);
        self.submit_voice(Voice {
            samples,
            position: 0,
            completed: Some(done_tx),
        })?;
        done_rx
            .recv_timeout(PROBE_TIMEOUT)
            .map_err(|_| Error::ProbeTimeout)
    }

    fn submit(&mut self, samples: Vec<f32>) -> Result<()> {
        self.submit_voice(Voice {
            samples,
            position: 0,
            completed: None,
        })
    }

    fn is_active(&self) -> bool {
        self.running && self.stream.is_some()
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn active_voices(&self) -> usize {
        self.live_voices.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        self.stream = None;
        self.voice_tx = None;
        self.running = false;
        self.live_voices.store(0, Ordering::Release);
    }

    fn set_volume(&mut self, gain: f32) {
        self.volume.set(gain.clamp(0.0, 1.0));
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!("Device index {i} out of range ({count} available)"))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    inbox: Receiver<Voice>,
    live: Arc<AtomicUsize>,
    volume: Arc<AtomicFloat>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut voices: Vec<Voice> = Vec::new();
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                let frames = data.len() / channels;
                mix_voices(&mut voices, &inbox, &mut scratch, frames, volume.get(), &live);
                write_output(data, channels, &scratch);
            }));

            if result.is_err() {
                output_silence(data);
            }
        },
        |err| {
            tracing::warn!(%err, "output stream error");
        },
        None,
    )?;

    Ok(stream)
}

/// Drain new voices, mix one buffer's worth, and release every voice
/// whose samples are exhausted.
fn mix_voices(
    voices: &mut Vec<Voice>,
    inbox: &Receiver<Voice>,
    scratch: &mut Vec<f32>,
    frames: usize,
    gain: f32,
    live: &AtomicUsize,
) {
    while let Ok(voice) = inbox.try_recv() {
        voices.push(voice);
    }

    scratch.clear();
    scratch.resize(frames, 0.0);

    for voice in voices.iter_mut() {
        let remaining = voice.samples.len() - voice.position;
        let count = remaining.min(frames);
        for (i, slot) in scratch.iter_mut().take(count).enumerate() {
            *slot += voice.samples[voice.position + i] * gain;
        }
        voice.position += count;
    }

    voices.retain_mut(|voice| {
        if voice.position < voice.samples.len() {
            return true;
        }
        if let Some(done) = voice.completed.take() {
            let _ = done.send(());
        }
        live.fetch_sub(1, Ordering::AcqRel);
        false
    });
}

/// Fan the mono mix out to every output channel.
fn write_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    scratch: &[f32],
) {
    for (i, sample) in data.iter_mut().enumerate() {
        let frame = i / channels;
        let value = scratch.get(frame).copied().unwrap_or(0.0);
        *sample = T::from_sample(value);
    }
}

/// Output silence (panic recovery).
fn output_silence<T: cpal::SizedSample + cpal::FromSample<f32>>(data: &mut [T]) {
    for sample in data.iter_mut() {
        *sample = T::from_sample(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn push_voice(
        tx: &Sender<Voice>,
        live: &Arc<AtomicUsize>,
        samples: Vec<f32>,
        completed: Option<Sender<()>>,
    ) {
        live.fetch_add(1, Ordering::AcqRel);
        tx.send(Voice {
            samples,
            position: 0,
            completed,
        })
        .unwrap();
    }

    #[test]
    fn test_mixer_releases_finished_voices() {
        let (tx, rx) = bounded(8);
        let live = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = bounded(1);

        push_voice(&tx, &live, vec![0.5; 100], None);
        push_voice(&tx, &live, vec![0.25; 250], Some(done_tx));

        let mut voices = Vec::new();
        let mut scratch = Vec::new();

        mix_voices(&mut voices, &rx, &mut scratch, 128, 1.0, &live);
        assert_eq!(live.load(Ordering::Acquire), 1);
        assert_eq!(voices.len(), 1);
        assert!(done_rx.try_recv().is_err());

        mix_voices(&mut voices, &rx, &mut scratch, 128, 1.0, &live);
        assert_eq!(live.load(Ordering::Acquire), 0);
        assert!(voices.is_empty());
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn test_mixer_sums_voices_and_applies_gain() {
        let (tx, rx) = bounded(8);
        let live = Arc::new(AtomicUsize::new(0));

        push_voice(&tx, &live, vec![0.5; 16], None);
        push_voice(&tx, &live, vec![0.25; 16], None);

        let mut voices = Vec::new();
        let mut scratch = Vec::new();
        mix_voices(&mut voices, &rx, &mut scratch, 16, 0.5, &live);

        assert_relative_eq!(scratch[0], (0.5 + 0.25) * 0.5);
        assert_relative_eq!(scratch[15], (0.5 + 0.25) * 0.5);
    }

    #[test]
    fn test_repeated_cues_do_not_accumulate_voices() {
        let (tx, rx) = bounded(8);
        let live = Arc::new(AtomicUsize::new(0));
        let mut voices = Vec::new();
        let mut scratch = Vec::new();

        for _ in 0..50 {
            push_voice(&tx, &live, vec![0.1; 200], None);
            mix_voices(&mut voices, &rx, &mut scratch, 256, 1.0, &live);
        }

        assert_eq!(live.load(Ordering::Acquire), 0);
        assert!(voices.is_empty());
    }

    #[test]
    fn test_mixer_pads_partial_last_buffer() {
        let (tx, rx) = bounded(8);
        let live = Arc::new(AtomicUsize::new(0));

        push_voice(&tx, &live, vec![1.0; 10], None);

        let mut voices = Vec::new();
        let mut scratch = Vec::new();
        mix_voices(&mut voices, &rx, &mut scratch, 32, 1.0, &live);

        assert_relative_eq!(scratch[9], 1.0);
        assert_relative_eq!(scratch[10], 0.0);
        assert_relative_eq!(scratch[31], 0.0);
    }

    #[test]
    fn test_closed_port_rejects_submissions() {
        let mut port = CpalPort::new(None);
        assert!(!port.is_active());
        assert!(matches!(
            port.submit(vec![0.0; 8]),
            Err(Error::PortClosed)
        ));
        assert_eq!(port.active_voices(), 0);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut port = CpalPort::new(None);
        port.set_volume(3.0);
        assert_relative_eq!(port.volume(), 1.0);
        port.set_volume(-1.0);
        assert_relative_eq!(port.volume(), 0.0);
    }
}
