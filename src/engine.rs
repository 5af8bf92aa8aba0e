//! IbukiEngine - composes the clock, phase scheduler, unlock
//! controller, and cue engine into one driver-facing object.

use ibuki_core::{
    BreathConfig, CpalPort, CueEngine, CueRenderer, DeviceLifecycle, DevicePort, Gesture,
    LifecycleSignal, MonotonicClock, PhaseScheduler, SessionSink, SessionStatus, SessionTimeline,
    SystemClock, UnlockController,
};
use ibuki_synth::TimbreBank;

use crate::Result;

/// Guided breathing session engine.
///
/// The driver owns one engine, feeds it periodic [`tick`](Self::tick)
/// calls (at least every ~100ms while a session is active), and routes
/// user gestures and page/device lifecycle signals into it. All session
/// output flows through the [`SessionSink`] passed to each call.
///
/// # Example
///
/// ```ignore
/// use ibuki::{BreathConfig, Gesture, IbukiEngine};
///
/// let mut engine = IbukiEngine::builder()
///     .config(BreathConfig::default())
///     .build();
///
/// engine.gesture(Gesture::click()); // unlock audio in the tap handler
/// engine.start(&mut sink);
/// loop {
///     engine.tick(&mut sink);
///     if !engine.is_active() {
///         break;
///     }
/// }
/// ```
pub struct IbukiEngine<R = TimbreBank, P = CpalPort, C = SystemClock>
where
    R: CueRenderer,
    P: DevicePort,
    C: MonotonicClock,
{
    clock: C,
    scheduler: PhaseScheduler,
    cues: CueEngine<R, P>,
}

impl IbukiEngine {
    /// Create an engine builder with the default subsystems (CPAL
    /// output, entropy-seeded synthesis, system clock).
    pub fn builder() -> IbukiEngineBuilder {
        IbukiEngineBuilder::default()
    }

    /// List available output devices.
    pub fn list_output_devices() -> Result<Vec<String>> {
        Ok(CpalPort::list_devices()?)
    }
}

impl<R, P, C> IbukiEngine<R, P, C>
where
    R: CueRenderer,
    P: DevicePort,
    C: MonotonicClock,
{
    /// Assemble an engine from explicit parts. Tests inject a manual
    /// clock, a scripted port, and a counting renderer here.
    pub fn from_parts(config: &BreathConfig, renderer: R, port: P, clock: C) -> Self {
        let mut unlock = UnlockController::new(port);
        unlock.arm_gesture();
        Self {
            clock,
            scheduler: PhaseScheduler::new(config),
            cues: CueEngine::new(renderer, unlock),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.scheduler.status()
    }

    pub fn is_active(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn timeline(&self) -> &SessionTimeline {
        self.scheduler.timeline()
    }

    pub fn device_lifecycle(&self) -> DeviceLifecycle {
        self.cues.unlock().lifecycle()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Apply a new breathing pattern. Rejected (returns `false`) while a
    /// session is active; reset first.
    pub fn configure(&mut self, config: &BreathConfig) -> bool {
        self.scheduler.configure(config)
    }

    /// Begin the pre-roll countdown. No-op unless Idle.
    pub fn start(&mut self, sink: &mut dyn SessionSink) {
        let now = self.clock.now();
        self.scheduler.start(now, &mut self.cues, sink);
        self.sync_session_activity();
    }

    /// Advance session state to the clock's current time.
    pub fn tick(&mut self, sink: &mut dyn SessionSink) {
        let now = self.clock.now();
        self.scheduler.tick(now, &mut self.cues, sink);
        self.sync_session_activity();
    }

    /// Return to Idle, flushing any refresh the unlock controller
    /// deferred while the session ran. Idempotent.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.sync_session_activity();
    }

    /// Single-button semantics: start when idle, otherwise reset.
    pub fn toggle(&mut self, sink: &mut dyn SessionSink) {
        if self.scheduler.is_active() {
            self.reset();
        } else {
            self.start(sink);
        }
    }

    /// Route a user interaction to the unlock controller. Call this
    /// inside the interaction handler itself; the unlock attempt must
    /// run in the same turn as the gesture.
    pub fn gesture(&mut self, gesture: Gesture) {
        self.cues.unlock_mut().gesture(gesture);
    }

    pub fn handle_signal(&mut self, signal: LifecycleSignal) {
        self.cues.unlock_mut().handle_signal(signal);
    }

    pub fn force_refresh(&mut self) {
        self.cues.unlock_mut().force_refresh();
    }

    /// Mute or unmute future cues; in-flight voices finish. Emits a
    /// mute-change notification when the state actually changes.
    pub fn set_muted(&mut self, muted: bool, sink: &mut dyn SessionSink) {
        if self.cues.set_muted(muted) {
            sink.on_mute_changed(muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.cues.is_muted()
    }

    /// Master cue volume in [0, 1].
    pub fn set_volume(&mut self, gain: f32) {
        self.cues.unlock_mut().port_mut().set_volume(gain);
    }

    fn sync_session_activity(&mut self) {
        let active = matches!(
            self.scheduler.status(),
            SessionStatus::CountingDown | SessionStatus::Running
        );
        self.cues.unlock_mut().set_session_active(active);
    }
}

/// Builder for [`IbukiEngine`] with the production subsystems.
pub struct IbukiEngineBuilder {
    config: BreathConfig,
    seed: Option<u64>,
    device_index: Option<usize>,
    volume: f32,
}

impl Default for IbukiEngineBuilder {
    fn default() -> Self {
        Self {
            config: BreathConfig::default(),
            seed: None,
            device_index: None,
            volume: 1.0,
        }
    }
}

impl IbukiEngineBuilder {
    pub fn config(mut self, config: BreathConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the detune RNG seed (reproducible cue rendering).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn output_device(mut self, index: usize) -> Self {
        self.device_index = Some(index);
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn build(self) -> IbukiEngine {
        let renderer = match self.seed {
            Some(seed) => TimbreBank::with_seed(seed),
            None => TimbreBank::new(),
        };
        let mut port = CpalPort::new(self.device_index);
        port.set_volume(self.volume);
        IbukiEngine::from_parts(&self.config, renderer, port, SystemClock)
    }
}
