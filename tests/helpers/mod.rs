//! Shared test doubles for engine integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use ibuki::core::{Error, Result};
use ibuki::{CueKind, CueRenderer, DevicePort, PhaseChange, SessionSink};

/// Observable state of a [`TestPort`], shared with the test body.
pub struct PortState {
    pub fail_open: bool,
    pub fail_resume: bool,
    pub fail_probe: bool,
    pub opens: usize,
    pub resumes: usize,
    pub probes: usize,
    pub closes: usize,
    pub submissions: usize,
    pub volume: f32,
    pub open: bool,
    pub active: bool,
}

impl Default for PortState {
    fn default() -> Self {
        Self {
            fail_open: false,
            fail_resume: false,
            fail_probe: false,
            opens: 0,
            resumes: 0,
            probes: 0,
            closes: 0,
            submissions: 0,
            volume: 1.0,
            open: false,
            active: false,
        }
    }
}

/// Scripted device port; failure switches model a host that refuses
/// audio outside a gesture turn.
pub struct TestPort {
    state: Rc<RefCell<PortState>>,
}

impl TestPort {
    pub fn new() -> (Self, Rc<RefCell<PortState>>) {
        let state = Rc::new(RefCell::new(PortState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

impl DevicePort for TestPort {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.opens += 1;
        if state.fail_open {
            return Err(Error::InvalidDevice("test open failure".into()));
        }
        state.open = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.resumes += 1;
        if !state.open {
            return Err(Error::PortClosed);
        }
        if state.fail_resume {
            return Err(Error::InvalidDevice("test resume failure".into()));
        }
        state.active = true;
        Ok(())
    }

    fn probe(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.probes += 1;
        if state.fail_probe {
            return Err(Error::ProbeTimeout);
        }
        Ok(())
    }

    fn submit(&mut self, _samples: Vec<f32>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.active {
            return Err(Error::PortClosed);
        }
        state.submissions += 1;
        Ok(())
    }

    fn is_active(&self) -> bool {
        let state = self.state.borrow();
        state.open && state.active
    }

    fn sample_rate(&self) -> f64 {
        48_000.0
    }

    fn active_voices(&self) -> usize {
        0
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.closes += 1;
        state.open = false;
        state.active = false;
    }

    fn set_volume(&mut self, gain: f32) {
        self.state.borrow_mut().volume = gain;
    }
}

/// Record of every render call, shared with the test body.
#[derive(Clone, Default)]
pub struct CueLog {
    kinds: Rc<RefCell<Vec<CueKind>>>,
}

impl CueLog {
    pub fn total(&self) -> usize {
        self.kinds.borrow().len()
    }

    pub fn count(&self, kind: CueKind) -> usize {
        self.kinds.borrow().iter().filter(|&&k| k == kind).count()
    }
}

/// Renderer double that logs instead of synthesizing.
pub struct CountingRenderer {
    log: CueLog,
}

impl CountingRenderer {
    pub fn new() -> (Self, CueLog) {
        let log = CueLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl CueRenderer for CountingRenderer {
    fn render(&mut self, kind: CueKind, _sample_rate: f64) -> Vec<f32> {
        self.log.kinds.borrow_mut().push(kind);
        vec![0.0; 64]
    }
}

/// Records every session event the engine emits.
#[derive(Default)]
pub struct RecordingSink {
    pub phases: Vec<PhaseChange>,
    pub progress: Vec<f64>,
    pub countdowns: Vec<f64>,
    pub countdown_starts: usize,
    pub completions: usize,
    pub mute_changes: Vec<bool>,
}

impl SessionSink for RecordingSink {
    fn on_countdown_started(&mut self) {
        self.countdown_starts += 1;
    }

    fn on_countdown(&mut self, remaining_seconds: f64) {
        self.countdowns.push(remaining_seconds);
    }

    fn on_phase(&mut self, change: &PhaseChange) {
        self.phases.push(*change);
    }

    fn on_progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }

    fn on_complete(&mut self) {
        self.completions += 1;
    }

    fn on_mute_changed(&mut self, muted: bool) {
        self.mute_changes.push(muted);
    }
}

pub type TestEngine = ibuki::IbukiEngine<CountingRenderer, TestPort, ibuki::ManualClock>;

/// Engine wired with a manual clock, a scripted port, and a counting
/// renderer.
pub fn test_engine(
    config: &ibuki::BreathConfig,
) -> (TestEngine, CueLog, Rc<RefCell<PortState>>) {
    let (renderer, log) = CountingRenderer::new();
    let (port, state) = TestPort::new();
    let engine = ibuki::IbukiEngine::from_parts(config, renderer, port, ibuki::ManualClock::new());
    (engine, log, state)
}

/// Route engine tracing into the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

/// Tick the engine every 100ms for `seconds` of manual-clock time.
pub fn run_for(engine: &mut TestEngine, sink: &mut RecordingSink, seconds: f64) {
    let steps = (seconds / 0.1).round() as usize;
    for _ in 0..steps {
        engine.clock().advance_secs(0.1);
        engine.tick(sink);
    }
}
