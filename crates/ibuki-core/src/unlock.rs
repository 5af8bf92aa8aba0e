//! Audio output unlock controller.
//!
//! Owns the single shared output device handle and coaxes it into a
//! usable state despite gesture gating, backgrounding, and device
//! changes. Recreation, not resumption, is the recovery path for a
//! stale device: resuming a previously-broken handle is unreliable.

use crate::error::Result;

/// Lifecycle of the output device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceLifecycle {
    #[default]
    Uninitialized,
    /// No usable device yet; waiting for a qualifying gesture.
    Locked,
    /// Unlock attempt in progress.
    Unlocking,
    /// Device is running and the probe tone completed.
    Unlocked,
    /// Device may be stale; next use tears down and recreates.
    NeedsRefresh,
    Closed,
}

/// Interaction types that may satisfy the host's gesture gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    PointerDown,
    PointerUp,
    Click,
    KeyActivate,
    /// Anything else (hover, scroll, ...); never qualifies.
    Other,
}

/// One user interaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
    pub kind: GestureKind,
    /// Key auto-repeat; repeated activations do not qualify.
    pub repeat: bool,
}

impl Gesture {
    pub fn pointer_down() -> Self {
        Self {
            kind: GestureKind::PointerDown,
            repeat: false,
        }
    }

    pub fn pointer_up() -> Self {
        Self {
            kind: GestureKind::PointerUp,
            repeat: false,
        }
    }

    pub fn click() -> Self {
        Self {
            kind: GestureKind::Click,
            repeat: false,
        }
    }

    pub fn key_activate(repeat: bool) -> Self {
        Self {
            kind: GestureKind::KeyActivate,
            repeat,
        }
    }

    pub fn other() -> Self {
        Self {
            kind: GestureKind::Other,
            repeat: false,
        }
    }

    pub fn qualifies(&self) -> bool {
        match self.kind {
            GestureKind::Other => false,
            GestureKind::KeyActivate => !self.repeat,
            _ => true,
        }
    }
}

/// Page/device lifecycle signals routed in by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    Hidden,
    Visible,
    RestoredFromCache,
    DeviceChanged,
}

/// Outcome of `ensure_usable`. `Unavailable` is normal; callers proceed
/// with visual-only feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Usable,
    Unavailable,
}

/// The output device seam. The production implementation wraps a CPAL
/// stream; tests script one. `resume` and `probe` may wait internally,
/// but every wait is bounded by a timeout of a few hundred milliseconds.
pub trait DevicePort {
    /// Create the device handle. Idempotent when already open.
    fn open(&mut self) -> Result<()>;

    /// Start or restart playback on the open handle.
    fn resume(&mut self) -> Result<()>;

    /// Play a near-silent tone and wait (bounded) for it to complete.
    fn probe(&mut self) -> Result<()>;

    /// Enqueue one rendered voice for mixing.
    fn submit(&mut self, samples: Vec<f32>) -> Result<()>;

    fn is_active(&self) -> bool;

    fn sample_rate(&self) -> f64;

    /// Voices currently alive in the mixer.
    fn active_voices(&self) -> usize;

    fn close(&mut self);

    fn set_volume(&mut self, _gain: f32) {}
}

/// Owns the device handle and its lifecycle state machine.
pub struct UnlockController<P: DevicePort> {
    port: P,
    lifecycle: DeviceLifecycle,
    armed: bool,
    pending_refresh: bool,
    session_active: bool,
    hidden: bool,
}

impl<P: DevicePort> UnlockController<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            lifecycle: DeviceLifecycle::Uninitialized,
            armed: false,
            pending_refresh: false,
            session_active: false,
            hidden: false,
        }
    }

    pub fn lifecycle(&self) -> DeviceLifecycle {
        self.lifecycle
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Start listening for qualifying gestures. The listener is
    /// persistent: it keeps qualifying events useful after the first
    /// unlock (e.g. to recover a refreshed device).
    pub fn arm_gesture(&mut self) {
        self.armed = true;
    }

    /// Feed one interaction event. On the first qualifying gesture the
    /// unlock attempt runs synchronously, within this call, because the
    /// host's gesture-to-audio linkage is only honored in the same turn.
    pub fn gesture(&mut self, gesture: Gesture) {
        if !self.armed || !gesture.qualifies() {
            return;
        }
        match self.lifecycle {
            DeviceLifecycle::Uninitialized | DeviceLifecycle::Locked => {
                self.attempt_unlock();
            }
            DeviceLifecycle::NeedsRefresh => {
                self.recreate();
            }
            DeviceLifecycle::Unlocked => {
                if !self.port.is_active() {
                    if let Err(err) = self.port.resume() {
                        tracing::warn!(%err, "resume on gesture failed");
                        self.lifecycle = DeviceLifecycle::NeedsRefresh;
                    }
                }
            }
            DeviceLifecycle::Unlocking | DeviceLifecycle::Closed => {}
        }
    }

    /// Resolve to a usable device or `Unavailable`, within a bounded
    /// time. Never blocks indefinitely and never errors outward.
    pub fn ensure_usable(&mut self) -> EnsureOutcome {
        match self.lifecycle {
            DeviceLifecycle::Unlocked => {
                if self.port.is_active() {
                    return EnsureOutcome::Usable;
                }
                match self.port.resume() {
                    Ok(()) => EnsureOutcome::Usable,
                    Err(err) => {
                        // Recreation is retried lazily on the next call,
                        // never within this one.
                        tracing::warn!(%err, "resume failed, device marked stale");
                        self.lifecycle = DeviceLifecycle::NeedsRefresh;
                        EnsureOutcome::Unavailable
                    }
                }
            }
            DeviceLifecycle::NeedsRefresh => {
                if self.recreate() {
                    EnsureOutcome::Usable
                } else {
                    EnsureOutcome::Unavailable
                }
            }
            DeviceLifecycle::Uninitialized => {
                if self.attempt_unlock() {
                    EnsureOutcome::Usable
                } else {
                    EnsureOutcome::Unavailable
                }
            }
            DeviceLifecycle::Locked
            | DeviceLifecycle::Unlocking
            | DeviceLifecycle::Closed => EnsureOutcome::Unavailable,
        }
    }

    /// Tear down and recreate the device. Deferred while a session is
    /// actively running to avoid mid-session glitches; flushed by
    /// `set_session_active(false)`.
    pub fn force_refresh(&mut self) {
        if self.session_active {
            tracing::debug!("refresh deferred until session stops");
            self.pending_refresh = true;
            return;
        }
        self.refresh_now();
    }

    pub fn handle_signal(&mut self, signal: LifecycleSignal) {
        match signal {
            LifecycleSignal::Hidden => {
                self.hidden = true;
            }
            LifecycleSignal::Visible => {
                self.hidden = false;
                self.mark_needs_refresh();
            }
            LifecycleSignal::RestoredFromCache | LifecycleSignal::DeviceChanged => {
                self.mark_needs_refresh();
                if self.session_active {
                    self.pending_refresh = true;
                }
            }
        }
    }

    pub fn set_session_active(&mut self, active: bool) {
        if self.session_active == active {
            return;
        }
        self.session_active = active;
        if !active && self.pending_refresh {
            tracing::debug!("flushing deferred refresh");
            self.refresh_now();
        }
    }

    pub(crate) fn mark_needs_refresh(&mut self) {
        if self.lifecycle == DeviceLifecycle::Unlocked {
            tracing::debug!("device marked stale");
            self.lifecycle = DeviceLifecycle::NeedsRefresh;
        }
    }

    pub fn close(&mut self) {
        self.port.close();
        self.lifecycle = DeviceLifecycle::Closed;
    }

    fn attempt_unlock(&mut self) -> bool {
        self.lifecycle = DeviceLifecycle::Unlocking;
        let result = self
            .port
            .open()
            .and_then(|_| self.port.resume())
            .and_then(|_| self.port.probe());
        match result {
            Ok(()) => {
                tracing::debug!("output unlocked");
                self.lifecycle = DeviceLifecycle::Unlocked;
                true
            }
            Err(err) => {
                tracing::warn!(%err, "unlock attempt failed");
                self.lifecycle = DeviceLifecycle::Locked;
                false
            }
        }
    }

    /// Full teardown and recreate. A failure re-gates to Locked, so the
    /// next recovery needs a fresh gesture.
    fn recreate(&mut self) -> bool {
        self.port.close();
        self.attempt_unlock()
    }

    fn refresh_now(&mut self) {
        self.pending_refresh = false;
        match self.lifecycle {
            DeviceLifecycle::Unlocked
            | DeviceLifecycle::Unlocking
            | DeviceLifecycle::NeedsRefresh => {
                self.recreate();
            }
            DeviceLifecycle::Uninitialized
            | DeviceLifecycle::Locked
            | DeviceLifecycle::Closed => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::DevicePort;
    use crate::error::{Error, Result};

    /// Scripted port with per-operation failure switches and call
    /// counters.
    pub(crate) struct ScriptedPort {
        pub fail_open: bool,
        pub fail_resume: bool,
        pub fail_probe: bool,
        pub opens: usize,
        pub resumes: usize,
        pub probes: usize,
        pub closes: usize,
        open: bool,
        active: bool,
        pending: usize,
    }

    impl ScriptedPort {
        pub fn healthy() -> Self {
            Self {
                fail_open: false,
                fail_resume: false,
                fail_probe: false,
                opens: 0,
                resumes: 0,
                probes: 0,
                closes: 0,
                open: false,
                active: false,
                pending: 0,
            }
        }

        /// A host with no audio capability at all.
        pub fn deaf() -> Self {
            Self {
                fail_open: true,
                ..Self::healthy()
            }
        }

        pub fn submitted(&self) -> usize {
            self.pending
        }

        /// Simulate the host suspending playback.
        pub fn suspend(&mut self) {
            self.active = false;
        }
    }

    impl DevicePort for ScriptedPort {
        fn open(&mut self) -> Result<()> {
            self.opens += 1;
            if self.fail_open {
                return Err(Error::InvalidDevice("scripted open failure".into()));
            }
            self.open = true;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.resumes += 1;
            if !self.open {
                return Err(Error::PortClosed);
            }
            if self.fail_resume {
                return Err(Error::InvalidDevice("scripted resume failure".into()));
            }
            self.active = true;
            Ok(())
        }

        fn probe(&mut self) -> Result<()> {
            self.probes += 1;
            if self.fail_probe {
                return Err(Error::ProbeTimeout);
            }
            Ok(())
        }

        fn submit(&mut self, _samples: Vec<f32>) -> Result<()> {
            if !self.active {
                return Err(Error::PortClosed);
            }
            self.pending += 1;
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.open && self.active
        }

        fn sample_rate(&self) -> f64 {
            48_000.0
        }

        fn active_voices(&self) -> usize {
            self.pending
        }

        fn close(&mut self) {
            self.closes += 1;
            self.open = false;
            self.active = false;
            self.pending = 0;
        }
    }
}
