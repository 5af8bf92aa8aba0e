//! Phase scheduler - derives and drives the session timeline.

use std::time::{Duration, Instant};

use super::fsm::{SessionEvent, SessionFsm, SessionStatus, TransitionResult};
use super::timeline::{PhaseKind, PhaseSpec, SessionTimeline};
use crate::config::BreathConfig;
use crate::cue::{CueKind, CueSink};

/// Fixed pre-roll before phase 0, so the user can exhale first.
pub const COUNTDOWN_SECONDS: f64 = 3.0;

/// How long a finished session stays visible before auto-resetting.
pub const FINISH_GRACE_SECONDS: f64 = 2.0;

/// Payload of a phase-change event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub label: &'static str,
    pub kind: PhaseKind,
    pub duration_seconds: f64,
    pub index: usize,
}

/// Caller-supplied sink for session events. Every hook defaults to a
/// no-op so drivers implement only what they render.
pub trait SessionSink {
    /// Pre-roll began; the driver should prompt the user to exhale first.
    fn on_countdown_started(&mut self) {}
    fn on_countdown(&mut self, _remaining_seconds: f64) {}
    fn on_phase(&mut self, _change: &PhaseChange) {}
    fn on_progress(&mut self, _fraction: f64) {}
    fn on_complete(&mut self) {}
    fn on_mute_changed(&mut self, _muted: bool) {}
}

/// Drives one breathing session against a monotonic clock.
///
/// Elapsed and remaining time are always recomputed from the recorded
/// stage-start timestamp (countdown start or session start), so jitter in
/// tick delivery cannot compound into drift. The scheduler never panics
/// and never returns errors; inconsistencies finish the session.
pub struct PhaseScheduler {
    timeline: SessionTimeline,
    fsm: SessionFsm,
    current_index: usize,
    countdown_start: Option<Instant>,
    session_start: Option<Instant>,
    finished_at: Option<Instant>,
    countdown_cues_fired: u32,
}

impl PhaseScheduler {
    pub fn new(config: &BreathConfig) -> Self {
        Self {
            timeline: SessionTimeline::build(config),
            fsm: SessionFsm::new(),
            current_index: 0,
            countdown_start: None,
            session_start: None,
            finished_at: None,
            countdown_cues_fired: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.fsm.status()
    }

    /// Whether the driver should keep delivering ticks.
    pub fn is_active(&self) -> bool {
        self.fsm.status() != SessionStatus::Idle
    }

    pub fn timeline(&self) -> &SessionTimeline {
        &self.timeline
    }

    /// The phase currently in progress, if the session is running.
    pub fn current_phase(&self) -> Option<&PhaseSpec> {
        match self.fsm.status() {
            SessionStatus::Running => self.timeline.phase(self.current_index),
            _ => None,
        }
    }

    /// Rebuild the timeline from a new config. Rejected while a session
    /// is active; the caller must reset first.
    pub fn configure(&mut self, config: &BreathConfig) -> bool {
        if self.fsm.status() != SessionStatus::Idle {
            tracing::warn!("configuration change rejected while session is active");
            return false;
        }
        self.timeline = SessionTimeline::build(config);
        true
    }

    /// Begin the pre-roll countdown. No-op unless Idle.
    pub fn start(&mut self, now: Instant, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        if self.fsm.transition(SessionEvent::Start) == TransitionResult::None {
            return;
        }
        tracing::debug!("countdown started");
        self.countdown_start = Some(now);
        self.session_start = None;
        self.finished_at = None;
        self.current_index = 0;
        self.countdown_cues_fired = 1;
        sink.on_countdown_started();
        sink.on_countdown(COUNTDOWN_SECONDS);
        let _ = cues.play_cue(CueKind::Countdown);
    }

    /// Recompute session state at `now`. Called by the driver at least
    /// every ~100ms while the session is active.
    pub fn tick(&mut self, now: Instant, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        match self.fsm.status() {
            SessionStatus::Idle => {}
            SessionStatus::CountingDown => self.tick_countdown(now, cues, sink),
            SessionStatus::Running => self.tick_running(now, cues, sink),
            SessionStatus::Finished => self.tick_finished(now),
        }
    }

    /// Return to Idle from any state. Idempotent.
    pub fn reset(&mut self) {
        if self.fsm.transition(SessionEvent::Reset) != TransitionResult::None {
            tracing::debug!("session reset");
        }
        self.countdown_start = None;
        self.session_start = None;
        self.finished_at = None;
        self.current_index = 0;
        self.countdown_cues_fired = 0;
    }

    fn tick_countdown(&mut self, now: Instant, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        let Some(countdown_start) = self.countdown_start else {
            self.reset();
            return;
        };
        let elapsed = now.saturating_duration_since(countdown_start).as_secs_f64();
        let remaining = COUNTDOWN_SECONDS - elapsed;

        if remaining > 0.0 {
            sink.on_countdown(remaining);
            sink.on_progress(0.0);
            // One tick cue per whole pre-roll second; a late tick fires a
            // single cue, never a burst of missed ones.
            let due = elapsed.floor() as u32 + 1;
            if due > self.countdown_cues_fired {
                self.countdown_cues_fired = due;
                let _ = cues.play_cue(CueKind::Countdown);
            }
            return;
        }

        self.fsm.transition(SessionEvent::CountdownElapsed);
        tracing::debug!("session running");
        // The session is anchored at the exact countdown end, not at this
        // tick's arrival time, so phase boundaries stay gapless.
        self.session_start = Some(countdown_start + Duration::from_secs_f64(COUNTDOWN_SECONDS));
        self.current_index = 0;
        self.announce_phase(0, cues, sink);
        self.tick_running(now, cues, sink);
    }

    fn tick_running(&mut self, now: Instant, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        let Some(session_start) = self.session_start else {
            self.reset();
            return;
        };
        let elapsed = now.saturating_duration_since(session_start).as_secs_f64();

        while self.fsm.status() == SessionStatus::Running {
            let Some(end) = self.timeline.end_offset(self.current_index) else {
                self.finish(now, cues, sink);
                break;
            };
            if elapsed < end {
                break;
            }
            self.current_index += 1;
            if self.current_index >= self.timeline.len() {
                self.finish(now, cues, sink);
                break;
            }
            self.announce_phase(self.current_index, cues, sink);
        }

        if self.fsm.status() == SessionStatus::Running {
            sink.on_progress(self.progress(elapsed));
        }
    }

    fn tick_finished(&mut self, now: Instant) {
        let grace_over = self
            .finished_at
            .map(|finished_at| {
                now.saturating_duration_since(finished_at).as_secs_f64() >= FINISH_GRACE_SECONDS
            })
            .unwrap_or(true);
        if grace_over {
            self.reset();
        }
    }

    fn announce_phase(&self, index: usize, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        let Some(spec) = self.timeline.phase(index) else {
            return;
        };
        let change = PhaseChange {
            label: spec.kind.label(),
            kind: spec.kind,
            duration_seconds: spec.duration_seconds,
            index,
        };
        sink.on_phase(&change);
        // Zero-length phases stay visible in the event stream but never
        // produce an audio burst.
        if spec.duration_seconds > 0.0 {
            let _ = cues.play_cue(spec.kind.into());
        }
    }

    fn finish(&mut self, now: Instant, cues: &mut dyn CueSink, sink: &mut dyn SessionSink) {
        if self.fsm.transition(SessionEvent::Complete) == TransitionResult::None {
            return;
        }
        tracing::debug!("session finished");
        self.finished_at = Some(now);
        let _ = cues.play_cue(CueKind::End);
        sink.on_progress(1.0);
        sink.on_complete();
    }

    fn progress(&self, elapsed: f64) -> f64 {
        let total = self.timeline.total_seconds();
        if total > 0.0 {
            (elapsed / total).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}
