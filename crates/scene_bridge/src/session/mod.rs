//! Render session lifecycle
//!
//! [`SessionController`] exclusively owns the engine session handle and drives
//! it through
//! `Uninitialized -> Exporting -> Running <-> Editing / Paused -> Stopping -> Stopped`,
//! with `Errored` reachable whenever the engine fails. Every operation checks
//! the current state first; out-of-order calls are usage errors and leave the
//! state untouched.
//!
//! The controller also carries the per-render context (error log, job status,
//! render timer) that the rest of the core reports into.

pub mod engine;
pub mod error;
pub mod halt;
pub mod simulated;
pub mod stats;

pub use engine::{EngineError, EngineResult, EngineSession, RenderDescription, RenderEngine};
pub use error::SessionError;
pub use halt::{HaltConditions, HaltReason};
pub use simulated::{EngineCall, SimulatedConfig, SimulatedEngine, SimulatedSession};
pub use stats::{DeviceMemory, RenderStats};

use std::fmt;
use std::time::Duration;

use crate::diagnostics::{ErrorLog, JobStatus};
use crate::display::Framebuffer;
use crate::foundation::time::SamplingTimer;
use crate::props::Properties;

/// Lifecycle state of a render session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session and no export in progress
    Uninitialized,
    /// A full export is building the description
    Exporting,
    /// The engine is sampling
    Running,
    /// An edit bracket is open
    Editing,
    /// Sampling is suspended
    Paused,
    /// A final render reached its halt condition; the last frame may still be pulled
    Stopping,
    /// The session was released
    Stopped,
    /// The engine failed; a new full export is required
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Exporting => "exporting",
            SessionState::Running => "running",
            SessionState::Editing => "editing",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

impl SessionState {
    /// Whether an engine session exists in this state
    pub fn has_session(self) -> bool {
        matches!(
            self,
            SessionState::Running | SessionState::Editing | SessionState::Paused | SessionState::Stopping
        )
    }
}

/// What the render is for; decides the reaction to a halt condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Final render: halting stops the session
    Final,
    /// Interactive viewport: halting pauses so the user can keep inspecting
    Viewport,
}

/// Owner of the engine session and its state machine
pub struct SessionController<E: RenderEngine> {
    engine: E,
    session: Option<E::Session>,
    state: SessionState,
    mode: RenderMode,
    halt: HaltConditions,
    viewport_halt_time: Option<Duration>,
    stats: RenderStats,
    halt_reason: Option<HaltReason>,
    // Conditions already met when a halted render was resumed
    spent: Vec<HaltReason>,
    timer: SamplingTimer,
    log: ErrorLog,
    status: JobStatus,
}

impl<E: RenderEngine> SessionController<E> {
    /// Create an idle controller
    pub fn new(engine: E, mode: RenderMode, halt: HaltConditions) -> Self {
        Self {
            engine,
            session: None,
            state: SessionState::Uninitialized,
            mode,
            halt,
            viewport_halt_time: None,
            stats: RenderStats::default(),
            halt_reason: None,
            spent: Vec::new(),
            timer: SamplingTimer::default(),
            log: ErrorLog::default(),
            status: JobStatus::default(),
        }
    }

    /// Replace the error log (e.g. to change its capacity)
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.log = log;
        self
    }

    /// Auto-pause viewport renders after `time` of uninterrupted sampling
    pub fn with_viewport_halt_time(mut self, time: Duration) -> Self {
        self.viewport_halt_time = Some(time);
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Render mode
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Halt conditions in effect
    pub fn halt_conditions(&self) -> &HaltConditions {
        &self.halt
    }

    /// Change halt conditions; applies from the next check
    pub fn set_halt_conditions(&mut self, halt: HaltConditions) {
        self.halt = halt;
        self.spent.clear();
    }

    /// Statistics from the last poll
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Why the render last halted
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// Time since sampling last (re)started
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Warnings and errors of the current job
    pub fn log(&self) -> &ErrorLog {
        &self.log
    }

    /// Mutable access for exporters reporting warnings
    pub fn log_mut(&mut self) -> &mut ErrorLog {
        &mut self.log
    }

    /// Status line of the current job
    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Engine session, for inspection
    pub fn session(&self) -> Option<&E::Session> {
        self.session.as_ref()
    }

    /// The engine factory
    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn invalid(&self, op: &'static str) -> SessionError {
        SessionError::InvalidState { op, state: self.state }
    }

    fn require(&self, op: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(op))
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::info!("Render session: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Move to `Errored`, release the session and surface the failure
    fn fail(&mut self, op: &'static str, source: EngineError) -> SessionError {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.stop() {
                log::debug!("Ignoring stop failure while releasing a failed session: {err}");
            }
        }
        self.timer.pause();
        self.transition(SessionState::Errored);
        self.log.add_error(source.to_string(), None);
        self.status.set_error(source.to_string());
        SessionError::Engine { op, source }
    }

    /// Run an engine call on the live session; engine errors fail the controller
    fn call<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut E::Session) -> EngineResult<T>,
    ) -> Result<T, SessionError> {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Err(self.invalid(op)),
        };
        match f(session) {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail(op, err)),
        }
    }

    /// Enter `Exporting` for a new full export
    ///
    /// Allowed when no session is alive. A previous error or stopped render
    /// is forgotten.
    pub fn begin_export(&mut self) -> Result<(), SessionError> {
        self.require(
            "begin export",
            &[SessionState::Uninitialized, SessionState::Stopped, SessionState::Errored],
        )?;
        self.log.clear();
        self.status.reset();
        self.status.set_message("Exporting scene");
        self.halt_reason = None;
        self.spent.clear();
        self.stats = RenderStats::default();
        self.transition(SessionState::Exporting);
        Ok(())
    }

    /// Abandon an export in progress (cancellation); no session is created
    pub fn abort_export(&mut self) -> Result<(), SessionError> {
        self.require("abort export", &[SessionState::Exporting])?;
        self.status.set_message("Export cancelled");
        self.transition(SessionState::Uninitialized);
        Ok(())
    }

    /// Create the session from a finished description and start it
    pub fn create_session(&mut self, description: &RenderDescription) -> Result<(), SessionError> {
        self.require("create a session", &[SessionState::Exporting])?;

        let session = match self.engine.create_session(description) {
            Ok(session) => session,
            Err(err) => return Err(self.fail("create session", err)),
        };
        self.session = Some(session);
        self.call("start", EngineSession::start)?;

        self.timer = SamplingTimer::started();
        self.status.set_message("Rendering");
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Open an edit bracket; sampling is suspended until [`Self::end_edit`]
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        self.require("begin an edit", &[SessionState::Running, SessionState::Paused])?;
        self.call("begin scene edit", EngineSession::begin_scene_edit)?;
        self.transition(SessionState::Editing);
        Ok(())
    }

    /// Apply scene statements inside the open bracket
    pub fn apply(&mut self, props: &Properties) -> Result<(), SessionError> {
        self.require("apply scene edits", &[SessionState::Editing])?;
        log::debug!("Applying {} scene statements", props.len());
        self.call("parse scene", |s| s.parse_scene(props))
    }

    /// Commit the bracket and resume sampling from scratch
    pub fn end_edit(&mut self) -> Result<(), SessionError> {
        self.require("end an edit", &[SessionState::Editing])?;
        self.call("end scene edit", EngineSession::end_scene_edit)?;
        self.restart_timer();
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Hot-swap camera statements without an edit bracket
    ///
    /// A camera move restarts convergence, so a paused viewport resumes.
    pub fn update_camera(&mut self, props: &Properties) -> Result<(), SessionError> {
        self.require("update the camera", &[SessionState::Running, SessionState::Paused])?;
        self.call("update camera", |s| s.update_camera(props))?;
        if self.state == SessionState::Paused {
            self.call("resume", EngineSession::resume)?;
        }
        self.restart_timer();
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Replace image pipeline settings; does not restart sampling
    pub fn update_image_pipeline(&mut self, props: &Properties) -> Result<(), SessionError> {
        self.require(
            "update the image pipeline",
            &[SessionState::Running, SessionState::Paused, SessionState::Stopping],
        )?;
        self.call("update image pipeline", |s| s.update_image_pipeline(props))
    }

    /// Suspend sampling (user request)
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused => Ok(()),
            SessionState::Running => {
                self.call("pause", EngineSession::pause)?;
                self.timer.pause();
                self.transition(SessionState::Paused);
                Ok(())
            }
            _ => Err(self.invalid("pause")),
        }
    }

    /// Continue sampling after a pause
    ///
    /// The viewport halt time counts again from zero. Halt conditions the
    /// current statistics already meet are ignored until sampling restarts,
    /// so a render resumed after halting keeps running.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Running => Ok(()),
            SessionState::Paused => {
                self.call("resume", EngineSession::resume)?;
                self.halt_reason = None;
                self.spent = self.halt.satisfied(&self.stats).collect();
                if !self.spent.is_empty() {
                    log::debug!("Resumed past halt conditions: {:?}", self.spent);
                }
                self.timer.restart();
                self.transition(SessionState::Running);
                Ok(())
            }
            _ => Err(self.invalid("resume")),
        }
    }

    /// Pull fresh statistics from the engine
    ///
    /// Not allowed while an edit bracket is open.
    pub fn poll_stats(&mut self) -> Result<&RenderStats, SessionError> {
        self.require(
            "poll statistics",
            &[SessionState::Running, SessionState::Paused, SessionState::Stopping],
        )?;
        let props = self.call("update stats", |s| {
            s.update_stats()?;
            Ok(s.stats())
        })?;
        self.stats = RenderStats::from_properties(&props);
        Ok(&self.stats)
    }

    /// Pull the current frame; not allowed while an edit bracket is open
    pub fn framebuffer(&mut self) -> Result<Framebuffer, SessionError> {
        self.require(
            "pull the frame buffer",
            &[SessionState::Running, SessionState::Paused, SessionState::Stopping],
        )?;
        self.call("get frame buffer", EngineSession::framebuffer)
    }

    /// Evaluate halt conditions against the last polled statistics
    ///
    /// Only acts while `Running`. A final render moves to `Stopping` (pull the
    /// last frame, then call [`Self::stop`]); a viewport render pauses.
    pub fn check_halt(&mut self) -> Result<Option<HaltReason>, SessionError> {
        if self.state != SessionState::Running {
            return Ok(None);
        }

        let reason = self
            .halt
            .satisfied(&self.stats)
            .find(|reason| !self.spent.contains(reason))
            .or_else(|| match (self.mode, self.viewport_halt_time) {
                (RenderMode::Viewport, Some(limit)) if self.timer.elapsed() >= limit => {
                    Some(HaltReason::ViewportTime)
                }
                _ => None,
            });
        let Some(reason) = reason else {
            return Ok(None);
        };

        log::info!("Halt condition met: {reason} ({})", self.stats.summary());
        self.halt_reason = Some(reason);
        match self.mode {
            RenderMode::Final => {
                self.timer.pause();
                self.status.set_message(format!("Finishing: {reason}"));
                self.transition(SessionState::Stopping);
            }
            RenderMode::Viewport => {
                self.call("pause", EngineSession::pause)?;
                self.timer.pause();
                self.status.set_message(format!("Paused: {reason}"));
                self.transition(SessionState::Paused);
            }
        }
        Ok(Some(reason))
    }

    /// Stop the render and release the session
    ///
    /// Idempotent: stopping an idle, stopped or errored controller does
    /// nothing. Stopping during an export abandons it.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uninitialized | SessionState::Stopped | SessionState::Errored => Ok(()),
            SessionState::Exporting => self.abort_export(),
            SessionState::Running | SessionState::Editing | SessionState::Paused | SessionState::Stopping => {
                self.transition(SessionState::Stopping);
                self.call("stop", EngineSession::stop)?;
                self.session = None;
                self.timer.pause();
                self.status.set_message(format!("Stopped ({})", self.stats.summary()));
                self.transition(SessionState::Stopped);
                Ok(())
            }
        }
    }

    /// Sampling starts over: statistics and halt bookkeeping are stale
    fn restart_timer(&mut self) {
        self.halt_reason = None;
        self.spent.clear();
        self.stats = RenderStats::default();
        let sampled = self.timer.restart();
        log::debug!("Sampling restarted after {:.2}s", sampled.as_secs_f32());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> RenderDescription {
        let mut description = RenderDescription::default();
        description.config.set_key("film.width", 8);
        description.config.set_key("film.height", 4);
        description
    }

    fn running(mode: RenderMode, halt: HaltConditions) -> SessionController<SimulatedEngine> {
        let mut controller = SessionController::new(SimulatedEngine::default(), mode, halt);
        controller.begin_export().unwrap();
        controller.create_session(&description()).unwrap();
        controller
    }

    #[test]
    fn test_full_lifecycle() {
        let mut controller = SessionController::new(SimulatedEngine::default(), RenderMode::Final, HaltConditions::default());
        assert_eq!(controller.state(), SessionState::Uninitialized);
        controller.begin_export().unwrap();
        assert_eq!(controller.state(), SessionState::Exporting);
        controller.create_session(&description()).unwrap();
        assert_eq!(controller.state(), SessionState::Running);
        assert!(controller.session().unwrap().is_started());

        controller.stop().unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(controller.session().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut controller = running(RenderMode::Final, HaltConditions::default());
        controller.stop().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);

        let mut idle = SessionController::new(SimulatedEngine::default(), RenderMode::Final, HaltConditions::default());
        idle.stop().unwrap();
        assert_eq!(idle.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_nested_begin_edit_is_usage_error() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::default());
        controller.begin_edit().unwrap();
        let err = controller.begin_edit().unwrap_err();
        assert!(err.is_usage_error());
        assert_eq!(controller.state(), SessionState::Editing);

        controller.end_edit().unwrap();
        assert_eq!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_no_pulls_inside_edit_bracket() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::default());
        controller.begin_edit().unwrap();
        assert_eq!(
            controller.poll_stats().unwrap_err(),
            SessionError::InvalidState {
                op: "poll statistics",
                state: SessionState::Editing,
            }
        );
        assert!(controller.framebuffer().unwrap_err().is_usage_error());
    }

    #[test]
    fn test_apply_outside_bracket_is_usage_error() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::default());
        assert!(controller.apply(&Properties::new()).unwrap_err().is_usage_error());
    }

    #[test]
    fn test_create_requires_exporting() {
        let mut controller = SessionController::new(SimulatedEngine::default(), RenderMode::Final, HaltConditions::default());
        let err = controller.create_session(&description()).unwrap_err();
        assert!(err.is_usage_error());
        assert!(controller.session().is_none());
    }

    #[test]
    fn test_stats_are_zero_right_after_start() {
        let mut controller = running(RenderMode::Final, HaltConditions::default());
        assert_eq!(controller.poll_stats().unwrap().samples, 0);
        assert!(controller.poll_stats().unwrap().samples > 0);
    }

    #[test]
    fn test_sample_halt_moves_final_render_to_stopping() {
        let engine = SimulatedEngine::new(SimulatedConfig {
            samples_per_update: 8,
            ..Default::default()
        });
        let mut controller = SessionController::new(engine, RenderMode::Final, HaltConditions::samples(32));
        controller.begin_export().unwrap();
        controller.create_session(&description()).unwrap();

        for expected in [0, 8, 16, 24] {
            assert_eq!(controller.poll_stats().unwrap().samples, expected);
            assert_eq!(controller.check_halt().unwrap(), None);
            assert_eq!(controller.state(), SessionState::Running);
        }
        assert_eq!(controller.poll_stats().unwrap().samples, 32);
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::Samples));
        assert_eq!(controller.state(), SessionState::Stopping);

        // The final frame can still be pulled before stopping
        assert!(controller.framebuffer().is_ok());
        controller.stop().unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);
    }

    #[test]
    fn test_viewport_halt_pauses() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::samples(1));
        controller.poll_stats().unwrap();
        controller.poll_stats().unwrap();
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::Samples));
        assert_eq!(controller.state(), SessionState::Paused);
        assert!(controller.session().unwrap().is_paused());

        // A camera move restarts sampling
        controller.update_camera(&Properties::new()).unwrap();
        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(controller.halt_reason(), None);
    }

    #[test]
    fn test_viewport_halt_time_pauses() {
        let mut controller = SessionController::new(SimulatedEngine::default(), RenderMode::Viewport, HaltConditions::default())
            .with_viewport_halt_time(Duration::ZERO);
        controller.begin_export().unwrap();
        controller.create_session(&description()).unwrap();
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::ViewportTime));
        assert_eq!(controller.state(), SessionState::Paused);
    }

    #[test]
    fn test_resume_after_sample_halt_keeps_running() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::samples(1));
        controller.poll_stats().unwrap();
        controller.poll_stats().unwrap();
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::Samples));

        controller.resume().unwrap();
        for _ in 0..3 {
            controller.poll_stats().unwrap();
            assert_eq!(controller.check_halt().unwrap(), None);
            assert_eq!(controller.state(), SessionState::Running);
        }

        // An edit restarts sampling, so the limit applies again
        controller.begin_edit().unwrap();
        controller.end_edit().unwrap();
        controller.poll_stats().unwrap();
        controller.poll_stats().unwrap();
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::Samples));
    }

    #[test]
    fn test_resume_after_viewport_time_halt_keeps_running() {
        let mut controller = SessionController::new(SimulatedEngine::default(), RenderMode::Viewport, HaltConditions::default())
            .with_viewport_halt_time(Duration::from_millis(200));
        controller.begin_export().unwrap();
        controller.create_session(&description()).unwrap();
        std::thread::sleep(Duration::from_millis(210));
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::ViewportTime));
        assert_eq!(controller.state(), SessionState::Paused);

        controller.resume().unwrap();
        assert!(controller.elapsed() < Duration::from_millis(200));
        controller.poll_stats().unwrap();
        assert_eq!(controller.check_halt().unwrap(), None);
        assert_eq!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_restart_discards_stale_stats() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::samples(8));
        for _ in 0..3 {
            controller.poll_stats().unwrap();
        }
        assert_eq!(controller.stats().samples, 8);

        controller.begin_edit().unwrap();
        controller.end_edit().unwrap();
        assert_eq!(controller.stats().samples, 0);
        assert_eq!(controller.check_halt().unwrap(), None);

        for _ in 0..3 {
            controller.poll_stats().unwrap();
        }
        controller.update_camera(&Properties::new()).unwrap();
        assert_eq!(controller.check_halt().unwrap(), None);
        assert_eq!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_new_halt_conditions_apply_after_resume() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::samples(1));
        controller.poll_stats().unwrap();
        controller.poll_stats().unwrap();
        controller.check_halt().unwrap();
        controller.resume().unwrap();
        assert_eq!(controller.check_halt().unwrap(), None);

        controller.set_halt_conditions(HaltConditions::samples(2));
        controller.poll_stats().unwrap();
        assert_eq!(controller.check_halt().unwrap(), Some(HaltReason::Samples));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut controller = running(RenderMode::Viewport, HaltConditions::default());
        controller.pause().unwrap();
        controller.pause().unwrap();
        assert_eq!(controller.state(), SessionState::Paused);
        controller.begin_edit().unwrap();
        controller.end_edit().unwrap();
        assert_eq!(controller.state(), SessionState::Running);
        controller.pause().unwrap();
        controller.resume().unwrap();
        assert_eq!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_engine_failure_moves_to_errored() {
        let engine = SimulatedEngine::new(SimulatedConfig {
            fail_on: Some(EngineCall::EndEdit),
            ..Default::default()
        });
        let mut controller = SessionController::new(engine, RenderMode::Viewport, HaltConditions::default());
        controller.begin_export().unwrap();
        controller.create_session(&description()).unwrap();
        controller.begin_edit().unwrap();

        let err = controller.end_edit().unwrap_err();
        assert!(!err.is_usage_error());
        assert_eq!(controller.state(), SessionState::Errored);
        assert!(controller.session().is_none());
        assert!(controller.log().has_errors());
        assert!(controller.status().error.is_some());

        // Recovery requires a new full export
        assert!(controller.begin_edit().unwrap_err().is_usage_error());
        controller.begin_export().unwrap();
        assert!(controller.log().is_empty());
    }

    #[test]
    fn test_create_failure_leaves_no_session() {
        let engine = SimulatedEngine::new(SimulatedConfig {
            fail_on: Some(EngineCall::Create),
            ..Default::default()
        });
        let mut controller = SessionController::new(engine, RenderMode::Final, HaltConditions::default());
        controller.begin_export().unwrap();
        assert!(controller.create_session(&description()).is_err());
        assert_eq!(controller.state(), SessionState::Errored);
        assert!(controller.session().is_none());
    }
}
