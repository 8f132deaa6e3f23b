//! Rate-limited refresh loop
//!
//! The host calls [`DisplayRefresher::tick`] (or [`DisplayRefresher::drive`])
//! from its timer and gets back what is due. Nothing here blocks or sleeps:
//! [`DisplayRefresher::next_wakeup`] tells the host when to call again.
//!
//! Right after start a fast phase checks for cancellation at a high rate so
//! aborting stays responsive. Statistics polling (cheap, catches halt
//! conditions) and frame pulls (expensive) then run on independent intervals.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::clamp::ClampSuggester;
use super::framebuffer::DisplaySurface;
use crate::session::{RenderEngine, RenderMode, SessionController, SessionError, SessionState};

bitflags::bitflags! {
    /// Work due on a tick
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RefreshActions: u8 {
        /// Ask the host whether the user cancelled
        const CHECK_CANCEL = 1 << 0;
        /// Poll statistics and evaluate halt conditions
        const POLL_STATS = 1 << 1;
        /// Pull and present the frame buffer
        const PULL_FRAME = 1 << 2;
    }
}

/// Refresh cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Length of the fast phase after start, in seconds
    pub fast_refresh_secs: f32,
    /// Cancellation checks per second during the fast phase
    pub fast_refresh_hz: f32,
    /// Seconds between statistics polls
    pub stats_interval_secs: f32,
    /// Seconds between frame pulls once the fast phase is over
    pub display_interval_secs: f32,
    /// Samples per pixel before the clamp suggestion is computed
    pub clamp_warmup_samples: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::final_render()
    }
}

impl RefreshSettings {
    /// Final render: short fast phase, coarse frame pulls
    pub fn final_render() -> Self {
        Self {
            fast_refresh_secs: 3.0,
            fast_refresh_hz: 60.0,
            stats_interval_secs: 1.0,
            display_interval_secs: 10.0,
            clamp_warmup_samples: 16,
        }
    }

    /// Viewport: frames are pulled almost as often as statistics
    pub fn viewport() -> Self {
        Self {
            fast_refresh_secs: 1.0,
            fast_refresh_hz: 60.0,
            stats_interval_secs: 0.5,
            display_interval_secs: 0.2,
            clamp_warmup_samples: 16,
        }
    }

    fn fast_duration(&self) -> Duration {
        secs(self.fast_refresh_secs)
    }

    fn cancel_interval(&self) -> Duration {
        if self.fast_refresh_hz > 0.0 {
            secs(1.0 / self.fast_refresh_hz)
        } else {
            self.stats_interval()
        }
    }

    fn stats_interval(&self) -> Duration {
        secs(self.stats_interval_secs)
    }

    fn display_interval(&self) -> Duration {
        secs(self.display_interval_secs)
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Which cadence is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// High-frequency cancellation checks right after start
    Fast,
    /// Regular intervals
    Steady,
}

/// Outcome of one [`DisplayRefresher::drive`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStatus {
    /// Nothing was due
    Idle,
    /// The render is progressing
    Rendering,
    /// The render is paused (viewport halt or user pause)
    Paused,
    /// The final render halted; its last frame was presented and the session stopped
    Finished,
    /// The user cancelled; the session was stopped
    Cancelled,
    /// The engine failed; the controller needs a new full export
    Failed,
}

/// Decides when to check cancellation, poll statistics and pull frames
#[derive(Debug, Clone)]
pub struct DisplayRefresher {
    settings: RefreshSettings,
    started_at: Option<Instant>,
    last_cancel_check: Option<Instant>,
    last_stats: Option<Instant>,
    last_frame: Option<Instant>,
    frames_presented: u32,
    clamp: ClampSuggester,
}

impl DisplayRefresher {
    /// Refresher with the given cadence; the clock starts on the first tick
    pub fn new(settings: RefreshSettings) -> Self {
        let clamp = ClampSuggester::new(settings.clamp_warmup_samples);
        Self {
            settings,
            started_at: None,
            last_cancel_check: None,
            last_stats: None,
            last_frame: None,
            frames_presented: 0,
            clamp,
        }
    }

    /// Restart the cadence (new session or restarted sampling)
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.last_cancel_check = None;
        self.last_stats = None;
        self.last_frame = Some(now);
        self.clamp.reset();
    }

    /// Cadence settings
    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Active phase at `now`
    pub fn phase(&self, now: Instant) -> RefreshPhase {
        match self.started_at {
            Some(start) if now.saturating_duration_since(start) >= self.settings.fast_duration() => {
                RefreshPhase::Steady
            }
            _ => RefreshPhase::Fast,
        }
    }

    /// Frames handed to the display surface so far
    pub fn frames_presented(&self) -> u32 {
        self.frames_presented
    }

    /// Advisory clamp value, once computed
    pub fn clamp_suggestion(&self) -> Option<f32> {
        self.clamp.suggestion()
    }

    fn frame_interval(&self, phase: RefreshPhase) -> Duration {
        match phase {
            // Show a first image early instead of waiting a whole display interval
            RefreshPhase::Fast => self.settings.display_interval().min(self.settings.stats_interval()),
            RefreshPhase::Steady => self.settings.display_interval(),
        }
    }

    fn due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
        last.map_or(true, |t| now.saturating_duration_since(t) >= interval)
    }

    /// Work due at `now`; marks it as done
    pub fn tick(&mut self, now: Instant) -> Option<RefreshActions> {
        if self.started_at.is_none() {
            self.start(now);
        }
        let phase = self.phase(now);
        let mut actions = RefreshActions::empty();

        if Self::due(self.last_stats, self.settings.stats_interval(), now) {
            actions |= RefreshActions::POLL_STATS | RefreshActions::CHECK_CANCEL;
        }
        if phase == RefreshPhase::Fast && Self::due(self.last_cancel_check, self.settings.cancel_interval(), now) {
            actions |= RefreshActions::CHECK_CANCEL;
        }
        if Self::due(self.last_frame, self.frame_interval(phase), now) {
            actions |= RefreshActions::PULL_FRAME;
        }

        if actions.contains(RefreshActions::CHECK_CANCEL) {
            self.last_cancel_check = Some(now);
        }
        if actions.contains(RefreshActions::POLL_STATS) {
            self.last_stats = Some(now);
        }
        if actions.contains(RefreshActions::PULL_FRAME) {
            self.last_frame = Some(now);
        }

        (!actions.is_empty()).then_some(actions)
    }

    /// When the next action becomes due
    pub fn next_wakeup(&self, now: Instant) -> Instant {
        let Some(start) = self.started_at else {
            return now;
        };
        let phase = self.phase(now);
        let next = |last: Option<Instant>, interval: Duration| last.map_or(now, |t| t + interval);

        let mut wakeup = next(self.last_stats, self.settings.stats_interval())
            .min(next(self.last_frame, self.frame_interval(phase)));
        if phase == RefreshPhase::Fast {
            let cancel = next(self.last_cancel_check, self.settings.cancel_interval());
            // The fast phase ends at a fixed time; frame cadence changes then
            wakeup = wakeup.min(cancel).min(start + self.settings.fast_duration());
        }
        wakeup.max(now)
    }

    /// Perform whatever is due against the controller and display surface
    ///
    /// Statistics and frames are never pulled while an edit bracket is open.
    /// A final render that meets its halt condition has its last frame
    /// presented and is stopped here. An errored controller reports
    /// [`DriveStatus::Failed`]; one without a session yet reports `Idle`.
    pub fn drive<E: RenderEngine>(
        &mut self,
        now: Instant,
        controller: &mut SessionController<E>,
        surface: &mut dyn DisplaySurface,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<DriveStatus, SessionError> {
        let Some(actions) = self.tick(now) else {
            return Ok(DriveStatus::Idle);
        };

        if actions.contains(RefreshActions::CHECK_CANCEL) && cancel() {
            log::info!("Render cancelled by user");
            controller.stop()?;
            return Ok(DriveStatus::Cancelled);
        }

        match controller.state() {
            SessionState::Running | SessionState::Paused | SessionState::Stopping => {}
            SessionState::Uninitialized | SessionState::Exporting | SessionState::Editing => {
                return Ok(DriveStatus::Idle)
            }
            SessionState::Stopped => return Ok(DriveStatus::Finished),
            SessionState::Errored => return Ok(DriveStatus::Failed),
        }

        let mut halted = false;
        if actions.contains(RefreshActions::POLL_STATS) {
            controller.poll_stats()?;
            let stats = controller.stats();
            let status = match controller.halt_conditions().progress(stats) {
                Some(done) => format!("{} | Progress: {:.0}%", stats.summary(), done * 100.0),
                None => stats.summary(),
            };
            surface.set_status(&status);
            halted = controller.check_halt()?.is_some();
        }

        let finishing = controller.state() == SessionState::Stopping && controller.mode() == RenderMode::Final;
        let pull = finishing || halted || (actions.contains(RefreshActions::PULL_FRAME) && controller.state() == SessionState::Running);
        if pull {
            let frame = controller.framebuffer()?;
            self.clamp.observe(&frame, controller.stats().samples);
            surface.present(&frame);
            self.frames_presented += 1;
        }

        if finishing {
            controller.stop()?;
            return Ok(DriveStatus::Finished);
        }
        Ok(match controller.state() {
            SessionState::Paused => DriveStatus::Paused,
            _ => DriveStatus::Rendering,
        })
    }
}
