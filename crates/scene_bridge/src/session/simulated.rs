//! Deterministic in-process engine
//!
//! Stands in for the external renderer in tests and the demo. Rendering
//! progresses by a fixed number of samples per statistics refresh: each
//! `update_stats` publishes the current counters and then advances them, so
//! the first poll after `start` reports zero samples.

use super::engine::{EngineError, EngineResult, EngineSession, RenderDescription, RenderEngine};
use crate::display::Framebuffer;
use crate::props::Properties;

/// Engine entry points, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    /// `create_session`
    Create,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `pause`
    Pause,
    /// `resume`
    Resume,
    /// `begin_scene_edit`
    BeginEdit,
    /// `end_scene_edit`
    EndEdit,
    /// `parse_scene`
    ParseScene,
    /// `update_camera`
    UpdateCamera,
    /// `update_image_pipeline`
    UpdateImagePipeline,
    /// `update_stats`
    UpdateStats,
    /// `framebuffer`
    Framebuffer,
}

impl EngineCall {
    fn name(self) -> &'static str {
        match self {
            EngineCall::Create => "create_session",
            EngineCall::Start => "start",
            EngineCall::Stop => "stop",
            EngineCall::Pause => "pause",
            EngineCall::Resume => "resume",
            EngineCall::BeginEdit => "begin_scene_edit",
            EngineCall::EndEdit => "end_scene_edit",
            EngineCall::ParseScene => "parse_scene",
            EngineCall::UpdateCamera => "update_camera",
            EngineCall::UpdateImagePipeline => "update_image_pipeline",
            EngineCall::UpdateStats => "update_stats",
            EngineCall::Framebuffer => "framebuffer",
        }
    }
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedConfig {
    /// Samples per pixel rendered between two statistics refreshes
    pub samples_per_update: u32,
    /// Seconds of render time between two statistics refreshes
    pub seconds_per_update: f32,
    /// Call that fails with an engine error
    pub fail_on: Option<EngineCall>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            samples_per_update: 4,
            seconds_per_update: 0.25,
            fail_on: None,
        }
    }
}

/// Factory for [`SimulatedSession`]s
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    config: SimulatedConfig,
    sessions_created: u32,
}

impl SimulatedEngine {
    /// Engine with the given simulation parameters
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            sessions_created: 0,
        }
    }

    /// Number of sessions created so far
    pub fn sessions_created(&self) -> u32 {
        self.sessions_created
    }
}

impl RenderEngine for SimulatedEngine {
    type Session = SimulatedSession;

    fn create_session(&mut self, description: &RenderDescription) -> EngineResult<SimulatedSession> {
        if self.config.fail_on == Some(EngineCall::Create) {
            return Err(EngineError::Create("simulated failure".to_string()));
        }
        let config = &description.config;
        let width = u32::try_from(config.get_i64("film.width", 64)).unwrap_or(64);
        let height = u32::try_from(config.get_i64("film.height", 48)).unwrap_or(48);
        if width == 0 || height == 0 {
            return Err(EngineError::Create(format!("invalid film size {width}x{height}")));
        }

        self.sessions_created += 1;
        log::debug!(
            "Simulated session #{} created: {}x{}, {} scene statements",
            self.sessions_created,
            width,
            height,
            description.scene.len()
        );

        Ok(SimulatedSession {
            config: self.config.clone(),
            description: description.clone(),
            width,
            height,
            bidirectional: config.get_str("renderengine.type") == Some("BIDIRCPU"),
            noise_threshold: config
                .contains("batch.haltnoisethreshold")
                .then(|| config.get_f32("batch.haltnoisethreshold", 0.0)),
            noise_warmup: u32::try_from(config.get_i64("film.noiseestimation.warmup", 32)).unwrap_or(32),
            noise_step: u32::try_from(config.get_i64("film.noiseestimation.step", 32)).unwrap_or(32).max(1),
            started: false,
            paused: false,
            editing: false,
            stopped: false,
            pass: 0,
            time: 0.0,
            convergence: 0.0,
            published: Properties::new(),
            edits: 0,
            camera_updates: 0,
        })
    }
}

/// A simulated render
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    config: SimulatedConfig,
    description: RenderDescription,
    width: u32,
    height: u32,
    bidirectional: bool,
    noise_threshold: Option<f32>,
    noise_warmup: u32,
    noise_step: u32,
    started: bool,
    paused: bool,
    editing: bool,
    stopped: bool,
    pass: u32,
    time: f32,
    convergence: f32,
    published: Properties,
    edits: u32,
    camera_updates: u32,
}

impl SimulatedSession {
    /// Whether `start` was called and the session was not stopped
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether sampling is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether an edit bracket is open
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// The session's current scene statements, including applied edits
    pub fn scene(&self) -> &Properties {
        &self.description.scene
    }

    /// The session's current configuration
    pub fn config(&self) -> &Properties {
        &self.description.config
    }

    /// Number of scene edits applied
    pub fn edit_count(&self) -> u32 {
        self.edits
    }

    /// Number of camera hot-swaps
    pub fn camera_updates(&self) -> u32 {
        self.camera_updates
    }

    /// Samples per pixel rendered so far
    pub fn pass(&self) -> u32 {
        self.pass
    }

    fn check(&self, call: EngineCall) -> EngineResult<()> {
        if self.config.fail_on == Some(call) {
            return Err(EngineError::Call {
                call: call.name(),
                message: "simulated failure".to_string(),
            });
        }
        if self.stopped && call != EngineCall::Stop {
            return Err(EngineError::Call {
                call: call.name(),
                message: "session already stopped".to_string(),
            });
        }
        Ok(())
    }

    fn sampling(&self) -> bool {
        self.started && !self.paused && !self.editing && !self.stopped
    }

    fn restart(&mut self) {
        self.pass = 0;
        self.time = 0.0;
        self.convergence = 0.0;
    }

    fn advance(&mut self) {
        self.pass += self.config.samples_per_update;
        self.time += self.config.seconds_per_update;

        if let Some(threshold) = self.noise_threshold {
            if self.pass >= self.noise_warmup {
                // Noise is only re-estimated every `noise_step` samples
                let measured = self.pass - (self.pass - self.noise_warmup) % self.noise_step;
                let noise = 1.0 / (measured.max(1) as f32).sqrt();
                self.convergence = (threshold / noise).min(1.0);
            }
        }
    }

    fn publish(&mut self) {
        let mut stats = Properties::new();
        stats.set_key("stats.renderengine.time", self.time);
        stats.set_key("stats.renderengine.pass", self.pass);
        stats.set_key("stats.renderengine.pass.eye", self.pass);
        stats.set_key(
            "stats.renderengine.pass.light",
            if self.bidirectional { self.pass } else { 0 },
        );
        stats.set_key("stats.renderengine.convergence", self.convergence);
        let pixels = self.width as f32 * self.height as f32;
        let rate = if self.time > 0.0 { self.pass as f32 * pixels / self.time } else { 0.0 };
        stats.set_key("stats.renderengine.total.samplesec", rate);

        let film_bytes = i64::from(self.width) * i64::from(self.height) * 16;
        let scene_bytes = i64::try_from(self.description.scene.len()).unwrap_or(0) * 256;
        stats.set_key("stats.devices.NativeCPU.memory.used", film_bytes + scene_bytes);
        stats.set_key("stats.devices.NativeCPU.memory.total", 8_i64 * 1024 * 1024 * 1024);
        self.published = stats;
    }
}

impl EngineSession for SimulatedSession {
    fn start(&mut self) -> EngineResult<()> {
        self.check(EngineCall::Start)?;
        self.started = true;
        self.restart();
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.check(EngineCall::Stop)?;
        self.started = false;
        self.stopped = true;
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.check(EngineCall::Pause)?;
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.check(EngineCall::Resume)?;
        self.paused = false;
        Ok(())
    }

    fn begin_scene_edit(&mut self) -> EngineResult<()> {
        self.check(EngineCall::BeginEdit)?;
        self.editing = true;
        Ok(())
    }

    fn end_scene_edit(&mut self) -> EngineResult<()> {
        self.check(EngineCall::EndEdit)?;
        self.editing = false;
        self.paused = false;
        self.restart();
        Ok(())
    }

    fn parse_scene(&mut self, props: &Properties) -> EngineResult<()> {
        self.check(EngineCall::ParseScene)?;
        if !self.editing {
            return Err(EngineError::Call {
                call: EngineCall::ParseScene.name(),
                message: "scene edits require an open edit".to_string(),
            });
        }
        self.description.scene.merge(props);
        self.edits += 1;
        Ok(())
    }

    fn update_camera(&mut self, props: &Properties) -> EngineResult<()> {
        self.check(EngineCall::UpdateCamera)?;
        self.description.scene.merge(props);
        self.camera_updates += 1;
        self.restart();
        Ok(())
    }

    fn update_image_pipeline(&mut self, props: &Properties) -> EngineResult<()> {
        self.check(EngineCall::UpdateImagePipeline)?;
        self.description.config.merge(props);
        Ok(())
    }

    fn update_stats(&mut self) -> EngineResult<()> {
        self.check(EngineCall::UpdateStats)?;
        self.publish();
        if self.sampling() {
            self.advance();
        }
        Ok(())
    }

    fn stats(&self) -> Properties {
        self.published.clone()
    }

    fn framebuffer(&mut self) -> EngineResult<Framebuffer> {
        self.check(EngineCall::Framebuffer)?;
        let mut frame = Framebuffer::new(self.width, self.height);
        let progress = self.pass as f32 / (self.pass as f32 + 8.0);

        for y in 0..self.height {
            for x in 0..self.width {
                let u = (x as f32 + 0.5) / self.width as f32;
                let v = (y as f32 + 0.5) / self.height as f32;
                let index = y * self.width + x;
                // Sparse fireflies, as unclamped path tracing produces
                let spike = if index % 97 == 13 { 8.0 } else { 1.0 };
                frame.set_pixel(x, y, [u * progress * spike, v * progress * spike, 0.5 * progress, 1.0]);
            }
        }
        Ok(frame)
    }
}
