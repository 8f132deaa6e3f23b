//! Engine abstraction traits
//!
//! The external renderer is reached only through these traits. All calls are
//! short and blocking; the engine renders on its own threads between calls.

use crate::display::Framebuffer;
use crate::props::Properties;

/// Engine-side failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected the render description
    #[error("Failed to create render session: {0}")]
    Create(String),

    /// A session call failed
    #[error("Engine call '{call}' failed: {message}")]
    Call {
        /// Name of the failing call
        call: &'static str,
        /// Engine message
        message: String,
    },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Complete input of a render session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderDescription {
    /// Engine and film configuration
    pub config: Properties,
    /// Scene entities, ordered so nothing is referenced before it is defined
    pub scene: Properties,
}

impl RenderDescription {
    /// Both statement sets as one text document, config first
    pub fn to_text(&self) -> String {
        format!("{}{}", self.config.to_text(), self.scene.to_text())
    }
}

/// Factory for render sessions
pub trait RenderEngine {
    /// Session handle type
    type Session: EngineSession;

    /// Parse a description and create a session (not yet started)
    fn create_session(&mut self, description: &RenderDescription) -> EngineResult<Self::Session>;
}

/// A live render inside the engine
pub trait EngineSession {
    /// Start rendering
    fn start(&mut self) -> EngineResult<()>;

    /// Stop rendering and release engine resources
    fn stop(&mut self) -> EngineResult<()>;

    /// Suspend sampling
    fn pause(&mut self) -> EngineResult<()>;

    /// Continue sampling after [`EngineSession::pause`]
    fn resume(&mut self) -> EngineResult<()>;

    /// Open an edit bracket; sampling is suspended until it is closed
    fn begin_scene_edit(&mut self) -> EngineResult<()>;

    /// Commit the bracket's edits and restart sampling
    fn end_scene_edit(&mut self) -> EngineResult<()>;

    /// Apply scene statements (only valid inside an edit bracket)
    fn parse_scene(&mut self, props: &Properties) -> EngineResult<()>;

    /// Swap camera statements without an edit bracket
    fn update_camera(&mut self, props: &Properties) -> EngineResult<()>;

    /// Replace image pipeline settings of the running film
    fn update_image_pipeline(&mut self, props: &Properties) -> EngineResult<()>;

    /// Refresh the statistics returned by [`EngineSession::stats`]
    fn update_stats(&mut self) -> EngineResult<()>;

    /// Statistics captured by the last [`EngineSession::update_stats`]
    fn stats(&self) -> Properties;

    /// Copy out the current tonemapped frame
    fn framebuffer(&mut self) -> EngineResult<Framebuffer>;
}
