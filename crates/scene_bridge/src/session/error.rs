//! Session controller errors

use super::engine::EngineError;
use super::SessionState;

/// Session controller errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Operation not allowed in the current state (a usage error)
    #[error("Cannot {op} while the session is {state}")]
    InvalidState {
        /// Attempted operation
        op: &'static str,
        /// State at the time of the call
        state: SessionState,
    },

    /// The engine failed; the controller is now `Errored`
    #[error("Render engine error during {op}: {source}")]
    Engine {
        /// Operation that failed
        op: &'static str,
        /// Engine error
        #[source]
        source: EngineError,
    },
}

impl SessionError {
    /// Whether this is a caller mistake rather than an engine failure
    pub fn is_usage_error(&self) -> bool {
        matches!(self, SessionError::InvalidState { .. })
    }
}
