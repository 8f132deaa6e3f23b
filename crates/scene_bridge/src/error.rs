//! Crate-level error type

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::nodes::NodeError;
use crate::props::PropertyError;
use crate::session::{EngineError, SessionError};

/// Any error the bridge can report to its host
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// Property text could not be parsed
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// Invalid node graph edit
    #[error("Node graph error: {0}")]
    Node(#[from] NodeError),

    /// Export failed
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Session misuse or engine failure
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Engine failure outside a controller
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Settings could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
