//! Export errors

use std::path::PathBuf;

use super::changes::ChangeFlags;
use crate::nodes::GraphKind;
use crate::session::SessionError;

/// Errors raised while compiling the scene
///
/// Graph-level variants never reach the caller of a full export: they are
/// replaced by a fallback entity plus a warning. Only session failures and
/// misuse of incremental export propagate.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    /// Graph id not present in the library
    #[error("Referenced node graph does not exist")]
    MissingGraph,

    /// Node id not present in its graph
    #[error("Referenced node does not exist in graph '{graph}'")]
    MissingNode {
        /// Graph name
        graph: String,
    },

    /// Graph has no active output node
    #[error("Node graph '{graph}' has no active output")]
    NoActiveOutput {
        /// Graph name
        graph: String,
    },

    /// The active output's input is not linked
    #[error("Output of node graph '{graph}' is not linked")]
    UnlinkedOutput {
        /// Graph name
        graph: String,
    },

    /// A socket that needs a linked node has none
    #[error("Socket '{socket}' must be linked")]
    UnlinkedSocket {
        /// Socket name
        socket: String,
    },

    /// Pointer node without a valid target graph
    #[error("Pointer node '{node}' does not reference a graph")]
    DanglingPointer {
        /// Node name
        node: String,
    },

    /// Node linked into a socket of a different kind
    #[error("Node '{node}' cannot be used where a {expected:?} is expected")]
    IncompatibleNode {
        /// Node name
        node: String,
        /// Kind the socket accepts
        expected: GraphKind,
    },

    /// Graph bound where a different kind is expected
    #[error("Node graph '{graph}' cannot be used where a {expected:?} is expected")]
    IncompatibleGraph {
        /// Graph name
        graph: String,
        /// Kind the binding accepts
        expected: GraphKind,
    },

    /// Image file referenced by a texture does not exist
    #[error("Image file not found: {}", path.display())]
    MissingImage {
        /// Path as given in the node
        path: PathBuf,
    },

    /// A node was reached again while its own inputs were being exported
    #[error("Cyclic node graph '{graph}': node '{node}' depends on itself")]
    CyclicGraph {
        /// Graph name
        graph: String,
        /// Node where the cycle was detected
        node: String,
    },

    /// Incremental export was asked to apply changes that need a new session
    #[error("Changes {0:?} require a full export")]
    RequiresFullExport(ChangeFlags),

    /// The render session failed or was misused
    #[error(transparent)]
    Session(#[from] SessionError),
}
