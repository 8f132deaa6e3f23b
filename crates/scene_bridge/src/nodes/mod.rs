//! Node graphs for materials, textures and volumes
//!
//! The editor authors appearance as typed node graphs. This module holds the
//! graph model ([`NodeGraph`], [`GraphLibrary`]), the closed set of node kinds
//! ([`NodeKind`]) and the export protocol that compiles a graph's active
//! output into property statements ([`export_graph`], [`ExportPass`]).

mod cache;
pub mod export;
pub mod graph;
pub mod kinds;

pub use export::{export_graph, fallback, graph_entity_name, ExportPass, ExportedValue, NodeInputs, NodeStatements};
pub use graph::{GraphId, GraphKind, GraphLibrary, Node, NodeError, NodeGraph, NodeId, Socket, SocketValue};
pub use kinds::{MaterialCommon, MaterialOutputSettings, MathOp, MixOp, NodeKind};
