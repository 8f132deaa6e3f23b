//! Per-pass memoization of exported node names

use std::collections::HashMap;

use super::graph::{GraphId, NodeId};

/// Identity of a node across the whole graph library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    /// Owning graph
    pub(crate) graph: GraphId,
    /// Node inside that graph
    pub(crate) node: NodeId,
}

impl CacheKey {
    /// Create a key
    pub(crate) fn new(graph: GraphId, node: NodeId) -> Self {
        Self { graph, node }
    }
}

/// Maps already exported nodes to the name downstream consumers must use.
///
/// Lives for exactly one top-level export and is never shared between
/// passes, so stale names cannot leak into a later export.
#[derive(Debug, Default)]
pub(crate) struct ExportCache {
    names: HashMap<CacheKey, String>,
}

impl ExportCache {
    /// Create an empty cache
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Name recorded for a node
    pub(crate) fn get(&self, key: CacheKey) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Record the exported name of a node
    pub(crate) fn insert(&mut self, key: CacheKey, name: String) {
        self.names.insert(key, name);
    }

    /// Number of memoized nodes
    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }
}
