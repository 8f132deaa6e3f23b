//! Recursive, memoized export of node graphs into property statements
//!
//! Output nodes are the only entry point. A pass walks the active output's
//! input chain depth-first so every entity is emitted before anything that
//! references it, memoizes node names so shared sub-graphs are emitted once,
//! and tracks the nodes currently on the stack to turn cycles into an error
//! instead of unbounded recursion.
//!
//! Failures never abort a render: [`export_graph`] replaces an unresolvable
//! graph with a fixed fallback entity and reports a warning.

use std::collections::HashSet;

use super::cache::{CacheKey, ExportCache};
use super::graph::{GraphId, GraphKind, GraphLibrary, NodeGraph, NodeId, Socket, SocketValue};
use super::kinds::NodeKind;
use crate::diagnostics::ErrorLog;
use crate::export::ExportError;
use crate::props::{qualified_name, sanitize_name, Properties, PropValue, LIBRARY_SEPARATOR, NODE_SEPARATOR};

/// Result of exporting one socket
#[derive(Debug, Clone, PartialEq)]
pub enum ExportedValue {
    /// Linked socket: name of the upstream entity
    Named(String),
    /// Unlinked socket: its default in engine encoding
    Literal(Vec<PropValue>),
    /// Unlinked socket without a default
    Unset,
}

impl ExportedValue {
    /// Values to write for this input, `None` when unset
    pub fn to_values(&self) -> Option<Vec<PropValue>> {
        match self {
            ExportedValue::Named(name) => Some(vec![PropValue::Str(name.clone())]),
            ExportedValue::Literal(values) => Some(values.clone()),
            ExportedValue::Unset => None,
        }
    }
}

/// Exported inputs of one node, by socket name
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: Vec<(String, ExportedValue)>,
}

impl NodeInputs {
    /// Record an exported input
    pub fn push(&mut self, socket: impl Into<String>, value: ExportedValue) {
        self.values.push((socket.into(), value));
    }

    /// Look up an input
    pub fn get(&self, socket: &str) -> Option<&ExportedValue> {
        self.values.iter().find(|(name, _)| name == socket).map(|(_, value)| value)
    }

    /// Values to write for an input, `None` when missing or unset
    pub fn values(&self, socket: &str) -> Option<Vec<PropValue>> {
        self.get(socket).and_then(ExportedValue::to_values)
    }
}

/// Auxiliary entity synthesized by a node (e.g. the clamp wrapper)
#[derive(Debug, Clone)]
pub struct HelperEntity {
    /// Name downstream consumers must reference instead of the node's own
    pub name: String,
    /// Statements of the helper, emitted after the node's own
    pub props: Properties,
}

/// Statements produced by one node
#[derive(Debug, Clone, Default)]
pub struct NodeStatements {
    /// The node's own entity
    pub own: Properties,
    /// Optional wrapper entity
    pub helper: Option<HelperEntity>,
}

/// One top-level export: cache, visitation stack and output buffer
pub struct ExportPass<'a> {
    library: &'a GraphLibrary,
    log: &'a mut ErrorLog,
    cache: ExportCache,
    visiting: HashSet<CacheKey>,
    emitted: Vec<String>,
    out: Properties,
}

impl<'a> ExportPass<'a> {
    /// Start a pass with an empty cache
    pub fn new(library: &'a GraphLibrary, log: &'a mut ErrorLog) -> Self {
        Self {
            library,
            log,
            cache: ExportCache::new(),
            visiting: HashSet::new(),
            emitted: Vec::new(),
            out: Properties::new(),
        }
    }

    /// Export the active output of a graph and finalize the resulting entity
    ///
    /// Returns the name downstream consumers reference. Output-specific fields
    /// are written under that entity rather than a new one.
    pub fn export_output(&mut self, graph_id: GraphId, assigned: Option<&str>) -> Result<String, ExportError> {
        let library = self.library;
        let graph = library.get(graph_id).ok_or(ExportError::MissingGraph)?;
        let name = assigned.map(str::to_string).unwrap_or_else(|| graph_entity_name(graph));

        let output_id = graph.active_output().ok_or_else(|| ExportError::NoActiveOutput {
            graph: graph.name.clone(),
        })?;
        let output = graph.node(output_id).ok_or_else(|| ExportError::NoActiveOutput {
            graph: graph.name.clone(),
        })?;
        if output.kind.output_kind() != Some(graph.kind) {
            return Err(ExportError::IncompatibleNode {
                node: output.name.clone(),
                expected: graph.kind,
            });
        }

        // Volumes are referenced by the material, so they go first
        let mut volume_fields = Vec::new();
        if let NodeKind::MaterialOutput(settings) = &output.kind {
            for (field, volume) in [
                ("volume.interior", settings.interior_volume),
                ("volume.exterior", settings.exterior_volume),
            ] {
                if let Some(volume) = volume {
                    let exported = export_graph(library, volume, &mut self.out, None, GraphKind::Volume, self.log);
                    volume_fields.push((field, exported));
                }
            }
        }

        let unlinked = || ExportError::UnlinkedOutput {
            graph: graph.name.clone(),
        };
        let socket = output.kind.output_socket().and_then(|s| output.input(s)).ok_or_else(unlinked)?;
        let link = socket.link.ok_or_else(unlinked)?;
        let exported = self.export_node(graph_id, link, Some(&name), graph.kind)?;

        if let NodeKind::MaterialOutput(settings) = &output.kind {
            let prefix = format!("{}.{exported}", graph.kind.namespace());
            if let Some(id) = settings.id {
                self.out.set(&prefix, "id", id);
            }
            self.out.set(&prefix, "shadowcatcher.enable", settings.shadow_catcher);
            self.out.set(&prefix, "holdout.enable", settings.holdout);
            self.out.set(&prefix, "photongi.enable", settings.use_photongi);
            for (field, volume) in volume_fields {
                self.out.set(&prefix, field, volume);
            }
        }

        Ok(exported)
    }

    /// Export one socket: linked sockets export their upstream node,
    /// unlinked ones yield their default value
    pub fn export_socket(&mut self, graph_id: GraphId, socket: &Socket) -> Result<ExportedValue, ExportError> {
        match socket.link {
            Some(upstream) => self
                .export_node(graph_id, upstream, None, socket.accepts)
                .map(ExportedValue::Named),
            None if socket.accepts != GraphKind::Texture => Err(ExportError::UnlinkedSocket {
                socket: socket.name.clone(),
            }),
            None if socket.default == SocketValue::None => Ok(ExportedValue::Unset),
            None => Ok(ExportedValue::Literal(socket.default.to_values())),
        }
    }

    /// Export a node and everything it depends on, at most once per pass
    pub fn export_node(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
        assigned: Option<&str>,
        expected: GraphKind,
    ) -> Result<String, ExportError> {
        let key = CacheKey::new(graph_id, node_id);
        if let Some(name) = self.cache.get(key) {
            return Ok(name.to_string());
        }

        if !self.visiting.insert(key) {
            let library = self.library;
            let graph = library.get(graph_id);
            return Err(ExportError::CyclicGraph {
                graph: graph.map(|g| g.name.clone()).unwrap_or_default(),
                node: graph
                    .and_then(|g| g.node(node_id))
                    .map(|n| n.name.clone())
                    .unwrap_or_default(),
            });
        }
        let result = self.export_uncached(graph_id, node_id, assigned, expected);
        self.visiting.remove(&key);

        let name = result?;
        self.cache.insert(key, name.clone());
        Ok(name)
    }

    fn export_uncached(
        &mut self,
        graph_id: GraphId,
        node_id: NodeId,
        assigned: Option<&str>,
        expected: GraphKind,
    ) -> Result<String, ExportError> {
        let library = self.library;
        let graph = library.get(graph_id).ok_or(ExportError::MissingGraph)?;
        let node = graph.node(node_id).ok_or_else(|| ExportError::MissingNode {
            graph: graph.name.clone(),
        })?;
        let name = assigned
            .map(str::to_string)
            .unwrap_or_else(|| node_entity_name(graph, &node.name));

        if let NodeKind::Pointer { target } = &node.kind {
            let dangling = || ExportError::DanglingPointer {
                node: node.name.clone(),
            };
            let target = target.ok_or_else(dangling)?;
            let target_graph = library.get(target).ok_or_else(dangling)?;
            if target_graph.kind != expected {
                return Err(ExportError::IncompatibleNode {
                    node: node.name.clone(),
                    expected,
                });
            }
            log::debug!("Pointer '{}' embeds graph '{}'", node.name, target_graph.name);
            return self.export_output(target, Some(&name));
        }

        if node.kind.category() != Some(expected) {
            return Err(ExportError::IncompatibleNode {
                node: node.name.clone(),
                expected,
            });
        }

        let mut inputs = NodeInputs::default();
        for socket in &node.inputs {
            let value = self.export_socket(graph_id, socket)?;
            inputs.push(socket.name.clone(), value);
        }

        let statements = node.kind.statements(&name, &inputs)?;
        log::debug!("Exported {} node '{}' as '{}'", node.kind.label(), node.name, name);
        self.out.merge(&statements.own);
        self.emitted.push(name.clone());

        match statements.helper {
            Some(helper) => {
                self.out.merge(&helper.props);
                Ok(helper.name)
            }
            None => Ok(name),
        }
    }

    /// Names of the entities emitted so far, in emission order
    pub fn emitted(&self) -> &[String] {
        &self.emitted
    }

    /// Number of nodes memoized in this pass
    pub fn cached_nodes(&self) -> usize {
        self.cache.len()
    }

    /// Finish the pass and take its statements
    pub fn into_properties(self) -> Properties {
        self.out
    }
}

/// Export a graph's active output as a fresh pass, merging into `props`.
///
/// Any failure is replaced by the fallback entity for `expected` under the
/// same name, with a warning in `log`. Returns the entity name to reference.
pub fn export_graph(
    library: &GraphLibrary,
    graph_id: GraphId,
    props: &mut Properties,
    assigned_name: Option<&str>,
    expected: GraphKind,
    log: &mut ErrorLog,
) -> String {
    let graph = library.get(graph_id);
    let name = assigned_name
        .map(str::to_string)
        .or_else(|| graph.map(graph_entity_name))
        .unwrap_or_else(|| format!("missing_{}", kind_label(expected)));

    let mut pass = ExportPass::new(library, log);
    let result = match graph {
        Some(g) if g.kind == expected => pass.export_output(graph_id, Some(&name)),
        Some(g) => Err(ExportError::IncompatibleGraph {
            graph: g.name.clone(),
            expected,
        }),
        None => Err(ExportError::MissingGraph),
    };
    log::debug!(
        "Graph export '{name}': {} entities from {} cached nodes",
        pass.emitted().len(),
        pass.cached_nodes()
    );
    let statements = pass.into_properties();

    match result {
        Ok(exported) => {
            props.merge(&statements);
            exported
        }
        Err(err) => {
            log.add_warning(
                format!("Could not export {}, using fallback: {err}", kind_label(expected)),
                Some(&name),
            );
            props.merge(&fallback(expected, &name));
            name
        }
    }
}

/// Deterministic stand-in entity for a graph that failed to export
pub fn fallback(kind: GraphKind, name: &str) -> Properties {
    let prefix = format!("{}.{name}", kind.namespace());
    let mut props = Properties::new();
    match kind {
        GraphKind::Material => {
            props.set(&prefix, "type", "matte");
            props.set(&prefix, "kd", [0.0, 0.0, 0.0]);
        }
        GraphKind::Volume => {
            props.set(&prefix, "type", "clear");
            props.set(&prefix, "absorption", [100.0, 100.0, 100.0]);
        }
        GraphKind::Texture => {
            props.set(&prefix, "type", "constfloat3");
            props.set(&prefix, "value", [0.0, 0.0, 0.0]);
        }
    }
    props
}

/// Engine name of a graph's top-level entity
pub fn graph_entity_name(graph: &NodeGraph) -> String {
    match &graph.library {
        Some(library) => qualified_name(&[(library, LIBRARY_SEPARATOR)], &graph.name),
        None => sanitize_name(&graph.name),
    }
}

fn node_entity_name(graph: &NodeGraph, node: &str) -> String {
    match &graph.library {
        Some(library) => qualified_name(
            &[(library, LIBRARY_SEPARATOR), (&graph.name, NODE_SEPARATOR)],
            node,
        ),
        None => qualified_name(&[(&graph.name, NODE_SEPARATOR)], node),
    }
}

fn kind_label(kind: GraphKind) -> &'static str {
    match kind {
        GraphKind::Material => "material",
        GraphKind::Texture => "texture",
        GraphKind::Volume => "volume",
    }
}
