//! Node graph data structures and editing operations

use slotmap::{new_key_type, SlotMap};

use super::kinds::NodeKind;
use crate::foundation::math::Rgb;
use crate::props::PropValue;

new_key_type! {
    /// Handle to a graph stored in a [`GraphLibrary`]
    pub struct GraphId;

    /// Handle to a node inside one [`NodeGraph`]
    pub struct NodeId;
}

/// What a graph (or a socket) produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphKind {
    /// Surface material
    Material,
    /// Reusable texture
    Texture,
    /// Participating medium
    Volume,
}

impl GraphKind {
    /// Property namespace entities of this kind live under
    pub fn namespace(self) -> &'static str {
        match self {
            GraphKind::Material => "scene.materials",
            GraphKind::Texture => "scene.textures",
            GraphKind::Volume => "scene.volumes",
        }
    }
}

/// Default value held by an unlinked socket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SocketValue {
    /// Scalar
    Float(f32),
    /// Linear RGB color
    Color(Rgb),
    /// Direction or position
    Vector([f32; 3]),
    /// No default; the socket only has a value when linked
    None,
}

impl SocketValue {
    /// Native engine encoding of the default (empty for `None`)
    pub fn to_values(&self) -> Vec<PropValue> {
        match self {
            SocketValue::Float(v) => vec![PropValue::Float(*v)],
            SocketValue::Color(c) | SocketValue::Vector(c) => c.iter().copied().map(PropValue::Float).collect(),
            SocketValue::None => Vec::new(),
        }
    }
}

/// Named input of a node
#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    /// Socket name, unique within its node
    pub name: String,
    /// Kind of node a link into this socket must produce
    pub accepts: GraphKind,
    /// Value used while unlinked
    pub default: SocketValue,
    /// Upstream node feeding this socket
    pub link: Option<NodeId>,
}

impl Socket {
    fn new(name: &str, accepts: GraphKind, default: SocketValue) -> Self {
        Self {
            name: name.to_string(),
            accepts,
            default,
            link: None,
        }
    }

    /// Scalar texture input
    pub fn float(name: &str, value: f32) -> Self {
        Self::new(name, GraphKind::Texture, SocketValue::Float(value))
    }

    /// Color texture input
    pub fn color(name: &str, value: Rgb) -> Self {
        Self::new(name, GraphKind::Texture, SocketValue::Color(value))
    }

    /// Vector texture input
    pub fn vector(name: &str, value: [f32; 3]) -> Self {
        Self::new(name, GraphKind::Texture, SocketValue::Vector(value))
    }

    /// Texture input without a default (e.g. bump)
    pub fn texture(name: &str) -> Self {
        Self::new(name, GraphKind::Texture, SocketValue::None)
    }

    /// Shader input taking a material node
    pub fn material(name: &str) -> Self {
        Self::new(name, GraphKind::Material, SocketValue::None)
    }

    /// Input taking a volume node
    pub fn volume(name: &str) -> Self {
        Self::new(name, GraphKind::Volume, SocketValue::None)
    }
}

/// A node with its typed parameters and input sockets
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Display name, unique within its graph
    pub name: String,
    /// Node kind and its parameters
    pub kind: NodeKind,
    /// Input sockets
    pub inputs: Vec<Socket>,
}

impl Node {
    /// Create a node with the default sockets of its kind
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let inputs = kind.default_inputs();
        Self {
            name: name.into(),
            kind,
            inputs,
        }
    }

    /// Find an input socket by name
    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Find an input socket by name for editing
    pub fn input_mut(&mut self, name: &str) -> Option<&mut Socket> {
        self.inputs.iter_mut().find(|s| s.name == name)
    }

    /// Builder-style default override; unknown sockets are ignored
    pub fn with_default(mut self, socket: &str, value: SocketValue) -> Self {
        if let Some(s) = self.input_mut(socket) {
            s.default = value;
        }
        self
    }
}

/// Graph editing errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Node id does not belong to this graph
    #[error("Node does not exist in graph '{graph}'")]
    UnknownNode {
        /// Graph name
        graph: String,
    },

    /// Socket name not found on the target node
    #[error("Node '{node}' has no input socket '{socket}'")]
    UnknownSocket {
        /// Node name
        node: String,
        /// Requested socket
        socket: String,
    },

    /// Attempted to link a node to itself
    #[error("Cannot connect node '{node}' to itself")]
    SelfLink {
        /// Node name
        node: String,
    },

    /// Only output nodes can be made active
    #[error("Node '{node}' is not an output node")]
    NotAnOutput {
        /// Node name
        node: String,
    },
}

/// A material, texture or volume node tree
///
/// At most one output node is active at any time. The active output is stored
/// once on the graph, so activating a node implicitly deactivates the previous
/// one.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    /// Graph name as shown in the editor
    pub name: String,
    /// What the graph produces
    pub kind: GraphKind,
    /// Linked library the graph comes from, if any
    pub library: Option<String>,
    nodes: SlotMap<NodeId, Node>,
    active_output: Option<NodeId>,
}

impl NodeGraph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>, kind: GraphKind) -> Self {
        Self {
            name: name.into(),
            kind,
            library: None,
            nodes: SlotMap::with_key(),
            active_output: None,
        }
    }

    /// Mark the graph as coming from a linked library
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    /// Add a node; the first output node added becomes the active one
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let is_output = node.kind.is_output();
        let id = self.nodes.insert(node);
        if is_output && self.active_output.is_none() {
            self.active_output = Some(id);
        }
        id
    }

    /// Add an output node and make it the active one
    pub fn add_active_output(&mut self, node: Node) -> Result<NodeId, NodeError> {
        let id = self.add_node(node);
        self.set_active_output(id)?;
        Ok(id)
    }

    /// Remove a node and every link reading from it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        for other in self.nodes.values_mut() {
            for socket in &mut other.inputs {
                if socket.link == Some(id) {
                    socket.link = None;
                }
            }
        }
        if self.active_output == Some(id) {
            self.active_output = None;
        }
        Some(node)
    }

    /// Get a node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a node for editing its parameters or socket defaults
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Iterate all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect the output of `from` to the input socket `socket` of `to`
    pub fn link(&mut self, from: NodeId, to: NodeId, socket: &str) -> Result<(), NodeError> {
        if !self.nodes.contains_key(from) {
            return Err(self.unknown_node());
        }
        let target = self.nodes.get(to).ok_or_else(|| self.unknown_node())?;
        if from == to {
            return Err(NodeError::SelfLink {
                node: target.name.clone(),
            });
        }

        let node_name = target.name.clone();
        let slot = self
            .nodes
            .get_mut(to)
            .and_then(|n| n.input_mut(socket))
            .ok_or(NodeError::UnknownSocket {
                node: node_name,
                socket: socket.to_string(),
            })?;
        slot.link = Some(from);
        Ok(())
    }

    /// Disconnect an input socket
    pub fn unlink(&mut self, to: NodeId, socket: &str) -> Result<(), NodeError> {
        let unknown = self.unknown_node();
        let node = self.nodes.get_mut(to).ok_or(unknown)?;
        let node_name = node.name.clone();
        let slot = node.input_mut(socket).ok_or(NodeError::UnknownSocket {
            node: node_name,
            socket: socket.to_string(),
        })?;
        slot.link = None;
        Ok(())
    }

    /// Make `id` the active output, deactivating any other
    pub fn set_active_output(&mut self, id: NodeId) -> Result<(), NodeError> {
        let node = self.nodes.get(id).ok_or_else(|| self.unknown_node())?;
        if !node.kind.is_output() {
            return Err(NodeError::NotAnOutput {
                node: node.name.clone(),
            });
        }
        if self.active_output != Some(id) {
            log::debug!("Graph '{}': active output is now '{}'", self.name, node.name);
        }
        self.active_output = Some(id);
        Ok(())
    }

    /// The active output node
    pub fn active_output(&self) -> Option<NodeId> {
        self.active_output
    }

    /// Whether `id` is the active output
    pub fn is_active(&self, id: NodeId) -> bool {
        self.active_output == Some(id)
    }

    fn unknown_node(&self) -> NodeError {
        NodeError::UnknownNode {
            graph: self.name.clone(),
        }
    }
}

/// Owner of all node graphs of a scene
#[derive(Debug, Clone, Default)]
pub struct GraphLibrary {
    graphs: SlotMap<GraphId, NodeGraph>,
}

impl GraphLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a graph
    pub fn insert(&mut self, graph: NodeGraph) -> GraphId {
        self.graphs.insert(graph)
    }

    /// Get a graph
    pub fn get(&self, id: GraphId) -> Option<&NodeGraph> {
        self.graphs.get(id)
    }

    /// Get a graph for editing
    pub fn get_mut(&mut self, id: GraphId) -> Option<&mut NodeGraph> {
        self.graphs.get_mut(id)
    }

    /// Delete a graph; pointers to it become dangling
    pub fn remove(&mut self, id: GraphId) -> Option<NodeGraph> {
        self.graphs.remove(id)
    }

    /// Iterate all graphs
    pub fn iter(&self) -> impl Iterator<Item = (GraphId, &NodeGraph)> {
        self.graphs.iter()
    }

    /// Number of graphs
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::kinds::MaterialOutputSettings;

    fn output() -> Node {
        Node::new("Output", NodeKind::MaterialOutput(MaterialOutputSettings::default()))
    }

    #[test]
    fn test_activating_output_deactivates_previous() {
        let mut graph = NodeGraph::new("mat", GraphKind::Material);
        let a = graph.add_node(output());
        let b = graph.add_node(output());
        assert!(graph.is_active(a));
        assert!(!graph.is_active(b));

        graph.set_active_output(b).unwrap();
        assert!(!graph.is_active(a));
        assert!(graph.is_active(b));
        let active = graph.nodes().filter(|(id, _)| graph.is_active(*id)).count();
        assert_eq!(active, 1);
    }

    #[test]
    fn test_adding_active_output_replaces_current() {
        let mut graph = NodeGraph::new("mat", GraphKind::Material);
        let a = graph.add_node(output());
        let b = graph.add_active_output(output()).unwrap();
        assert!(!graph.is_active(a));
        assert!(graph.is_active(b));
    }

    #[test]
    fn test_only_outputs_can_be_active() {
        let mut graph = NodeGraph::new("mat", GraphKind::Material);
        let matte = graph.add_node(Node::new("Matte", NodeKind::Matte(Default::default())));
        assert_eq!(
            graph.set_active_output(matte),
            Err(NodeError::NotAnOutput { node: "Matte".to_string() })
        );
        assert_eq!(graph.active_output(), None);
    }

    #[test]
    fn test_link_validation() {
        let mut graph = NodeGraph::new("mat", GraphKind::Material);
        let matte = graph.add_node(Node::new("Matte", NodeKind::Matte(Default::default())));
        let out = graph.add_node(output());

        assert!(matches!(graph.link(matte, matte, "Diffuse Color"), Err(NodeError::SelfLink { .. })));
        assert!(matches!(graph.link(matte, out, "Nope"), Err(NodeError::UnknownSocket { .. })));
        graph.link(matte, out, "Material").unwrap();
        assert_eq!(graph.node(out).unwrap().input("Material").unwrap().link, Some(matte));
    }

    #[test]
    fn test_remove_node_clears_links_and_active() {
        let mut graph = NodeGraph::new("mat", GraphKind::Material);
        let matte = graph.add_node(Node::new("Matte", NodeKind::Matte(Default::default())));
        let out = graph.add_node(output());
        graph.link(matte, out, "Material").unwrap();

        graph.remove_node(matte);
        assert_eq!(graph.node(out).unwrap().input("Material").unwrap().link, None);
        graph.remove_node(out);
        assert_eq!(graph.active_output(), None);
    }
}
