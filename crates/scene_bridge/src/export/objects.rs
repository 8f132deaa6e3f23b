//! Mesh, object and material binding statements

use std::collections::BTreeMap;

use crate::diagnostics::ErrorLog;
use crate::foundation::math::flatten_matrix;
use crate::nodes::{export_graph, GraphId, GraphKind, GraphLibrary};
use crate::props::{sanitize_name, Properties};
use crate::scene::{MeshData, SceneObject};

/// Material used by objects without a bound material graph
///
/// [`sanitize_name`] never produces this name, so no graph can shadow it.
pub const DEFAULT_MATERIAL: &str = "__default_material";

/// Engine name of a mesh
pub fn mesh_entity_name(mesh: &str) -> String {
    format!("mesh_{}", sanitize_name(mesh))
}

/// Engine name of an object
pub fn object_entity_name(object: &str) -> String {
    sanitize_name(object)
}

/// Inline mesh statements
pub fn export_mesh(name: &str, mesh: &MeshData) -> Properties {
    let prefix = format!("scene.shapes.{}", mesh_entity_name(name));
    let mut props = Properties::new();
    props.set(&prefix, "type", "inlinedplymesh");
    props.set(&prefix, "vertices", mesh.flat_vertices().as_slice());
    props.set(&prefix, "faces", mesh.flat_faces().as_slice());
    props
}

/// Neutral grey matte for unassigned objects
pub fn default_material() -> Properties {
    let prefix = format!("scene.materials.{DEFAULT_MATERIAL}");
    let mut props = Properties::new();
    props.set(&prefix, "type", "matte");
    props.set(&prefix, "kd", [0.6, 0.6, 0.6]);
    props
}

/// Object instance statements referencing an already exported mesh and material
pub fn export_object(object: &SceneObject, material: &str) -> Properties {
    let prefix = format!("scene.objects.{}", object_entity_name(&object.name));
    let mut props = Properties::new();
    props.set(&prefix, "shape", mesh_entity_name(&object.mesh));
    props.set(&prefix, "material", material);
    props.set(&prefix, "transformation", flatten_matrix(&object.transform));
    props.set(&prefix, "camerainvisible", object.camera_invisible);
    props
}

/// Exports each bound material graph once per description
#[derive(Debug, Default)]
pub struct MaterialTable {
    names: BTreeMap<GraphId, String>,
    default_emitted: bool,
}

impl MaterialTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity name for `binding`, exporting the graph into `props` on first use
    pub fn resolve(
        &mut self,
        library: &GraphLibrary,
        binding: Option<GraphId>,
        props: &mut Properties,
        log: &mut ErrorLog,
    ) -> String {
        let Some(graph) = binding else {
            if !self.default_emitted {
                props.merge(&default_material());
                self.default_emitted = true;
            }
            return DEFAULT_MATERIAL.to_string();
        };
        if let Some(name) = self.names.get(&graph) {
            return name.clone();
        }
        let name = export_graph(library, graph, props, None, GraphKind::Material, log);
        self.names.insert(graph, name.clone());
        name
    }

    /// Number of material graphs exported
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no material graph was exported
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
