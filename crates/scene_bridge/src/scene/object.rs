//! Renderable objects and their mesh data

use crate::foundation::math::Mat4;
use crate::nodes::GraphId;

/// Triangle mesh passed inline to the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions in object space
    pub vertices: Vec<[f32; 3]>,
    /// Triangles as vertex indices
    pub faces: Vec<[u32; 3]>,
}

impl MeshData {
    /// Flat vertex coordinate list
    pub fn flat_vertices(&self) -> Vec<f32> {
        self.vertices.iter().flatten().copied().collect()
    }

    /// Flat index list
    pub fn flat_faces(&self) -> Vec<u32> {
        self.faces.iter().flatten().copied().collect()
    }

    /// Square in the XY plane centered on the origin
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        Self {
            vertices: vec![[-h, -h, 0.0], [h, -h, 0.0], [h, h, 0.0], [-h, h, 0.0]],
            faces: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    /// Axis-aligned cube centered on the origin
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let vertices = vec![
            [-h, -h, -h],
            [h, -h, -h],
            [h, h, -h],
            [-h, h, -h],
            [-h, -h, h],
            [h, -h, h],
            [h, h, h],
            [-h, h, h],
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 6, 2],
            [3, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        Self { vertices, faces }
    }
}

/// An object instance in the editor scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Unique object name
    pub name: String,
    /// Key of the mesh in [`super::Scene::meshes`]
    pub mesh: String,
    /// Bound material graph
    pub material: Option<GraphId>,
    /// Object-to-world matrix
    pub transform: Mat4,
    /// Excluded from rendering
    pub hidden: bool,
    /// Invisible to camera rays but still lit and casting shadows
    pub camera_invisible: bool,
}

impl SceneObject {
    /// Visible object at the identity transform
    pub fn new(name: impl Into<String>, mesh: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mesh: mesh.into(),
            material: None,
            transform: Mat4::identity(),
            hidden: false,
            camera_invisible: false,
        }
    }

    /// Bind a material graph
    pub fn with_material(mut self, material: GraphId) -> Self {
        self.material = Some(material);
        self
    }

    /// Place the object
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}
