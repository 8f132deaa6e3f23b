//! Editor scene model
//!
//! The mutable scene the editor owns and the exporter reads. It is a plain
//! data structure: the core never mutates it, it only compiles it into
//! property statements and fingerprints it for change detection.

pub mod camera;
pub mod light;
pub mod object;
pub mod settings;

pub use camera::{Camera, Projection, ViewContext};
pub use light::{Light, LightKind, World};
pub use object::{MeshData, SceneObject};
pub use settings::{
    EngineKind, FilmSize, ImagePipeline, LightGroup, LightStrategy, RenderSettings, SamplerKind, Tonemapper,
};

use std::collections::BTreeMap;

use crate::nodes::GraphLibrary;

/// Everything the exporter needs from the editor
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Scene name
    pub name: String,
    /// Render camera
    pub camera: Camera,
    /// Object instances, in editor order
    pub objects: Vec<SceneObject>,
    /// Mesh data by name; objects may share meshes
    pub meshes: BTreeMap<String, MeshData>,
    /// Lights, in editor order
    pub lights: Vec<Light>,
    /// Background and world volume
    pub world: World,
    /// Material, texture and volume graphs
    pub graphs: GraphLibrary,
    /// Integrator settings
    pub render: RenderSettings,
    /// Post-processing
    pub image_pipeline: ImagePipeline,
    /// Light group scaling
    pub light_groups: Vec<LightGroup>,
    /// Final render resolution
    pub film: FilmSize,
}

impl Scene {
    /// Empty scene with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Store a mesh under `name`, replacing any previous one
    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: MeshData) {
        self.meshes.insert(name.into(), mesh);
    }

    /// Append an object
    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    /// Append a light
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Find an object by name
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Find an object by name for editing
    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    /// Remove an object by name
    pub fn remove_object(&mut self, name: &str) -> Option<SceneObject> {
        let index = self.objects.iter().position(|o| o.name == name)?;
        Some(self.objects.remove(index))
    }

    /// Find a light by name for editing
    pub fn light_mut(&mut self, name: &str) -> Option<&mut Light> {
        self.lights.iter_mut().find(|l| l.name == name)
    }

    /// Objects that take part in rendering
    pub fn visible_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| !o.hidden)
    }

    /// Lights that take part in rendering
    pub fn visible_lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(|l| !l.hidden)
    }
}
