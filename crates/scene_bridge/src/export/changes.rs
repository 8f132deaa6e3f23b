//! Change detection between display ticks
//!
//! [`ChangeDetector`] keeps a snapshot of cheap fingerprints (blake3 digests of
//! the parameters the exporter reads) and reports which categories differ
//! since the previous call. Every call advances the snapshot, so callers must
//! act on the returned flags and never call it speculatively.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::foundation::math::Mat4;
use crate::nodes::{GraphId, GraphKind, NodeGraph};
use crate::scene::{Scene, ViewContext};

bitflags::bitflags! {
    /// Categories of scene changes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u16 {
        /// Camera frame or projection
        const CAMERA = 1 << 0;
        /// Object transform, mesh or material binding
        const OBJECT = 1 << 1;
        /// Material or texture graph parameters
        const MATERIAL = 1 << 2;
        /// Light parameters or world background
        const LIGHT = 1 << 3;
        /// Volume graph parameters or world volume binding
        const VOLUME = 1 << 4;
        /// Camera visibility of objects
        const VISIBILITY = 1 << 5;
        /// Render settings or film size
        const CONFIG = 1 << 6;
        /// Tonemapping and gamma
        const IMAGEPIPELINE = 1 << 7;
        /// Light group scales
        const LIGHTGROUPS = 1 << 8;
        /// Topology changed; a running session cannot be patched
        const REQUIRES_FULL_REEXPORT = 1 << 9;

        /// Everything that forces a new session
        const REQUIRES_VIEW_UPDATE = Self::CONFIG.bits() | Self::REQUIRES_FULL_REEXPORT.bits();
    }
}

impl ChangeFlags {
    /// Whether these changes can be applied to a running session
    pub fn is_patchable(self) -> bool {
        !self.intersects(ChangeFlags::REQUIRES_VIEW_UPDATE)
    }

    fn for_graph(kind: GraphKind) -> Self {
        match kind {
            GraphKind::Material | GraphKind::Texture => ChangeFlags::MATERIAL,
            GraphKind::Volume => ChangeFlags::VOLUME,
        }
    }
}

/// Entities whose parameters changed in the last [`ChangeDetector::get_changes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyEntities {
    /// Objects by name
    pub objects: BTreeSet<String>,
    /// Lights by name
    pub lights: BTreeSet<String>,
    /// Node graphs
    pub graphs: BTreeSet<GraphId>,
    /// World background or world volume binding
    pub world: bool,
}

impl DirtyEntities {
    /// Nothing is dirty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.lights.is_empty() && self.graphs.is_empty() && !self.world
    }
}

struct Fingerprint(blake3::Hasher);

impl Fingerprint {
    fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    fn pod<T: bytemuck::Pod>(&mut self, values: &[T]) -> &mut Self {
        self.0.update(&(values.len() as u64).to_le_bytes());
        self.0.update(bytemuck::cast_slice(values));
        self
    }

    fn matrix(&mut self, matrix: &Mat4) -> &mut Self {
        self.pod(matrix.as_slice())
    }

    fn text(&mut self, text: &str) -> &mut Self {
        self.pod(text.as_bytes())
    }

    fn debug(&mut self, value: &impl fmt::Debug) -> &mut Self {
        self.text(&format!("{value:?}"))
    }

    fn finish(&self) -> blake3::Hash {
        self.0.finalize()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ObjectPrint {
    params: blake3::Hash,
    visibility: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct GraphPrint {
    kind: GraphKind,
    structure: blake3::Hash,
    params: blake3::Hash,
}

impl GraphPrint {
    fn capture(graph: &NodeGraph) -> Self {
        let mut structure = Fingerprint::new();
        let mut params = Fingerprint::new();
        params.debug(&graph.name).debug(&graph.library);
        for (id, node) in graph.nodes() {
            structure.debug(&id).text(node.kind.label());
            for socket in &node.inputs {
                structure.text(&socket.name).debug(&socket.link);
            }
            params.debug(node);
        }
        structure.debug(&graph.active_output());

        Self {
            kind: graph.kind,
            structure: structure.finish(),
            params: params.finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    camera: blake3::Hash,
    film: (u32, u32),
    config: blake3::Hash,
    image_pipeline: blake3::Hash,
    light_groups: blake3::Hash,
    objects: BTreeMap<String, ObjectPrint>,
    lights: BTreeMap<String, blake3::Hash>,
    background: blake3::Hash,
    world_volume: Option<GraphId>,
    graphs: BTreeMap<GraphId, GraphPrint>,
}

impl Snapshot {
    fn capture(scene: &Scene, view: Option<&ViewContext>) -> Self {
        let camera = match view {
            Some(view) => Fingerprint::new().matrix(&view.view_matrix).debug(&view.projection).finish(),
            None => Fingerprint::new()
                .matrix(&scene.camera.transform)
                .debug(&scene.camera.projection)
                .pod(&[
                    scene.camera.clip_near,
                    scene.camera.clip_far,
                    scene.camera.lens_radius,
                    scene.camera.focal_distance,
                ])
                .finish(),
        };
        let film = view.map_or((scene.film.width, scene.film.height), |v| (v.width, v.height));

        let meshes: BTreeMap<&str, blake3::Hash> = scene
            .meshes
            .iter()
            .map(|(name, mesh)| (name.as_str(), Fingerprint::new().pod(&mesh.vertices).pod(&mesh.faces).finish()))
            .collect();

        let objects = scene
            .visible_objects()
            .map(|object| {
                let params = Fingerprint::new()
                    .text(&object.mesh)
                    .debug(&meshes.get(object.mesh.as_str()))
                    .debug(&object.material)
                    .matrix(&object.transform)
                    .finish();
                let print = ObjectPrint {
                    params,
                    visibility: object.camera_invisible,
                };
                (object.name.clone(), print)
            })
            .collect();

        let lights = scene
            .visible_lights()
            .map(|light| {
                let print = Fingerprint::new()
                    .debug(&light.kind)
                    .pod(&light.color)
                    .pod(&[light.gain])
                    .matrix(&light.transform)
                    .pod(&[light.light_group])
                    .finish();
                (light.name.clone(), print)
            })
            .collect();

        Self {
            camera,
            film,
            config: Fingerprint::new().debug(&scene.render).finish(),
            image_pipeline: Fingerprint::new().debug(&scene.image_pipeline).finish(),
            light_groups: Fingerprint::new().debug(&scene.light_groups).finish(),
            objects,
            lights,
            background: Fingerprint::new().debug(&scene.world.background).finish(),
            world_volume: scene.world.volume,
            graphs: scene.graphs.iter().map(|(id, g)| (id, GraphPrint::capture(g))).collect(),
        }
    }
}

/// Fingerprint-based scene change detector
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    snapshot: Option<Snapshot>,
    dirty: DirtyEntities,
}

impl ChangeDetector {
    /// Detector without a snapshot; the first call reports a full re-export
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the scene against the snapshot, then replace the snapshot
    pub fn get_changes(&mut self, scene: &Scene, view: Option<&ViewContext>) -> ChangeFlags {
        let current = Snapshot::capture(scene, view);
        self.dirty = DirtyEntities::default();

        let flags = match self.snapshot.take() {
            Some(previous) => self.diff(&previous, &current),
            None => ChangeFlags::REQUIRES_FULL_REEXPORT,
        };
        self.snapshot = Some(current);

        if !flags.is_empty() {
            log::debug!("Scene changes: {flags:?}");
        }
        flags
    }

    /// Record the scene as synchronized without reporting changes
    pub fn snapshot(&mut self, scene: &Scene, view: Option<&ViewContext>) {
        self.snapshot = Some(Snapshot::capture(scene, view));
        self.dirty = DirtyEntities::default();
    }

    /// Forget the snapshot; the next call reports a full re-export
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.dirty = DirtyEntities::default();
    }

    /// Whether a snapshot is held
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Entities changed in the last call
    pub fn dirty(&self) -> &DirtyEntities {
        &self.dirty
    }

    fn diff(&mut self, previous: &Snapshot, current: &Snapshot) -> ChangeFlags {
        let mut flags = ChangeFlags::empty();

        if previous.camera != current.camera {
            flags |= ChangeFlags::CAMERA;
        }
        if previous.film != current.film {
            flags |= ChangeFlags::CONFIG | ChangeFlags::REQUIRES_FULL_REEXPORT;
        }
        if previous.config != current.config {
            flags |= ChangeFlags::CONFIG;
        }
        if previous.image_pipeline != current.image_pipeline {
            flags |= ChangeFlags::IMAGEPIPELINE;
        }
        if previous.light_groups != current.light_groups {
            flags |= ChangeFlags::LIGHTGROUPS;
        }

        if !previous.objects.keys().eq(current.objects.keys()) {
            flags |= ChangeFlags::OBJECT | ChangeFlags::REQUIRES_FULL_REEXPORT;
        }
        for (name, print) in &current.objects {
            let Some(old) = previous.objects.get(name) else { continue };
            if old.params != print.params {
                flags |= ChangeFlags::OBJECT;
                self.dirty.objects.insert(name.clone());
            }
            if old.visibility != print.visibility {
                flags |= ChangeFlags::VISIBILITY;
                self.dirty.objects.insert(name.clone());
            }
        }

        if !previous.lights.keys().eq(current.lights.keys()) {
            flags |= ChangeFlags::LIGHT | ChangeFlags::REQUIRES_FULL_REEXPORT;
        }
        for (name, print) in &current.lights {
            if previous.lights.get(name).is_some_and(|old| old != print) {
                flags |= ChangeFlags::LIGHT;
                self.dirty.lights.insert(name.clone());
            }
        }

        if previous.background != current.background {
            flags |= ChangeFlags::LIGHT;
            self.dirty.world = true;
        }
        if previous.world_volume != current.world_volume {
            flags |= ChangeFlags::VOLUME;
            self.dirty.world = true;
        }

        for (id, print) in &current.graphs {
            let category = ChangeFlags::for_graph(print.kind);
            match previous.graphs.get(id) {
                None => flags |= category | ChangeFlags::REQUIRES_FULL_REEXPORT,
                Some(old) if old.kind != print.kind || old.structure != print.structure => {
                    flags |= category | ChangeFlags::REQUIRES_FULL_REEXPORT;
                }
                Some(old) if old.params != print.params => {
                    flags |= category;
                    self.dirty.graphs.insert(*id);
                }
                Some(_) => {}
            }
        }
        for (id, print) in &previous.graphs {
            if !current.graphs.contains_key(id) {
                flags |= ChangeFlags::for_graph(print.kind) | ChangeFlags::REQUIRES_FULL_REEXPORT;
            }
        }

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::nodes::{MaterialCommon, MaterialOutputSettings, Node, NodeKind, SocketValue};
    use crate::scene::{Light, LightKind, MeshData, Projection, SceneObject, Tonemapper};

    fn scene() -> (Scene, GraphId) {
        let mut scene = Scene::new("test");
        let mut graph = NodeGraph::new("Red", GraphKind::Material);
        let matte = graph.add_node(
            Node::new("Matte", NodeKind::Matte(MaterialCommon::default()))
                .with_default("Diffuse Color", SocketValue::Color([0.5, 0.0, 0.0])),
        );
        let out = graph.add_node(Node::new("Output", NodeKind::MaterialOutput(MaterialOutputSettings::default())));
        graph.link(matte, out, "Material").unwrap();
        let material = scene.graphs.insert(graph);

        scene.add_mesh("Cube", MeshData::cube(1.0));
        scene.add_object(SceneObject::new("Cube", "Cube").with_material(material));
        scene.add_light(Light::new("Key", LightKind::Point { radius: 0.0 }));
        (scene, material)
    }

    fn synced(scene: &Scene) -> ChangeDetector {
        let mut detector = ChangeDetector::new();
        detector.get_changes(scene, None);
        detector
    }

    fn matte_node(scene: &mut Scene, material: GraphId) -> &mut Node {
        let graph = scene.graphs.get_mut(material).unwrap();
        let id = graph.nodes().find(|(_, n)| n.name == "Matte").map(|(id, _)| id).unwrap();
        graph.node_mut(id).unwrap()
    }

    #[test]
    fn test_first_call_requires_full_export() {
        let (scene, _) = scene();
        let mut detector = ChangeDetector::new();
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::REQUIRES_FULL_REEXPORT);
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::empty());
    }

    #[test]
    fn test_call_advances_snapshot() {
        let (mut scene, _) = scene();
        let mut detector = synced(&scene);
        scene.camera.transform = Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::CAMERA);
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::empty());
    }

    #[test]
    fn test_independent_changes_are_unioned() {
        let (mut scene, _) = scene();
        let mut detector = synced(&scene);

        scene.camera.projection = Projection::Perspective { fov_deg: 30.0 };
        scene.light_mut("Key").unwrap().gain = 4.0;
        scene.image_pipeline.tonemapper = Tonemapper::AutoLinear;

        let flags = detector.get_changes(&scene, None);
        assert_eq!(flags, ChangeFlags::CAMERA | ChangeFlags::LIGHT | ChangeFlags::IMAGEPIPELINE);
        assert!(flags.bits().count_ones() >= 3);
        assert!(flags.is_patchable());
        assert!(detector.dirty().lights.contains("Key"));
    }

    #[test]
    fn test_union_is_order_independent() {
        let (base, _) = scene();

        let mut a = base.clone();
        let mut detector_a = synced(&a);
        a.object_mut("Cube").unwrap().camera_invisible = true;
        a.light_mut("Key").unwrap().color = [1.0, 0.0, 0.0];

        let mut b = base.clone();
        let mut detector_b = synced(&b);
        b.light_mut("Key").unwrap().color = [1.0, 0.0, 0.0];
        b.object_mut("Cube").unwrap().camera_invisible = true;

        let flags = detector_a.get_changes(&a, None);
        assert_eq!(flags, detector_b.get_changes(&b, None));
        assert_eq!(flags, ChangeFlags::VISIBILITY | ChangeFlags::LIGHT);
    }

    #[test]
    fn test_object_transform_is_patchable() {
        let (mut scene, _) = scene();
        let mut detector = synced(&scene);
        scene.object_mut("Cube").unwrap().transform = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));

        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::OBJECT);
        assert!(detector.dirty().objects.contains("Cube"));
    }

    #[test]
    fn test_added_or_hidden_object_requires_full_export() {
        let (mut scene, _) = scene();
        let mut detector = synced(&scene);

        scene.add_object(SceneObject::new("Floor", "Cube"));
        let flags = detector.get_changes(&scene, None);
        assert!(flags.contains(ChangeFlags::OBJECT | ChangeFlags::REQUIRES_FULL_REEXPORT));
        assert!(!flags.is_patchable());

        scene.object_mut("Floor").unwrap().hidden = true;
        assert!(detector.get_changes(&scene, None).contains(ChangeFlags::REQUIRES_FULL_REEXPORT));
    }

    #[test]
    fn test_graph_parameter_edit_marks_material() {
        let (mut scene, material) = scene();
        let mut detector = synced(&scene);
        matte_node(&mut scene, material).input_mut("Diffuse Color").unwrap().default =
            SocketValue::Color([0.0, 0.5, 0.0]);

        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::MATERIAL);
        assert!(detector.dirty().graphs.contains(&material));
    }

    #[test]
    fn test_graph_structure_edit_requires_full_export() {
        let (mut scene, material) = scene();
        let mut detector = synced(&scene);
        let graph = scene.graphs.get_mut(material).unwrap();
        graph.add_node(Node::new("Tint", NodeKind::ConstColor));

        let flags = detector.get_changes(&scene, None);
        assert_eq!(flags, ChangeFlags::MATERIAL | ChangeFlags::REQUIRES_FULL_REEXPORT);
        assert!(detector.dirty().graphs.is_empty());
    }

    #[test]
    fn test_viewport_resize_requires_view_update() {
        let (scene, _) = scene();
        let view = ViewContext::new(Mat4::identity(), Projection::default(), 320, 240);
        let mut detector = ChangeDetector::new();
        detector.get_changes(&scene, Some(&view));

        let resized = ViewContext { width: 400, ..view.clone() };
        let flags = detector.get_changes(&scene, Some(&resized));
        assert!(flags.intersects(ChangeFlags::REQUIRES_VIEW_UPDATE));
        assert!(!flags.contains(ChangeFlags::CAMERA));
    }

    #[test]
    fn test_world_bindings() {
        let (mut scene, _) = scene();
        let mut detector = synced(&scene);
        scene.world.background = Some(([0.1, 0.1, 0.1], 1.0));
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::LIGHT);
        assert!(detector.dirty().world);
    }

    #[test]
    fn test_reset_forces_full_export() {
        let (scene, _) = scene();
        let mut detector = synced(&scene);
        detector.reset();
        assert!(!detector.has_snapshot());
        assert_eq!(detector.get_changes(&scene, None), ChangeFlags::REQUIRES_FULL_REEXPORT);
    }
}
