//! Scene export orchestration
//!
//! [`Exporter`] compiles a [`Scene`] into a [`RenderDescription`] for a new
//! session (full export) or into a delta applied to a running session inside
//! an edit bracket (incremental export). [`Exporter::sync`] ties both to the
//! [`ChangeDetector`] and is what the host calls once per display tick.

pub mod camera;
pub mod changes;
pub mod config;
pub mod error;
pub mod lights;
pub mod objects;

pub use changes::{ChangeDetector, ChangeFlags, DirtyEntities};
pub use error::ExportError;
pub use objects::{MaterialTable, DEFAULT_MATERIAL};

use crate::diagnostics::ErrorLog;
use crate::nodes::GraphKind;
use crate::props::Properties;
use crate::scene::{Scene, ViewContext};
use crate::session::{RenderDescription, RenderEngine, SessionController, SessionState};

/// Result of building a description
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Everything was exported
    Completed(RenderDescription),
    /// The cancellation predicate fired; partial statements were discarded
    Cancelled,
}

impl ExportOutcome {
    /// The description, when the export completed
    pub fn description(&self) -> Option<&RenderDescription> {
        match self {
            ExportOutcome::Completed(description) => Some(description),
            ExportOutcome::Cancelled => None,
        }
    }
}

/// What one [`Exporter::sync`] call did
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Nothing changed
    Unchanged,
    /// A new session was created from a full export
    FullExport,
    /// The running session was patched
    Incremental(ChangeFlags),
    /// A full export was started and cancelled
    Cancelled,
}

/// Scene-to-session compiler
#[derive(Debug, Default)]
pub struct Exporter {
    detector: ChangeDetector,
}

impl Exporter {
    /// Exporter whose first sync performs a full export
    pub fn new() -> Self {
        Self::default()
    }

    /// The change detector driving [`Self::sync`]
    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Build a complete description
    ///
    /// Entities are emitted in dependency order: config, camera, world,
    /// volumes, materials, meshes, objects, lights. `cancel` is polled before
    /// each entity.
    pub fn build_description(
        scene: &Scene,
        view: Option<&ViewContext>,
        cancel: &mut dyn FnMut() -> bool,
        log: &mut ErrorLog,
    ) -> ExportOutcome {
        let mut description = RenderDescription {
            config: config::export_config(scene, view),
            scene: Properties::new(),
        };
        let props = &mut description.scene;

        if cancel() {
            return cancelled("camera");
        }
        props.merge(&camera::export_camera(scene, view));

        if cancel() {
            return cancelled("world");
        }
        props.merge(&lights::export_world(&scene.world, &scene.graphs, log));

        let mut materials = MaterialTable::new();
        for object in scene.visible_objects() {
            if cancel() {
                return cancelled("materials");
            }
            materials.resolve(&scene.graphs, object.material, props, log);
        }

        let mut meshes_used: Vec<&str> = scene.visible_objects().map(|o| o.mesh.as_str()).collect();
        meshes_used.sort_unstable();
        meshes_used.dedup();
        for name in meshes_used {
            if cancel() {
                return cancelled("meshes");
            }
            match scene.meshes.get(name) {
                Some(mesh) => {
                    props.merge(&objects::export_mesh(name, mesh));
                }
                None => log.add_warning(format!("Mesh '{name}' not found"), None),
            }
        }

        for object in scene.visible_objects() {
            if cancel() {
                return cancelled("objects");
            }
            if !scene.meshes.contains_key(&object.mesh) {
                log.add_warning("Object skipped, its mesh is missing", Some(&object.name));
                continue;
            }
            let material = materials.resolve(&scene.graphs, object.material, props, log);
            props.merge(&objects::export_object(object, &material));
        }

        for light in scene.visible_lights() {
            if cancel() {
                return cancelled("lights");
            }
            props.merge(&lights::export_light(light));
        }

        log::debug!(
            "Built description: {} config and {} scene statements, {} materials",
            description.config.len(),
            description.scene.len(),
            materials.len()
        );
        ExportOutcome::Completed(description)
    }

    /// Replace any session with a new one built from scratch
    ///
    /// On cancellation the controller is left `Uninitialized` without a session.
    pub fn full_export<E: RenderEngine>(
        &mut self,
        scene: &Scene,
        view: Option<&ViewContext>,
        controller: &mut SessionController<E>,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<ExportOutcome, ExportError> {
        controller.stop()?;
        controller.begin_export()?;
        log::info!("Full export of scene '{}'", scene.name);

        let outcome = Self::build_description(scene, view, cancel, controller.log_mut());
        let ExportOutcome::Completed(mut description) = outcome else {
            controller.abort_export()?;
            self.detector.reset();
            return Ok(ExportOutcome::Cancelled);
        };

        description.config.merge(&controller.halt_conditions().to_properties());
        controller.create_session(&description)?;
        self.detector.snapshot(scene, view);
        Ok(ExportOutcome::Completed(description))
    }

    /// Patch the running session with the given changes
    ///
    /// Camera-only changes are hot-swapped; image pipeline and light group
    /// changes go through the pipeline update; everything else is applied
    /// inside one edit bracket. Flags in [`ChangeFlags::REQUIRES_VIEW_UPDATE`]
    /// are rejected.
    pub fn incremental_export<E: RenderEngine>(
        &self,
        changes: ChangeFlags,
        scene: &Scene,
        view: Option<&ViewContext>,
        controller: &mut SessionController<E>,
    ) -> Result<(), ExportError> {
        if !changes.is_patchable() {
            return Err(ExportError::RequiresFullExport(changes & ChangeFlags::REQUIRES_VIEW_UPDATE));
        }

        let pipeline = ChangeFlags::IMAGEPIPELINE | ChangeFlags::LIGHTGROUPS;
        if changes.intersects(pipeline) {
            controller.update_image_pipeline(&config::export_image_pipeline(scene))?;
        }

        let scene_changes = changes - pipeline;
        if scene_changes.is_empty() {
            return Ok(());
        }
        if scene_changes == ChangeFlags::CAMERA {
            log::debug!("Hot-swapping camera");
            controller.update_camera(&camera::export_camera(scene, view))?;
            return Ok(());
        }

        let delta = self.export_delta(scene_changes, scene, view, controller.log_mut());
        log::debug!("Applying {scene_changes:?} as {} statements", delta.len());
        controller.begin_edit()?;
        controller.apply(&delta)?;
        controller.end_edit()?;
        Ok(())
    }

    fn export_delta(
        &self,
        changes: ChangeFlags,
        scene: &Scene,
        view: Option<&ViewContext>,
        log: &mut ErrorLog,
    ) -> Properties {
        let dirty = self.detector.dirty();
        let mut props = Properties::new();

        if changes.contains(ChangeFlags::CAMERA) {
            props.merge(&camera::export_camera(scene, view));
        }
        if dirty.world {
            props.merge(&lights::export_world(&scene.world, &scene.graphs, log));
        }

        // Texture and volume graphs can be embedded anywhere, so their edits
        // re-export every bound material
        let embedded_edit = dirty.graphs.iter().any(|id| {
            scene
                .graphs
                .get(*id)
                .is_some_and(|g| g.kind != GraphKind::Material)
        });
        if embedded_edit && !dirty.world {
            props.merge(&lights::export_world(&scene.world, &scene.graphs, log));
        }
        let mut materials = MaterialTable::new();
        for object in scene.visible_objects() {
            let edited = object.material.is_some_and(|id| dirty.graphs.contains(&id));
            if embedded_edit || edited {
                materials.resolve(&scene.graphs, object.material, &mut props, log);
            }
        }

        for object in scene.visible_objects().filter(|o| dirty.objects.contains(&o.name)) {
            let Some(mesh) = scene.meshes.get(&object.mesh) else {
                continue;
            };
            props.merge(&objects::export_mesh(&object.mesh, mesh));
            let material = materials.resolve(&scene.graphs, object.material, &mut props, log);
            props.merge(&objects::export_object(object, &material));
        }

        for light in scene.visible_lights().filter(|l| dirty.lights.contains(&l.name)) {
            props.merge(&lights::export_light(light));
        }
        props
    }

    /// Detect changes once and bring the session up to date
    ///
    /// An uninitialized controller always gets a full export. A stopped or
    /// errored controller is only re-exported when the scene changed.
    pub fn sync<E: RenderEngine>(
        &mut self,
        scene: &Scene,
        view: Option<&ViewContext>,
        controller: &mut SessionController<E>,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<SyncOutcome, ExportError> {
        let changes = self.detector.get_changes(scene, view);

        let needs_full = match controller.state() {
            SessionState::Uninitialized => true,
            SessionState::Stopped | SessionState::Errored => !changes.is_empty(),
            _ => !changes.is_patchable(),
        };
        if needs_full {
            return Ok(match self.full_export(scene, view, controller, cancel)? {
                ExportOutcome::Completed(_) => SyncOutcome::FullExport,
                ExportOutcome::Cancelled => SyncOutcome::Cancelled,
            });
        }
        if changes.is_empty() || !controller.state().has_session() {
            return Ok(SyncOutcome::Unchanged);
        }

        self.incremental_export(changes, scene, view, controller)?;
        Ok(SyncOutcome::Incremental(changes))
    }
}

fn cancelled(stage: &str) -> ExportOutcome {
    log::info!("Export cancelled before {stage}");
    ExportOutcome::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::nodes::{GraphId, MaterialCommon, MaterialOutputSettings, Node, NodeGraph, NodeKind, SocketValue};
    use crate::scene::{Light, LightGroup, LightKind, MeshData, SceneObject};
    use crate::session::{HaltConditions, RenderMode, SimulatedEngine};

    fn red_material(scene: &mut Scene) -> GraphId {
        let mut graph = NodeGraph::new("Red", GraphKind::Material);
        let matte = graph.add_node(
            Node::new("Matte", NodeKind::Matte(MaterialCommon::default()))
                .with_default("Diffuse Color", SocketValue::Color([0.5, 0.0, 0.0])),
        );
        let out = graph.add_node(Node::new("Output", NodeKind::MaterialOutput(MaterialOutputSettings::default())));
        graph.link(matte, out, "Material").unwrap();
        scene.graphs.insert(graph)
    }

    fn scene() -> Scene {
        let mut scene = Scene::new("unit");
        let red = red_material(&mut scene);
        scene.add_mesh("Cube", MeshData::cube(1.0));
        scene.add_object(SceneObject::new("Cube", "Cube").with_material(red));
        scene.add_object(SceneObject::new("Other", "Cube").with_material(red));
        scene.add_light(Light::new("Key", LightKind::Point { radius: 0.0 }));
        scene
    }

    fn controller() -> SessionController<SimulatedEngine> {
        SessionController::new(SimulatedEngine::default(), RenderMode::Viewport, HaltConditions::default())
    }

    fn never() -> impl FnMut() -> bool {
        || false
    }

    fn keys(props: &Properties) -> Vec<&str> {
        props.iter().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn test_description_order() {
        let mut log = ErrorLog::default();
        let outcome = Exporter::build_description(&scene(), None, &mut never(), &mut log);
        let description = outcome.description().unwrap();
        let keys = keys(&description.scene);

        let position = |key: &str| keys.iter().position(|k| *k == key).unwrap();
        assert!(position("scene.camera.type") < position("scene.materials.Red.type"));
        assert!(position("scene.materials.Red.type") < position("scene.shapes.mesh_Cube.type"));
        assert!(position("scene.shapes.mesh_Cube.type") < position("scene.objects.Cube.shape"));
        assert!(position("scene.objects.Other.shape") < position("scene.lights.Key.type"));
        assert_eq!(keys.iter().filter(|k| **k == "scene.materials.Red.type").count(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_unchanged_scene_exports_identically() {
        let scene = scene();
        let mut log = ErrorLog::default();
        let first = Exporter::build_description(&scene, None, &mut never(), &mut log);
        let second = Exporter::build_description(&scene, None, &mut never(), &mut log);
        let (first, second) = (first.description().unwrap(), second.description().unwrap());
        assert_eq!(first.to_text(), second.to_text());
    }

    #[test]
    fn test_cancel_mid_export_leaves_no_session() {
        let scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        let mut polls = 0;
        let mut cancel = || {
            polls += 1;
            polls > 3
        };

        let outcome = exporter.full_export(&scene, None, &mut controller, &mut cancel).unwrap();
        assert_eq!(outcome, ExportOutcome::Cancelled);
        assert_eq!(controller.state(), SessionState::Uninitialized);
        assert!(controller.session().is_none());
        assert_eq!(controller.engine().sessions_created(), 0);
        assert!(!exporter.detector().has_snapshot());
    }

    #[test]
    fn test_missing_mesh_is_skipped_with_warning() {
        let mut scene = scene();
        scene.add_object(SceneObject::new("Ghost", "Nowhere"));
        let mut log = ErrorLog::default();
        let outcome = Exporter::build_description(&scene, None, &mut never(), &mut log);
        let description = outcome.description().unwrap();
        assert!(!description.scene.contains("scene.objects.Ghost.shape"));
        assert_eq!(log.warning_count(), 2);
    }

    #[test]
    fn test_camera_only_change_skips_bracket() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        assert_eq!(
            exporter.sync(&scene, None, &mut controller, &mut never()).unwrap(),
            SyncOutcome::FullExport
        );

        scene.camera.transform = Mat4::new_translation(&Vec3::new(0.0, 0.0, 4.0));
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::Incremental(ChangeFlags::CAMERA));
        let session = controller.session().unwrap();
        assert_eq!(session.camera_updates(), 1);
        assert_eq!(session.edit_count(), 0);
    }

    #[test]
    fn test_object_edit_uses_bracket() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        scene.object_mut("Cube").unwrap().transform = Mat4::new_translation(&Vec3::new(2.0, 0.0, 0.0));
        scene.light_mut("Key").unwrap().gain = 3.0;
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::Incremental(ChangeFlags::OBJECT | ChangeFlags::LIGHT));

        let session = controller.session().unwrap();
        assert_eq!(session.edit_count(), 1);
        assert_eq!(controller.state(), SessionState::Running);
        let transform = &session.scene().get("scene.objects.Cube.transformation").unwrap().values;
        assert_eq!(transform[12].as_f32(), Some(2.0));
        assert_eq!(session.scene().get_f32("scene.lights.Key.gain", 0.0), 3.0);
    }

    #[test]
    fn test_material_edit_reexports_only_material() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        let red = scene.object("Cube").unwrap().material.unwrap();
        let graph = scene.graphs.get_mut(red).unwrap();
        let matte = graph.nodes().find(|(_, n)| n.name == "Matte").map(|(id, _)| id).unwrap();
        graph.node_mut(matte).unwrap().input_mut("Diffuse Color").unwrap().default = SocketValue::Color([0.0, 0.0, 0.5]);

        let changes = exporter.detector.get_changes(&scene, None);
        assert_eq!(changes, ChangeFlags::MATERIAL);
        let delta = exporter.export_delta(changes, &scene, None, &mut ErrorLog::default());
        assert_eq!(delta.get_unique_sub_names("scene.materials"), vec!["Red"]);
        assert!(delta.get_all_under("scene.objects").is_empty());
    }

    #[test]
    fn test_volume_edit_reexports_bound_materials() {
        let mut scene = scene();
        let mut fog = NodeGraph::new("Fog", GraphKind::Volume);
        let medium = fog.add_node(Node::new("Medium", NodeKind::Homogeneous { multiscattering: false }));
        let out = fog.add_node(Node::new("Output", NodeKind::VolumeOutput));
        fog.link(medium, out, "Volume").unwrap();
        let fog = scene.graphs.insert(fog);

        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        let graph = scene.graphs.get_mut(fog).unwrap();
        graph.node_mut(medium).unwrap().input_mut("Absorption").unwrap().default = SocketValue::Color([0.2, 0.2, 0.2]);

        let changes = exporter.detector.get_changes(&scene, None);
        assert_eq!(changes, ChangeFlags::VOLUME);
        let delta = exporter.export_delta(changes, &scene, None, &mut ErrorLog::default());
        assert_eq!(delta.get_unique_sub_names("scene.materials"), vec!["Red"]);
        assert!(delta.get_all_under("scene.objects").is_empty());
    }

    #[test]
    fn test_sync_from_paused_patches_session() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        controller.pause().unwrap();

        scene.object_mut("Cube").unwrap().transform = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::Incremental(ChangeFlags::OBJECT));
        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(controller.engine().sessions_created(), 1);
        assert_eq!(controller.session().unwrap().edit_count(), 1);
    }

    #[test]
    fn test_light_group_change_updates_pipeline() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        let mut sun = LightGroup::new(1, "Sun");
        sun.gain = 4.0;
        scene.light_groups.push(sun);
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::Incremental(ChangeFlags::LIGHTGROUPS));

        let session = controller.session().unwrap();
        assert_eq!(session.edit_count(), 0);
        assert_eq!(session.config().get_f32("film.imagepipelines.0.radiancescales.1.globalscale", 0.0), 4.0);
    }

    #[test]
    fn test_pipeline_change_does_not_restart() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        scene.image_pipeline.gamma = 1.0;
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::Incremental(ChangeFlags::IMAGEPIPELINE));
        let session = controller.session().unwrap();
        assert_eq!(session.edit_count(), 0);
        assert_eq!(session.config().get_f32("film.imagepipelines.0.1.value", 0.0), 1.0);
    }

    #[test]
    fn test_topology_change_recreates_session() {
        let mut scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();

        scene.remove_object("Other");
        let outcome = exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(outcome, SyncOutcome::FullExport);
        assert_eq!(controller.engine().sessions_created(), 2);
        assert!(!controller.session().unwrap().scene().contains("scene.objects.Other.shape"));
    }

    #[test]
    fn test_incremental_rejects_topology() {
        let scene = scene();
        let exporter = Exporter::new();
        let mut controller = controller();
        let err = exporter
            .incremental_export(ChangeFlags::OBJECT | ChangeFlags::REQUIRES_FULL_REEXPORT, &scene, None, &mut controller)
            .unwrap_err();
        assert_eq!(err, ExportError::RequiresFullExport(ChangeFlags::REQUIRES_FULL_REEXPORT));
    }

    #[test]
    fn test_sync_without_changes_does_nothing() {
        let scene = scene();
        let mut exporter = Exporter::new();
        let mut controller = controller();
        exporter.sync(&scene, None, &mut controller, &mut never()).unwrap();
        assert_eq!(
            exporter.sync(&scene, None, &mut controller, &mut never()).unwrap(),
            SyncOutcome::Unchanged
        );
    }
}
