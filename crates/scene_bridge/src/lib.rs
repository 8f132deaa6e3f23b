//! # Scene Bridge
//!
//! Connects a mutable, node-graph based scene editor to an external
//! session-oriented path tracer that is configured through flat
//! `dotted.key = value` property statements.
//!
//! ## Features
//!
//! - **Property statements**: ordered, hierarchical key/value sets ([`props`])
//! - **Node export**: memoized, cycle-aware compilation of material, texture
//!   and volume graphs ([`nodes`])
//! - **Change tracking**: fingerprint snapshots that decide between patching
//!   a running session and re-exporting ([`export::ChangeDetector`])
//! - **Session lifecycle**: an explicit state machine around the engine
//!   session with halt conditions ([`session`])
//! - **Display refresh**: a non-blocking tick API for polling statistics and
//!   pulling frames ([`display`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_bridge::prelude::*;
//!
//! fn main() -> Result<(), BridgeError> {
//!     scene_bridge::foundation::logging::init();
//!
//!     let mut scene = Scene::new("demo");
//!     scene.add_mesh("Cube", MeshData::cube(1.0));
//!     scene.add_object(SceneObject::new("Cube", "Cube"));
//!
//!     let config = BridgeConfig::default();
//!     let mut controller = config.controller(SimulatedEngine::default(), RenderMode::Final);
//!     let mut exporter = Exporter::new();
//!     exporter.full_export(&scene, None, &mut controller, &mut || false)?;
//!
//!     let mut refresher = config.refresher(RenderMode::Final);
//!     let mut surface = NullSurface;
//!     loop {
//!         let now = std::time::Instant::now();
//!         match refresher.drive(now, &mut controller, &mut surface, &mut || false)? {
//!             DriveStatus::Finished | DriveStatus::Cancelled => break,
//!             _ => std::thread::sleep(refresher.next_wakeup(now) - now),
//!         }
//!     }
//!     Ok(())
//! }
//!
//! struct NullSurface;
//!
//! impl DisplaySurface for NullSurface {
//!     fn present(&mut self, _frame: &Framebuffer) {}
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod diagnostics;
pub mod display;
pub mod export;
pub mod foundation;
pub mod nodes;
pub mod props;
pub mod scene;
pub mod session;

mod error;

pub use error::{BridgeError, BridgeResult};

/// Common imports for bridge users
pub mod prelude {
    pub use crate::{
        config::{BridgeConfig, Config, ConfigError},
        diagnostics::{ErrorLog, JobStatus, Severity},
        display::{DisplayRefresher, DisplaySurface, DriveStatus, Framebuffer, RefreshSettings},
        export::{ChangeFlags, ExportError, ExportOutcome, Exporter, SyncOutcome},
        foundation::math::{Mat4, Vec3},
        nodes::{
            GraphId, GraphKind, GraphLibrary, MaterialCommon, MaterialOutputSettings, Node, NodeGraph, NodeKind,
            SocketValue,
        },
        props::{PropValue, Properties},
        scene::{Camera, Light, LightKind, MeshData, Projection, Scene, SceneObject, ViewContext},
        session::{
            HaltConditions, HaltReason, RenderDescription, RenderEngine, RenderMode, SessionController,
            SessionState, SimulatedEngine,
        },
        BridgeError, BridgeResult,
    };
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::prelude::*;
    use crate::session::SimulatedConfig;

    fn red_matte_scene() -> Scene {
        let mut scene = Scene::new("e2e");
        scene.film.width = 32;
        scene.film.height = 24;
        scene.camera = Camera::perspective(45.0, Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)));

        let mut graph = NodeGraph::new("Red", GraphKind::Material);
        let matte = graph.add_node(
            Node::new("Matte", NodeKind::Matte(MaterialCommon::default()))
                .with_default("Diffuse Color", SocketValue::Color([0.5, 0.0, 0.0])),
        );
        let out = graph.add_node(Node::new("Output", NodeKind::MaterialOutput(MaterialOutputSettings::default())));
        graph.link(matte, out, "Material").unwrap();
        let red = scene.graphs.insert(graph);

        scene.add_mesh("Cube", MeshData::cube(1.0));
        scene.add_object(SceneObject::new("Cube", "Cube").with_material(red));
        scene
    }

    fn final_controller(halt: HaltConditions) -> SessionController<SimulatedEngine> {
        let engine = SimulatedEngine::new(SimulatedConfig {
            samples_per_update: 8,
            ..Default::default()
        });
        SessionController::new(engine, RenderMode::Final, halt)
    }

    #[test]
    fn test_matte_statements_in_text_form() {
        let mut controller = final_controller(HaltConditions::default());
        let outcome = Exporter::new()
            .full_export(&red_matte_scene(), None, &mut controller, &mut || false)
            .unwrap();
        let text = outcome.description().unwrap().to_text();

        assert!(text.contains("scene.materials.Red.type = \"matte\"\n"));
        assert!(text.contains("scene.materials.Red.kd = 0.5, 0.0, 0.0\n"));
        assert!(text.contains("scene.objects.Cube.material = \"Red\"\n"));
    }

    #[test]
    fn test_full_export_is_repeatable() {
        let scene = red_matte_scene();
        let mut exporter = Exporter::new();
        let mut controller = final_controller(HaltConditions::default());
        let first = exporter.full_export(&scene, None, &mut controller, &mut || false).unwrap();
        let second = exporter.full_export(&scene, None, &mut controller, &mut || false).unwrap();
        assert_eq!(
            first.description().unwrap().to_text(),
            second.description().unwrap().to_text()
        );
        assert_eq!(controller.engine().sessions_created(), 2);
    }

    #[test]
    fn test_sample_halt_ends_final_render() {
        let mut controller = final_controller(HaltConditions::samples(32));
        Exporter::new()
            .full_export(&red_matte_scene(), None, &mut controller, &mut || false)
            .unwrap();

        assert_eq!(controller.poll_stats().unwrap().samples, 0);
        assert_eq!(controller.check_halt().unwrap(), None);
        loop {
            let samples = controller.poll_stats().unwrap().samples;
            let halted = controller.check_halt().unwrap();
            if samples < 32 {
                assert_eq!(halted, None);
                assert_eq!(controller.state(), SessionState::Running);
            } else {
                assert_eq!(halted, Some(HaltReason::Samples));
                assert_eq!(controller.state(), SessionState::Stopping);
                break;
            }
        }
        controller.stop().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);
    }

    #[test]
    fn test_refresher_drives_render_to_completion() {
        let mut controller = final_controller(HaltConditions::samples(16));
        Exporter::new()
            .full_export(&red_matte_scene(), None, &mut controller, &mut || false)
            .unwrap();

        struct Frames(u32);
        impl DisplaySurface for Frames {
            fn present(&mut self, _frame: &Framebuffer) {
                self.0 += 1;
            }
        }

        let mut refresher = DisplayRefresher::new(RefreshSettings::final_render());
        let mut surface = Frames(0);
        let start = Instant::now();
        let mut status = DriveStatus::Idle;
        for second in 0..10 {
            let now = start + Duration::from_secs(second);
            status = refresher.drive(now, &mut controller, &mut surface, &mut || false).unwrap();
            if status == DriveStatus::Finished {
                break;
            }
        }
        assert_eq!(status, DriveStatus::Finished);
        assert_eq!(controller.state(), SessionState::Stopped);
        assert_eq!(controller.halt_reason(), Some(HaltReason::Samples));
        assert!(surface.0 >= 1);
        assert!(refresher.clamp_suggestion().is_some());
    }

    #[test]
    fn test_broken_material_falls_back_with_one_warning() {
        let mut scene = red_matte_scene();
        let mut broken = NodeGraph::new("Broken", GraphKind::Material);
        broken.add_node(Node::new("Output", NodeKind::MaterialOutput(MaterialOutputSettings::default())));
        let broken = scene.graphs.insert(broken);
        scene.add_object(SceneObject::new("A", "Cube").with_material(broken));
        scene.add_object(SceneObject::new("B", "Cube").with_material(broken));

        let mut controller = final_controller(HaltConditions::default());
        let outcome = Exporter::new()
            .full_export(&scene, None, &mut controller, &mut || false)
            .unwrap();
        let description = outcome.description().unwrap();
        assert_eq!(description.scene.get_str("scene.materials.Broken.type"), Some("matte"));
        assert_eq!(controller.log().len(), 1);
        assert_eq!(controller.log().warning_count(), 1);
    }

    #[test]
    fn test_engine_failure_leaves_no_session() {
        let engine = SimulatedEngine::new(SimulatedConfig {
            fail_on: Some(crate::session::EngineCall::Start),
            ..Default::default()
        });
        let mut controller = SessionController::new(engine, RenderMode::Final, HaltConditions::default());
        let err = Exporter::new()
            .full_export(&red_matte_scene(), None, &mut controller, &mut || false)
            .unwrap_err();

        assert!(matches!(err, ExportError::Session(_)));
        assert_eq!(controller.state(), SessionState::Errored);
        assert!(controller.session().is_none());
        assert!(controller.status().error.is_some());
    }
}
