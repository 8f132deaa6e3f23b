//! Light and world statements

use crate::diagnostics::ErrorLog;
use crate::foundation::math::{LookAt, Vec3};
use crate::nodes::{export_graph, GraphKind, GraphLibrary};
use crate::props::{sanitize_name, Properties};
use crate::scene::{Light, LightKind, World};

/// Entity name of the constant background light
///
/// Outside the range of [`sanitize_name`], so no scene light can replace it.
pub const BACKGROUND_LIGHT: &str = "_background";

fn xyz(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Engine name of a light
pub fn light_entity_name(light: &str) -> String {
    sanitize_name(light)
}

/// Statements for one light
pub fn export_light(light: &Light) -> Properties {
    let prefix = format!("scene.lights.{}", light_entity_name(&light.name));
    let look = LookAt::from_world_matrix(&light.transform);
    let forward = look.target - look.origin;
    let mut props = Properties::new();

    match light.kind {
        LightKind::Point { radius } if radius > 0.0 => {
            props.set(&prefix, "type", "sphere");
            props.set(&prefix, "position", xyz(&look.origin));
            props.set(&prefix, "radius", radius);
        }
        LightKind::Point { .. } => {
            props.set(&prefix, "type", "point");
            props.set(&prefix, "position", xyz(&look.origin));
        }
        LightKind::Spot { cone_angle, cone_delta } => {
            props.set(&prefix, "type", "spot");
            props.set(&prefix, "position", xyz(&look.origin));
            props.set(&prefix, "target", xyz(&look.target));
            props.set(&prefix, "coneangle", cone_angle * 0.5);
            props.set(&prefix, "conedeltaangle", cone_delta);
        }
        LightKind::Sun { relsize } => {
            // Points towards the sun
            props.set(&prefix, "type", "sun");
            props.set(&prefix, "dir", xyz(&-forward));
            props.set(&prefix, "relsize", relsize);
        }
        LightKind::Distant { theta } => {
            props.set(&prefix, "type", "distant");
            props.set(&prefix, "direction", xyz(&forward));
            props.set(&prefix, "theta", theta);
        }
    }

    props.set(&prefix, "color", light.color);
    props.set(&prefix, "gain", [light.gain; 3]);
    props.set(&prefix, "id", light.light_group);
    props
}

/// Background light and default world volume
///
/// The world volume is exported before the statement that references it.
pub fn export_world(world: &World, library: &GraphLibrary, log: &mut ErrorLog) -> Properties {
    let mut props = Properties::new();
    if let Some((color, gain)) = world.background {
        let prefix = format!("scene.lights.{BACKGROUND_LIGHT}");
        props.set(&prefix, "type", "constantinfinite");
        props.set(&prefix, "color", color);
        props.set(&prefix, "gain", [gain; 3]);
    }
    if let Some(volume) = world.volume {
        let name = export_graph(library, volume, &mut props, None, GraphKind::Volume, log);
        props.set_key("scene.world.volume.default", name);
    }
    props
}
