//! Camera statements

use crate::foundation::math::LookAt;
use crate::props::Properties;
use crate::scene::{Projection, Scene, ViewContext};

const PREFIX: &str = "scene.camera";

/// Camera statements for the scene camera, or the viewport when `view` is given
pub fn export_camera(scene: &Scene, view: Option<&ViewContext>) -> Properties {
    let camera = &scene.camera;
    let (look, projection, width, height) = match view {
        Some(view) => (
            LookAt::from_view_matrix(&view.view_matrix),
            view.projection,
            view.width,
            view.height,
        ),
        None => (
            LookAt::from_world_matrix(&camera.transform),
            camera.projection,
            scene.film.width,
            scene.film.height,
        ),
    };

    let mut props = Properties::new();
    match projection {
        Projection::Perspective { fov_deg } => {
            props.set(PREFIX, "type", "perspective");
            props.set(PREFIX, "fieldofview", fov_deg);
        }
        Projection::Orthographic { scale } => {
            props.set(PREFIX, "type", "orthographic");
            props.set(PREFIX, "screenwindow", screen_window(scale, width, height));
        }
    }
    props.set(PREFIX, "lookat.orig", [look.origin.x, look.origin.y, look.origin.z]);
    props.set(PREFIX, "lookat.target", [look.target.x, look.target.y, look.target.z]);
    props.set(PREFIX, "up", [look.up.x, look.up.y, look.up.z]);
    props.set(PREFIX, "cliphither", camera.clip_near);
    props.set(PREFIX, "clipyon", camera.clip_far);

    if view.is_none() && camera.lens_radius > 0.0 {
        props.set(PREFIX, "lensradius", camera.lens_radius);
        props.set(PREFIX, "focaldistance", camera.focal_distance);
    }
    props
}

/// Visible area of an orthographic camera, fitted to the film's aspect ratio
fn screen_window(scale: f32, width: u32, height: u32) -> [f32; 4] {
    let half = scale * 0.5;
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    if aspect >= 1.0 {
        [-half, half, -half / aspect, half / aspect]
    } else {
        [-half * aspect, half * aspect, -half, half]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::props::PropValue;

    #[test]
    fn test_perspective_camera() {
        let mut scene = Scene::new("cam");
        scene.camera.transform = Mat4::new_translation(&Vec3::new(0.0, 1.0, 5.0));
        let props = export_camera(&scene, None);

        assert_eq!(props.get_str("scene.camera.type"), Some("perspective"));
        assert_eq!(
            props.get("scene.camera.lookat.orig").unwrap().values,
            vec![PropValue::Float(0.0), PropValue::Float(1.0), PropValue::Float(5.0)]
        );
        assert_eq!(
            props.get("scene.camera.lookat.target").unwrap().values,
            vec![PropValue::Float(0.0), PropValue::Float(1.0), PropValue::Float(4.0)]
        );
        assert!(!props.contains("scene.camera.lensradius"));
    }

    #[test]
    fn test_viewport_overrides_scene_camera() {
        let mut scene = Scene::new("cam");
        scene.camera.lens_radius = 0.1;
        let view_from = Mat4::new_translation(&Vec3::new(0.0, 0.0, 3.0));
        let view = ViewContext::new(view_from.try_inverse().unwrap(), Projection::Orthographic { scale: 4.0 }, 200, 100);
        let props = export_camera(&scene, Some(&view));

        assert_eq!(props.get_str("scene.camera.type"), Some("orthographic"));
        assert_eq!(
            props.get("scene.camera.screenwindow").unwrap().values,
            vec![
                PropValue::Float(-2.0),
                PropValue::Float(2.0),
                PropValue::Float(-1.0),
                PropValue::Float(1.0)
            ]
        );
        assert!((props.get_f32("scene.camera.lookat.orig", 0.0) - 0.0).abs() < 1e-6);
        assert!(!props.contains("scene.camera.lensradius"));
    }
}
