//! Scene camera and viewport override

use crate::foundation::math::Mat4;

/// Camera projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection with a horizontal field of view
    Perspective {
        /// Field of view in degrees
        fov_deg: f32,
    },
    /// Parallel projection
    Orthographic {
        /// Width of the visible area in world units
        scale: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective { fov_deg: 49.1 }
    }
}

/// The scene's render camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Projection
    pub projection: Projection,
    /// Camera-to-world matrix; the camera looks down local -Z
    pub transform: Mat4,
    /// Near clipping distance
    pub clip_near: f32,
    /// Far clipping distance
    pub clip_far: f32,
    /// Lens radius for depth of field (0 disables it)
    pub lens_radius: f32,
    /// Focus distance used when depth of field is enabled
    pub focal_distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::default(),
            transform: Mat4::identity(),
            clip_near: 0.1,
            clip_far: 1000.0,
            lens_radius: 0.0,
            focal_distance: 10.0,
        }
    }
}

impl Camera {
    /// Perspective camera at `transform`
    pub fn perspective(fov_deg: f32, transform: Mat4) -> Self {
        Self {
            projection: Projection::Perspective { fov_deg },
            transform,
            ..Default::default()
        }
    }
}

/// Editor viewport the render is displayed in.
///
/// When present it replaces the scene camera's frame and projection and the
/// film size, so the render matches what the user sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext {
    /// World-to-view matrix
    pub view_matrix: Mat4,
    /// Viewport projection
    pub projection: Projection,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl ViewContext {
    /// Viewport of the given size looking through `view_matrix`
    pub fn new(view_matrix: Mat4, projection: Projection, width: u32, height: u32) -> Self {
        Self {
            view_matrix,
            projection,
            width,
            height,
        }
    }
}
