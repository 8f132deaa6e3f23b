//! Math types shared by the scene model and the exporters
//!
//! Editor transforms are plain `nalgebra` matrices; the engine's property
//! language only understands flat float lists, so the helpers here convert
//! between the two.

pub use nalgebra::{Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// RGB color triple in linear space
pub type Rgb = [f32; 3];

/// Flatten a matrix into the 16 floats the engine expects (column-major).
pub fn flatten_matrix(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(matrix.as_slice());
    out
}

/// Camera frame extracted from an object-to-world matrix.
///
/// The editor convention is a camera looking down its local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    /// Eye position
    pub origin: Vec3,
    /// Point one unit in front of the eye
    pub target: Vec3,
    /// Up direction
    pub up: Vec3,
}

impl LookAt {
    /// Derive the look-at frame from a camera's world matrix
    pub fn from_world_matrix(matrix: &Mat4) -> Self {
        let origin = matrix.transform_point(&nalgebra::Point3::origin()).coords;
        let forward = matrix.transform_vector(&Vec3::new(0.0, 0.0, -1.0));
        let up = matrix.transform_vector(&Vec3::new(0.0, 1.0, 0.0));
        let forward = forward.try_normalize(f32::EPSILON).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0));
        let up = up.try_normalize(f32::EPSILON).unwrap_or_else(|| Vec3::new(0.0, 1.0, 0.0));

        Self {
            origin,
            target: origin + forward,
            up,
        }
    }

    /// Derive the look-at frame from a viewport's view matrix (world-to-camera)
    pub fn from_view_matrix(view: &Mat4) -> Self {
        let world = view.try_inverse().unwrap_or_else(Mat4::identity);
        Self::from_world_matrix(&world)
    }
}

/// Math utility functions
pub mod utils {
    /// Relative luminance of a linear RGB color (Rec. 709 weights)
    pub fn luminance(rgb: [f32; 3]) -> f32 {
        0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
    }
}
