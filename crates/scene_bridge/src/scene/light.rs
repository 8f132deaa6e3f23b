//! Light sources and world settings

use crate::foundation::math::{Mat4, Rgb};
use crate::nodes::GraphId;

/// Light source shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Omnidirectional light
    Point {
        /// Emitter radius
        radius: f32,
    },
    /// Cone light looking down local -Z
    Spot {
        /// Full cone angle in degrees
        cone_angle: f32,
        /// Falloff width in degrees
        cone_delta: f32,
    },
    /// Sun with physical sky-independent disk
    Sun {
        /// Disk size relative to the real sun
        relsize: f32,
    },
    /// Directional light with an angular spread
    Distant {
        /// Spread angle in degrees
        theta: f32,
    },
}

/// A light in the editor scene
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Unique light name
    pub name: String,
    /// Shape and its parameters
    pub kind: LightKind,
    /// Emitted color
    pub color: Rgb,
    /// Intensity multiplier
    pub gain: f32,
    /// Light-to-world matrix
    pub transform: Mat4,
    /// Light group index
    pub light_group: u32,
    /// Excluded from rendering
    pub hidden: bool,
}

impl Light {
    /// White light at the identity transform
    pub fn new(name: impl Into<String>, kind: LightKind) -> Self {
        Self {
            name: name.into(),
            kind,
            color: [1.0, 1.0, 1.0],
            gain: 1.0,
            transform: Mat4::identity(),
            light_group: 0,
            hidden: false,
        }
    }

    /// Place the light
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Scene-wide environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct World {
    /// Constant background color and gain
    pub background: Option<(Rgb, f32)>,
    /// Volume graph filling all space not inside a volume-bound object
    pub volume: Option<GraphId>,
}
