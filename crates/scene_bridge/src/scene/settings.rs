//! Render, film and image pipeline settings
//!
//! These are persisted with the rest of the configuration, so every type here
//! is serde-serializable and fills missing fields with defaults.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Rgb;

/// Engine integrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Path tracer on the CPU
    PathCpu,
    /// Path tracer on OpenCL devices
    PathOcl,
    /// Bidirectional path tracer (CPU only)
    BidirCpu,
}

impl EngineKind {
    /// Value of `renderengine.type`
    pub fn engine_type(self) -> &'static str {
        match self {
            EngineKind::PathCpu => "PATHCPU",
            EngineKind::PathOcl => "PATHOCL",
            EngineKind::BidirCpu => "BIDIRCPU",
        }
    }
}

/// Sample generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerKind {
    /// Low-discrepancy sequence
    Sobol,
    /// Metropolis light transport mutations
    Metropolis,
    /// Uniform random
    Random,
}

impl SamplerKind {
    /// Value of `sampler.type`
    pub fn sampler_type(self) -> &'static str {
        match self {
            SamplerKind::Sobol => "SOBOL",
            SamplerKind::Metropolis => "METROPOLIS",
            SamplerKind::Random => "RANDOM",
        }
    }
}

/// How lights are picked for direct light sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightStrategy {
    /// Proportional to the logarithm of emitted power
    LogPower,
    /// Proportional to emitted power
    Power,
    /// Uniform
    Uniform,
}

impl LightStrategy {
    /// Value of `lightstrategy.type`
    pub fn strategy_type(self) -> &'static str {
        match self {
            LightStrategy::LogPower => "LOG_POWER",
            LightStrategy::Power => "POWER",
            LightStrategy::Uniform => "UNIFORM",
        }
    }
}

/// Integrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Integrator
    pub engine: EngineKind,
    /// Sampler
    pub sampler: SamplerKind,
    /// Total path depth
    pub max_depth: u32,
    /// Diffuse bounce limit
    pub diffuse_depth: u32,
    /// Glossy bounce limit
    pub glossy_depth: u32,
    /// Specular bounce limit
    pub specular_depth: u32,
    /// Radiance clamp against fireflies; `None` disables clamping
    pub clamping: Option<f32>,
    /// Light sampling strategy
    pub light_strategy: LightStrategy,
    /// Random seed
    pub seed: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::PathCpu,
            sampler: SamplerKind::Sobol,
            max_depth: 6,
            diffuse_depth: 4,
            glossy_depth: 4,
            specular_depth: 6,
            clamping: None,
            light_strategy: LightStrategy::LogPower,
            seed: 1,
        }
    }
}

/// Final render resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilmSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for FilmSize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Tonemapping operator of the image pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tonemapper {
    /// Linear scale
    Linear {
        /// Exposure multiplier
        scale: f32,
    },
    /// Reinhard 02 operator
    Reinhard {
        /// Scale before mapping
        prescale: f32,
        /// Scale after mapping
        postscale: f32,
        /// Highlight burn
        burn: f32,
    },
    /// Automatic linear exposure
    AutoLinear,
}

/// Post-processing applied by the engine before frames are pulled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePipeline {
    /// Tonemapper
    pub tonemapper: Tonemapper,
    /// Output gamma
    pub gamma: f32,
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self {
            tonemapper: Tonemapper::Linear { scale: 1.0 },
            gamma: 2.2,
        }
    }
}

/// Per-light-group scaling, applied without restarting the render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGroup {
    /// Group index referenced by lights and emissive materials
    pub id: u32,
    /// Display name
    pub name: String,
    /// Whether the group contributes at all
    pub enabled: bool,
    /// Brightness multiplier
    pub gain: f32,
    /// Color tint
    pub rgb_scale: Rgb,
}

impl LightGroup {
    /// Enabled group with neutral scaling
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            gain: 1.0,
            rgb_scale: [1.0, 1.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_settings_fill_missing_fields() {
        let settings: RenderSettings = toml::from_str("max_depth = 12\nengine = \"BidirCpu\"\n").unwrap();
        assert_eq!(settings.max_depth, 12);
        assert_eq!(settings.engine.engine_type(), "BIDIRCPU");
        assert_eq!(settings.seed, RenderSettings::default().seed);
    }

    #[test]
    fn test_engine_type_names() {
        assert_eq!(EngineKind::PathOcl.engine_type(), "PATHOCL");
        assert_eq!(SamplerKind::Metropolis.sampler_type(), "METROPOLIS");
        assert_eq!(LightStrategy::LogPower.strategy_type(), "LOG_POWER");
    }
}
