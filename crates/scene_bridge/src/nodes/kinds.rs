//! Closed set of node kinds and their property statements
//!
//! Every kind knows its default sockets and how to turn already-exported
//! input values into statements. Recursion, naming and memoization live in
//! [`super::export`]; this module only formats one node at a time.

use std::path::PathBuf;

use super::export::{ExportedValue, HelperEntity, NodeInputs, NodeStatements};
use super::graph::{GraphId, GraphKind, Socket};
use crate::export::ExportError;
use crate::props::{IntoPropValues, Properties};

/// Fields shared by every material kind
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialCommon {
    /// Multiplier applied to the emission color
    pub emission_gain: f32,
    /// Light group the emission contributes to
    pub light_group: u32,
    /// Visible to indirect diffuse rays
    pub visible_indirect_diffuse: bool,
    /// Visible to indirect glossy rays
    pub visible_indirect_glossy: bool,
    /// Visible to indirect specular rays
    pub visible_indirect_specular: bool,
}

impl Default for MaterialCommon {
    fn default() -> Self {
        Self {
            emission_gain: 1.0,
            light_group: 0,
            visible_indirect_diffuse: true,
            visible_indirect_glossy: true,
            visible_indirect_specular: true,
        }
    }
}

/// Entity-level settings written by a material output node
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialOutputSettings {
    /// Material id for the material-id AOV
    pub id: Option<u32>,
    /// Render as shadow catcher
    pub shadow_catcher: bool,
    /// Render as holdout
    pub holdout: bool,
    /// Whether the photon GI cache may be used on this material
    pub use_photongi: bool,
    /// Volume graph filling the inside of the surface
    pub interior_volume: Option<GraphId>,
    /// Volume graph outside the surface
    pub exterior_volume: Option<GraphId>,
}

impl Default for MaterialOutputSettings {
    fn default() -> Self {
        Self {
            id: None,
            shadow_catcher: false,
            holdout: false,
            use_photongi: true,
            interior_volume: None,
            exterior_volume: None,
        }
    }
}

/// Scalar math operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// a + b
    Add,
    /// a - b
    Subtract,
    /// a * b
    Multiply,
    /// a / b
    Divide,
    /// a ^ b
    Power,
    /// |a|
    Absolute,
}

impl MathOp {
    fn texture_type(self) -> &'static str {
        match self {
            MathOp::Add => "add",
            MathOp::Subtract => "subtract",
            MathOp::Multiply => "scale",
            MathOp::Divide => "divide",
            MathOp::Power => "power",
            MathOp::Absolute => "abs",
        }
    }
}

/// Color combinator operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixOp {
    /// Linear blend by factor
    Mix,
    /// Sum
    Add,
    /// Difference
    Subtract,
    /// Product
    Multiply,
}

/// Every node kind the exporter understands
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Lambertian diffuse material
    Matte(MaterialCommon),
    /// Diffuse base with glossy coating
    Glossy {
        /// Shared material fields
        common: MaterialCommon,
        /// Simulate multiple bounces in the coating
        multibounce: bool,
    },
    /// Dielectric material
    Glass {
        /// Shared material fields
        common: MaterialCommon,
        /// Thin architectural glass without refraction
        architectural: bool,
    },
    /// Conductor with a fresnel color
    Metal(MaterialCommon),
    /// Blend of two materials
    Mix(MaterialCommon),
    /// Fully transparent material
    Null(MaterialCommon),

    /// Constant scalar texture
    ConstFloat,
    /// Constant color texture
    ConstColor,
    /// Image file texture
    ImageMap {
        /// Image file path
        path: PathBuf,
        /// Gamma the image is stored with
        gamma: f32,
        /// Brightness multiplier
        gain: f32,
    },
    /// 3D checker pattern
    Checker,
    /// Scalar math
    Math {
        /// Operation
        op: MathOp,
        /// Wrap the result into 0..1
        clamp_output: bool,
    },
    /// Color combinator
    ColorMix {
        /// Operation
        op: MixOp,
        /// Wrap the result into 0..1
        clamp_output: bool,
    },
    /// Explicit clamp
    Clamp {
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },

    /// Transparent medium with absorption only
    Clear,
    /// Uniform scattering medium
    Homogeneous {
        /// Trace multiple scattering
        multiscattering: bool,
    },
    /// Ray-marched scattering medium
    Heterogeneous {
        /// Ray-march step size
        step_size: f32,
        /// Ray-march step limit
        max_steps: u32,
        /// Trace multiple scattering
        multiscattering: bool,
    },

    /// Embeds another graph's active output by reference
    Pointer {
        /// Referenced graph
        target: Option<GraphId>,
    },

    /// Entry point of a material graph
    MaterialOutput(MaterialOutputSettings),
    /// Entry point of a texture graph
    TextureOutput,
    /// Entry point of a volume graph
    VolumeOutput,
}

impl NodeKind {
    /// What the node produces; `None` for pointers (resolved through their
    /// target) and output nodes
    pub fn category(&self) -> Option<GraphKind> {
        match self {
            NodeKind::Matte(_)
            | NodeKind::Glossy { .. }
            | NodeKind::Glass { .. }
            | NodeKind::Metal(_)
            | NodeKind::Mix(_)
            | NodeKind::Null(_) => Some(GraphKind::Material),
            NodeKind::ConstFloat
            | NodeKind::ConstColor
            | NodeKind::ImageMap { .. }
            | NodeKind::Checker
            | NodeKind::Math { .. }
            | NodeKind::ColorMix { .. }
            | NodeKind::Clamp { .. } => Some(GraphKind::Texture),
            NodeKind::Clear | NodeKind::Homogeneous { .. } | NodeKind::Heterogeneous { .. } => {
                Some(GraphKind::Volume)
            }
            NodeKind::Pointer { .. }
            | NodeKind::MaterialOutput(_)
            | NodeKind::TextureOutput
            | NodeKind::VolumeOutput => None,
        }
    }

    /// Whether this is an output node
    pub fn is_output(&self) -> bool {
        self.output_socket().is_some()
    }

    /// Name of the primary input of an output node
    pub fn output_socket(&self) -> Option<&'static str> {
        match self {
            NodeKind::MaterialOutput(_) => Some("Material"),
            NodeKind::TextureOutput => Some("Color"),
            NodeKind::VolumeOutput => Some("Volume"),
            _ => None,
        }
    }

    /// Graph kind an output node belongs to
    pub fn output_kind(&self) -> Option<GraphKind> {
        match self {
            NodeKind::MaterialOutput(_) => Some(GraphKind::Material),
            NodeKind::TextureOutput => Some(GraphKind::Texture),
            NodeKind::VolumeOutput => Some(GraphKind::Volume),
            _ => None,
        }
    }

    /// Kind name used in diagnostics and structure fingerprints
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Matte(_) => "Matte",
            NodeKind::Glossy { .. } => "Glossy",
            NodeKind::Glass { .. } => "Glass",
            NodeKind::Metal(_) => "Metal",
            NodeKind::Mix(_) => "Mix",
            NodeKind::Null(_) => "Null",
            NodeKind::ConstFloat => "ConstFloat",
            NodeKind::ConstColor => "ConstColor",
            NodeKind::ImageMap { .. } => "ImageMap",
            NodeKind::Checker => "Checker",
            NodeKind::Math { .. } => "Math",
            NodeKind::ColorMix { .. } => "ColorMix",
            NodeKind::Clamp { .. } => "Clamp",
            NodeKind::Clear => "Clear",
            NodeKind::Homogeneous { .. } => "Homogeneous",
            NodeKind::Heterogeneous { .. } => "Heterogeneous",
            NodeKind::Pointer { .. } => "Pointer",
            NodeKind::MaterialOutput(_) => "MaterialOutput",
            NodeKind::TextureOutput => "TextureOutput",
            NodeKind::VolumeOutput => "VolumeOutput",
        }
    }

    /// Sockets a freshly created node of this kind carries
    pub fn default_inputs(&self) -> Vec<Socket> {
        let mut inputs = match self {
            NodeKind::Matte(_) => vec![Socket::color("Diffuse Color", [0.7, 0.7, 0.7])],
            NodeKind::Glossy { .. } => vec![
                Socket::color("Diffuse Color", [0.7, 0.7, 0.7]),
                Socket::color("Specular Color", [0.05, 0.05, 0.05]),
                Socket::float("Roughness", 0.05),
            ],
            NodeKind::Glass { .. } => vec![
                Socket::color("Transmission Color", [1.0, 1.0, 1.0]),
                Socket::color("Reflection Color", [1.0, 1.0, 1.0]),
                Socket::float("IOR", 1.5),
            ],
            NodeKind::Metal(_) => vec![Socket::color("Color", [0.7, 0.7, 0.7]), Socket::float("Roughness", 0.05)],
            NodeKind::Mix(_) => vec![
                Socket::float("Fac", 0.5),
                Socket::material("Material 1"),
                Socket::material("Material 2"),
            ],
            NodeKind::Null(_) => Vec::new(),
            NodeKind::ConstFloat => vec![Socket::float("Value", 0.5)],
            NodeKind::ConstColor => vec![Socket::color("Color", [0.8, 0.8, 0.8])],
            NodeKind::ImageMap { .. } => Vec::new(),
            NodeKind::Checker => vec![
                Socket::color("Color 1", [1.0, 1.0, 1.0]),
                Socket::color("Color 2", [0.0, 0.0, 0.0]),
            ],
            NodeKind::Math { .. } => vec![Socket::float("Value 1", 0.5), Socket::float("Value 2", 0.5)],
            NodeKind::ColorMix { .. } => vec![
                Socket::float("Fac", 0.5),
                Socket::color("Color 1", [0.8, 0.8, 0.8]),
                Socket::color("Color 2", [0.0, 0.0, 0.0]),
            ],
            NodeKind::Clamp { .. } => vec![Socket::float("Value", 0.5)],
            NodeKind::Clear => vec![Socket::color("Absorption", [0.0, 0.0, 0.0]), Socket::float("IOR", 1.0)],
            NodeKind::Homogeneous { .. } | NodeKind::Heterogeneous { .. } => vec![
                Socket::color("Absorption", [0.0, 0.0, 0.0]),
                Socket::color("Scattering", [1.0, 1.0, 1.0]),
                Socket::vector("Asymmetry", [0.0, 0.0, 0.0]),
                Socket::float("IOR", 1.0),
            ],
            NodeKind::Pointer { .. } => Vec::new(),
            NodeKind::MaterialOutput(_) => vec![Socket::material("Material")],
            NodeKind::TextureOutput => vec![Socket::texture("Color")],
            NodeKind::VolumeOutput => vec![Socket::volume("Volume")],
        };

        if self.category() == Some(GraphKind::Material) {
            inputs.push(Socket::color("Emission", [0.0, 0.0, 0.0]));
            inputs.push(Socket::float("Opacity", 1.0));
            inputs.push(Socket::texture("Bump"));
        }
        inputs
    }

    /// Statements for one node whose inputs were already exported
    ///
    /// Pointers and outputs are handled by the export pass and yield no
    /// statements of their own.
    pub fn statements(&self, name: &str, inputs: &NodeInputs) -> Result<NodeStatements, ExportError> {
        let Some(category) = self.category() else {
            return Ok(NodeStatements::default());
        };
        let mut w = Writer::new(category.namespace(), name, inputs);

        match self {
            NodeKind::Matte(common) => {
                w.set("type", "matte");
                w.input("kd", "Diffuse Color");
                export_common(&mut w, common);
            }
            NodeKind::Glossy { common, multibounce } => {
                w.set("type", "glossy2");
                w.input("kd", "Diffuse Color");
                w.input("ks", "Specular Color");
                w.input("uroughness", "Roughness");
                w.input("vroughness", "Roughness");
                w.set("multibounce", *multibounce);
                export_common(&mut w, common);
            }
            NodeKind::Glass { common, architectural } => {
                w.set("type", if *architectural { "archglass" } else { "glass" });
                w.input("kt", "Transmission Color");
                w.input("kr", "Reflection Color");
                w.input("interiorior", "IOR");
                export_common(&mut w, common);
            }
            NodeKind::Metal(common) => {
                // The fresnel texture must precede the material referencing it
                let fresnel = format!("{name}_fresnel");
                let fresnel_prefix = format!("{}.{fresnel}", GraphKind::Texture.namespace());
                w.props.set(&fresnel_prefix, "type", "fresnelcolor");
                if let Some(values) = inputs.values("Color") {
                    w.props.set(&fresnel_prefix, "kr", values);
                }
                w.set("type", "metal2");
                w.set("fresnel", fresnel);
                w.input("uroughness", "Roughness");
                w.input("vroughness", "Roughness");
                export_common(&mut w, common);
            }
            NodeKind::Mix(common) => {
                w.set("type", "mix");
                w.input("material1", "Material 1");
                w.input("material2", "Material 2");
                w.input("amount", "Fac");
                export_common(&mut w, common);
            }
            NodeKind::Null(common) => {
                w.set("type", "null");
                export_common(&mut w, common);
            }
            NodeKind::ConstFloat => {
                w.set("type", "constfloat1");
                w.input("value", "Value");
            }
            NodeKind::ConstColor => {
                w.set("type", "constfloat3");
                w.input("value", "Color");
            }
            NodeKind::ImageMap { path, gamma, gain } => {
                if !path.is_file() {
                    return Err(ExportError::MissingImage { path: path.clone() });
                }
                w.set("type", "imagemap");
                w.set("file", path.display().to_string());
                w.set("gamma", *gamma);
                w.set("gain", *gain);
                w.set("mapping.type", "uvmapping2d");
            }
            NodeKind::Checker => {
                w.set("type", "checkerboard3d");
                w.input("texture1", "Color 1");
                w.input("texture2", "Color 2");
                w.set("mapping.type", "globalmapping3d");
            }
            NodeKind::Math { op, clamp_output } => {
                w.set("type", op.texture_type());
                if *op == MathOp::Absolute {
                    w.input("texture", "Value 1");
                } else {
                    w.input("texture1", "Value 1");
                    w.input("texture2", "Value 2");
                }
                return Ok(w.finish(*clamp_output));
            }
            NodeKind::ColorMix { op, clamp_output } => {
                match op {
                    MixOp::Mix => {
                        w.set("type", "mix");
                        w.input("amount", "Fac");
                    }
                    MixOp::Add => w.set("type", "add"),
                    MixOp::Subtract => w.set("type", "subtract"),
                    MixOp::Multiply => w.set("type", "scale"),
                }
                w.input("texture1", "Color 1");
                w.input("texture2", "Color 2");
                return Ok(w.finish(*clamp_output));
            }
            NodeKind::Clamp { min, max } => {
                w.set("type", "clamp");
                w.input("texture", "Value");
                w.set("min", *min);
                w.set("max", *max);
            }
            NodeKind::Clear => {
                w.set("type", "clear");
                w.input("absorption", "Absorption");
                w.input("ior", "IOR");
            }
            NodeKind::Homogeneous { multiscattering } => {
                w.set("type", "homogeneous");
                export_scattering(&mut w, *multiscattering);
            }
            NodeKind::Heterogeneous {
                step_size,
                max_steps,
                multiscattering,
            } => {
                w.set("type", "heterogeneous");
                export_scattering(&mut w, *multiscattering);
                w.set("steps.size", *step_size);
                w.set("steps.maxcount", *max_steps);
            }
            NodeKind::Pointer { .. }
            | NodeKind::MaterialOutput(_)
            | NodeKind::TextureOutput
            | NodeKind::VolumeOutput => {}
        }

        Ok(w.finish(false))
    }
}

/// Accumulates the statements of one node under `<namespace>.<name>`
struct Writer<'a> {
    props: Properties,
    prefix: String,
    name: &'a str,
    inputs: &'a NodeInputs,
}

impl<'a> Writer<'a> {
    fn new(namespace: &str, name: &'a str, inputs: &'a NodeInputs) -> Self {
        Self {
            props: Properties::new(),
            prefix: format!("{namespace}.{name}"),
            name,
            inputs,
        }
    }

    fn set(&mut self, field: &str, values: impl IntoPropValues) {
        self.props.set(&self.prefix, field, values);
    }

    /// Copy an exported input; unset inputs write nothing
    fn input(&mut self, field: &str, socket: &str) {
        if let Some(values) = self.inputs.values(socket) {
            self.props.set(&self.prefix, field, values);
        }
    }

    fn finish(self, clamp_output: bool) -> NodeStatements {
        let helper = clamp_output.then(|| clamp_helper(self.name));
        NodeStatements {
            own: self.props,
            helper,
        }
    }
}

/// `<name>_clamp` wrapper limiting a texture to 0..1
fn clamp_helper(name: &str) -> HelperEntity {
    let helper_name = format!("{name}_clamp");
    let prefix = format!("{}.{helper_name}", GraphKind::Texture.namespace());
    let mut props = Properties::new();
    props.set(&prefix, "type", "clamp");
    props.set(&prefix, "texture", name);
    props.set(&prefix, "min", 0.0);
    props.set(&prefix, "max", 1.0);
    HelperEntity {
        name: helper_name,
        props,
    }
}

/// Shared material fields; the same for every material kind
fn export_common(w: &mut Writer<'_>, common: &MaterialCommon) {
    let inputs = w.inputs;

    match inputs.get("Emission") {
        Some(ExportedValue::Named(texture)) => {
            w.set("emission", texture);
            export_emission_settings(w, common);
        }
        Some(ExportedValue::Literal(values)) if values.iter().any(|v| v.as_f32().unwrap_or(0.0) > 0.0) => {
            w.set("emission", values.clone());
            export_emission_settings(w, common);
        }
        _ => {}
    }

    match inputs.get("Opacity") {
        Some(ExportedValue::Named(texture)) => w.set("transparency", texture),
        Some(ExportedValue::Literal(values)) if values.first().and_then(|v| v.as_f32()) != Some(1.0) => {
            w.set("transparency", values.clone());
        }
        _ => {}
    }

    if let Some(ExportedValue::Named(texture)) = inputs.get("Bump") {
        w.set("bumptex", texture);
    }

    w.set("visibility.indirect.diffuse.enable", common.visible_indirect_diffuse);
    w.set("visibility.indirect.glossy.enable", common.visible_indirect_glossy);
    w.set("visibility.indirect.specular.enable", common.visible_indirect_specular);
}

fn export_emission_settings(w: &mut Writer<'_>, common: &MaterialCommon) {
    let gain = common.emission_gain;
    w.set("emission.gain", [gain, gain, gain]);
    w.set("emission.id", common.light_group);
}

fn export_scattering(w: &mut Writer<'_>, multiscattering: bool) {
    w.input("absorption", "Absorption");
    w.input("scattering", "Scattering");
    w.input("asymmetry", "Asymmetry");
    w.input("ior", "IOR");
    w.set("multiscattering", multiscattering);
}
