//! Render configuration and image pipeline statements

use crate::props::Properties;
use crate::scene::{LightGroup, Scene, Tonemapper, ViewContext};

const PIPELINE: &str = "film.imagepipelines.0";

/// Engine, sampler, path depths and film size
///
/// A viewport renders at the viewport's size instead of the scene's film size.
pub fn export_config(scene: &Scene, view: Option<&ViewContext>) -> Properties {
    let render = &scene.render;
    let (width, height) = view.map_or((scene.film.width, scene.film.height), |v| (v.width, v.height));

    let mut props = Properties::new();
    props.set_key("renderengine.type", render.engine.engine_type());
    props.set_key("renderengine.seed", render.seed);
    props.set_key("sampler.type", render.sampler.sampler_type());
    props.set_key("path.pathdepth.total", render.max_depth);
    props.set_key("path.pathdepth.diffuse", render.diffuse_depth);
    props.set_key("path.pathdepth.glossy", render.glossy_depth);
    props.set_key("path.pathdepth.specular", render.specular_depth);
    if let Some(clamp) = render.clamping {
        props.set_key("path.clamping.variance.maxvalue", clamp);
    }
    props.set_key("lightstrategy.type", render.light_strategy.strategy_type());
    props.set_key("film.width", width.max(1));
    props.set_key("film.height", height.max(1));
    props.set_key("film.outputs.0.type", "RGB_IMAGEPIPELINE");
    props.set_key("film.outputs.0.index", 0);
    props.merge(&export_image_pipeline(scene));
    props
}

/// Tonemapper, gamma and light group scales
///
/// These can be swapped on a running session without restarting sampling.
pub fn export_image_pipeline(scene: &Scene) -> Properties {
    let pipeline = &scene.image_pipeline;
    let tonemap = format!("{PIPELINE}.0");
    let gamma = format!("{PIPELINE}.1");

    let mut props = Properties::new();
    match pipeline.tonemapper {
        Tonemapper::Linear { scale } => {
            props.set(&tonemap, "type", "TONEMAP_LINEAR");
            props.set(&tonemap, "scale", scale);
        }
        Tonemapper::Reinhard { prescale, postscale, burn } => {
            props.set(&tonemap, "type", "TONEMAP_REINHARD02");
            props.set(&tonemap, "prescale", prescale);
            props.set(&tonemap, "postscale", postscale);
            props.set(&tonemap, "burn", burn);
        }
        Tonemapper::AutoLinear => {
            props.set(&tonemap, "type", "TONEMAP_AUTOLINEAR");
        }
    }
    props.set(&gamma, "type", "GAMMA_CORRECTION");
    props.set(&gamma, "value", pipeline.gamma);

    for group in &scene.light_groups {
        export_light_group(group, &mut props);
    }
    props
}

fn export_light_group(group: &LightGroup, props: &mut Properties) {
    let prefix = format!("{PIPELINE}.radiancescales.{}", group.id);
    props.set(&prefix, "enabled", group.enabled);
    props.set(&prefix, "globalscale", group.gain);
    props.set(&prefix, "rgbscale", group.rgb_scale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::{EngineKind, Projection};

    #[test]
    fn test_config_statements() {
        let mut scene = Scene::new("config");
        scene.render.engine = EngineKind::BidirCpu;
        scene.render.clamping = Some(10.0);
        let props = export_config(&scene, None);

        assert_eq!(props.get_str("renderengine.type"), Some("BIDIRCPU"));
        assert_eq!(props.get_i64("film.width", 0), 640);
        assert_eq!(props.get_f32("path.clamping.variance.maxvalue", 0.0), 10.0);
        assert_eq!(props.get_str("film.imagepipelines.0.1.type"), Some("GAMMA_CORRECTION"));
    }

    #[test]
    fn test_viewport_film_size() {
        let scene = Scene::new("config");
        let view = ViewContext::new(Mat4::identity(), Projection::default(), 300, 200);
        let props = export_config(&scene, Some(&view));
        assert_eq!(props.get_i64("film.width", 0), 300);
        assert_eq!(props.get_i64("film.height", 0), 200);
        assert!(!props.contains("path.clamping.variance.maxvalue"));
    }

    #[test]
    fn test_light_group_scales() {
        let mut scene = Scene::new("groups");
        let mut group = LightGroup::new(2, "Fill");
        group.gain = 0.5;
        scene.light_groups.push(group);
        scene.image_pipeline.tonemapper = Tonemapper::Reinhard {
            prescale: 1.0,
            postscale: 1.2,
            burn: 3.75,
        };

        let props = export_image_pipeline(&scene);
        assert_eq!(props.get_str("film.imagepipelines.0.0.type"), Some("TONEMAP_REINHARD02"));
        assert_eq!(props.get_f32("film.imagepipelines.0.radiancescales.2.globalscale", 0.0), 0.5);
        assert!(props.get_bool("film.imagepipelines.0.radiancescales.2.enabled", false));
    }
}
