//! Scene bridge demo
//!
//! Builds a small random scene, renders it to completion against the
//! simulated engine and writes the final frame to `final.png`. Then opens a
//! viewport session and applies a few live edits, showing which ones are
//! patched into the running session and which force a new one.
//!
//! Usage: `bridge_demo [config.toml|config.ron]`

use std::time::{Duration, Instant};

use rand::prelude::*;
use scene_bridge::prelude::*;

const OUTPUT_PATH: &str = "final.png";
const CUBE_COUNT: usize = 4;
const VIEWPORT_SAMPLES: u32 = 64;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Could not write {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Frame buffer size does not match {0}x{1}")]
    FrameSize(u32, u32),

    #[error("The render finished without presenting a frame")]
    NoFrame,

    #[error("The render engine failed: {0}")]
    EngineFailed(String),
}

impl From<ConfigError> for DemoError {
    fn from(err: ConfigError) -> Self {
        DemoError::Bridge(err.into())
    }
}

impl From<ExportError> for DemoError {
    fn from(err: ExportError) -> Self {
        DemoError::Bridge(err.into())
    }
}

impl From<scene_bridge::session::SessionError> for DemoError {
    fn from(err: scene_bridge::session::SessionError) -> Self {
        DemoError::Bridge(err.into())
    }
}

/// Keeps the last presented frame and prints status lines
#[derive(Default)]
struct DemoSurface {
    last_frame: Option<Framebuffer>,
    frames: u32,
}

impl DisplaySurface for DemoSurface {
    fn present(&mut self, frame: &Framebuffer) {
        self.frames += 1;
        self.last_frame = Some(frame.clone());
    }

    fn set_status(&mut self, text: &str) {
        log::info!("{text}");
    }
}

fn material(scene: &mut Scene, name: &str, color: [f32; 3]) -> Result<GraphId, BridgeError> {
    let mut graph = NodeGraph::new(name, GraphKind::Material);
    let matte = graph.add_node(
        Node::new("Matte", NodeKind::Matte(MaterialCommon::default()))
            .with_default("Diffuse Color", SocketValue::Color(color)),
    );
    let output = graph.add_node(Node::new(
        "Output",
        NodeKind::MaterialOutput(MaterialOutputSettings::default()),
    ));
    graph.link(matte, output, "Material")?;
    Ok(scene.graphs.insert(graph))
}

fn build_scene(config: &BridgeConfig, rng: &mut impl Rng) -> Result<Scene, BridgeError> {
    let mut scene = Scene::new("bridge_demo");
    config.apply_to(&mut scene);
    scene.camera = Camera::perspective(40.0, Mat4::new_translation(&Vec3::new(0.0, 1.0, 8.0)));

    scene.add_mesh("Cube", MeshData::cube(1.0));
    scene.add_mesh("Floor", MeshData::plane(20.0));
    let floor = material(&mut scene, "Floor", [0.6, 0.6, 0.6])?;
    scene.add_object(SceneObject::new("Floor", "Floor").with_material(floor));

    for i in 0..CUBE_COUNT {
        let color = [rng.gen_range(0.1..0.9), rng.gen_range(0.1..0.9), rng.gen_range(0.1..0.9)];
        let id = material(&mut scene, &format!("Paint {i}"), color)?;
        let position = Vec3::new(rng.gen_range(-3.0..3.0), 0.5, rng.gen_range(-3.0..0.0));
        scene.add_object(
            SceneObject::new(format!("Cube {i}"), "Cube")
                .with_material(id)
                .with_transform(Mat4::new_translation(&position)),
        );
    }

    scene.add_light(
        Light::new("Key", LightKind::Point { radius: 0.1 })
            .with_transform(Mat4::new_translation(&Vec3::new(2.0, 4.0, 3.0))),
    );
    scene.world.background = Some(([0.05, 0.06, 0.08], 1.0));
    Ok(scene)
}

/// Drive a final render to its halt condition on a virtual clock
fn final_render(config: &BridgeConfig, scene: &Scene) -> Result<Framebuffer, DemoError> {
    let mut controller = config.controller(SimulatedEngine::default(), RenderMode::Final);
    let mut exporter = Exporter::new();
    if exporter.full_export(scene, None, &mut controller, &mut || false)? == ExportOutcome::Cancelled {
        log::warn!("Export cancelled");
        return Err(DemoError::NoFrame);
    }

    let mut refresher = config.refresher(RenderMode::Final);
    let mut surface = DemoSurface::default();
    let mut now = Instant::now();
    loop {
        match refresher.drive(now, &mut controller, &mut surface, &mut || false)? {
            DriveStatus::Finished | DriveStatus::Cancelled => break,
            DriveStatus::Failed => {
                let reason = controller.status().error.clone().unwrap_or_default();
                return Err(DemoError::EngineFailed(reason));
            }
            _ => now = refresher.next_wakeup(now).max(now + Duration::from_millis(1)),
        }
    }

    log::info!(
        "Final render finished ({}) after {} frames",
        controller.halt_reason().map_or_else(|| "stopped".to_string(), |r| r.to_string()),
        surface.frames
    );
    if let Some(clamp) = refresher.clamp_suggestion() {
        log::info!("Suggested clamp value: {clamp:.2}");
    }
    for entry in controller.log().entries() {
        log::warn!("{entry}");
    }

    surface.last_frame.ok_or(DemoError::NoFrame)
}

fn save_png(frame: &Framebuffer) -> Result<(), DemoError> {
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba8())
        .ok_or(DemoError::FrameSize(frame.width, frame.height))?;
    image.save(OUTPUT_PATH).map_err(|source| DemoError::Image {
        path: OUTPUT_PATH.to_string(),
        source,
    })?;
    log::info!("Wrote {}x{} frame to {OUTPUT_PATH}", frame.width, frame.height);
    Ok(())
}

/// Open a viewport session and apply a series of edits
fn viewport_session(config: &BridgeConfig, mut scene: Scene) -> Result<(), DemoError> {
    let mut controller = config.controller(SimulatedEngine::default(), RenderMode::Viewport);
    // Cap the preview so an idle viewport stops sampling
    controller.set_halt_conditions(HaltConditions::samples(VIEWPORT_SAMPLES));
    let mut exporter = Exporter::new();
    let view = ViewContext::new(
        Mat4::new_translation(&Vec3::new(0.0, -1.0, -8.0)),
        Projection::Perspective { fov_deg: 50.0 },
        320,
        180,
    );

    let outcome = exporter.sync(&scene, Some(&view), &mut controller, &mut || false)?;
    log::info!("Initial sync: {outcome:?}");

    let mut tick = |label: &str, scene: &Scene, view: &ViewContext| -> Result<(), DemoError> {
        let outcome = exporter.sync(scene, Some(view), &mut controller, &mut || false)?;
        let stats = controller.poll_stats()?.summary();
        if let Some(reason) = controller.check_halt()? {
            log::info!("{label}: preview paused ({reason})");
        }
        log::info!("{label}: {outcome:?} [{}] {stats}", controller.state());
        Ok(())
    };

    let orbit = ViewContext {
        view_matrix: Mat4::new_translation(&Vec3::new(0.5, -1.0, -7.5)),
        ..view.clone()
    };
    tick("Orbit viewport", &scene, &orbit)?;

    if let Some(cube) = scene.object_mut("Cube 0") {
        cube.transform = Mat4::new_translation(&Vec3::new(0.0, 1.5, -1.0));
    }
    tick("Move cube", &scene, &orbit)?;

    scene.image_pipeline.gamma = 2.4;
    tick("Change gamma", &scene, &orbit)?;

    scene.add_object(SceneObject::new("Extra", "Cube"));
    tick("Add object", &scene, &orbit)?;

    let resized = ViewContext { width: 640, height: 360, ..orbit };
    tick("Resize viewport", &scene, &resized)?;

    controller.stop()?;
    log::info!("Viewport sessions created: {}", controller.engine().sessions_created());
    Ok(())
}

fn run() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load_from_file(&path)?,
        None => BridgeConfig {
            halt: HaltConditions::samples(32),
            ..BridgeConfig::default()
        },
    };
    config.validate()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .format_timestamp_millis()
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let scene = build_scene(&config, &mut rng)?;

    let frame = final_render(&config, &scene)?;
    save_png(&frame)?;
    viewport_session(&config, scene)
}

fn main() {
    if let Err(err) = run() {
        log::error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
