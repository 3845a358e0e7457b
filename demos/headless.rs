//! Headless render loop
//!
//! Builds a small scene, renders a number of frames offscreen and reports
//! what was drawn. Run with `cargo run --example headless -- --help`.

use clap::Parser;
use render_system::prelude::*;

/// Backend selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// Render on the GPU through wgpu.
    #[default]
    Wgpu,
    /// Record commands without a GPU.
    Dummy,
}

#[derive(Parser, Debug)]
#[command(name = "headless", about = "Render a demo scene offscreen")]
struct Args {
    /// Graphics backend.
    #[arg(long, default_value = "wgpu", value_enum)]
    backend: CliBackend,

    /// Framebuffer width in pixels.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Framebuffer height in pixels.
    #[arg(long, default_value = "360")]
    height: u32,

    /// Number of frames to render.
    #[arg(long, default_value = "3")]
    frames: u32,

    /// Cubes per row of the grid.
    #[arg(long, default_value = "4")]
    grid: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match args.backend {
        CliBackend::Wgpu => WgpuBackend::new()
            .map_err(RenderError::from)
            .and_then(|mut backend| run(&mut backend, &args)),
        CliBackend::Dummy => {
            let mut backend = DummyBackend::new();
            let result = run(&mut backend, &args);
            log::info!(
                "Dummy backend recorded {} commands over {} frames",
                backend.commands().len(),
                backend.frames()
            );
            result
        }
    };

    if let Err(e) = result {
        log::error!("Headless demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run<B: GraphicsBackend>(backend: &mut B, args: &Args) -> RenderResult<()> {
    let mut renderer = RenderSystem::new(backend, RenderConfig::default())?;
    renderer.resize(backend, args.width, args.height)?;
    renderer.allocate((args.grid * args.grid + 1) as usize);

    let cube = renderer.add_mesh(Mesh::new("cube", MeshData::cube()));
    let floor = renderer.add_mesh(Mesh::new("floor", MeshData::plane(20.0, 20.0, 4)));
    let checker = renderer.add_texture(
        backend,
        &TextureData::checkerboard(64, [200, 200, 200, 255], [60, 60, 60, 255]),
    )?;

    let mut scene = TransformMap::new();
    let floor_entity = EntityId(0);
    renderer.create(floor_entity, RenderComponent::new(floor).with_texture(checker))?;
    scene.insert(floor_entity, Transform::from_position(Vec3::new(0.0, -0.5, 0.0)));

    let half = args.grid as f32 / 2.0;
    for z in 0..args.grid {
        for x in 0..args.grid {
            let entity = EntityId(1 + z * args.grid + x);
            let tint = Vec4::new(x as f32 / args.grid as f32, 0.5, z as f32 / args.grid as f32, 1.0);
            renderer.create(entity, RenderComponent::new(cube).with_tint(tint))?;
            scene.insert(
                entity,
                Transform::from_position(Vec3::new((x as f32 - half) * 2.0, 0.0, (z as f32 - half) * 2.0)),
            );
        }
    }

    renderer
        .directional_lights
        .push(DirectionalLight::new(Vec3::new(-0.3, -1.0, -0.2), Vec3::ONE, 0.6));
    renderer
        .point_lights
        .push(PointLight::new(Vec3::new(0.0, 3.0, 0.0), Vec3::new(1.0, 0.8, 0.6), 4.0));
    renderer.spot_lights.push(SpotLight::new(
        PointLight::new(Vec3::new(4.0, 5.0, 4.0), Vec3::ONE, 8.0),
        Vec3::new(-1.0, -1.0, -1.0),
        0.4,
    ));

    let mut eye = Camera::perspective(60.0, 1.0, 0.1, 100.0);
    eye.set_aspect(args.width as f32, args.height as f32);
    eye.transform.position = Vec3::new(0.0, 6.0, 12.0);
    camera::look_at(&mut eye, Vec3::ZERO, Vec3::Y);

    for frame in 0..args.frames {
        camera::offset_orientation(&mut eye.transform.orientation, 0.02, 0.0);
        renderer.render(backend, &scene, &eye)?;
        log::info!("Rendered frame {}", frame);
    }

    renderer.shutdown(backend);
    Ok(())
}
