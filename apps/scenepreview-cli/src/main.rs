use clap::{Parser, Subcommand, ValueEnum};
use glam::{Mat4, Vec2, Vec3};
use scenepreview_backend::{NodeKind, NodeRegistry, Universe};
use scenepreview_common::{ParameterValue, Shader, ShaderNetwork};
use scenepreview_renderer::{
    AttributeSet, Camera, LIGHT_ATTRIBUTE, MeshPrimitive, PREVIEW_RENDERER, Primitive, RenderType,
    Renderer, RendererConfig, RendererRegistry, SURFACE_ATTRIBUTE,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scenepreview-cli", about = "CLI tool for scenepreview operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Renderer configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// List the node types the renderer understands
    Types,
    /// Build a demo scene and render it
    Demo {
        /// Number of planes to create
        #[arg(short, long, default_value = "10")]
        objects: usize,
        /// Number of distinct surface shaders spread across the planes
        #[arg(short, long, default_value = "1")]
        distinct: usize,
        /// How to render the scene
        #[arg(short = 't', long, value_enum, default_value = "batch")]
        render_type: Mode,
        /// Scene description path, required for `scene-description`
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the contents of a scene-description file
    Inspect {
        path: PathBuf,
        /// List every node, not just the counts
        #[arg(short, long)]
        nodes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Batch,
    Interactive,
    SceneDescription,
}

impl From<Mode> for RenderType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Batch => RenderType::Batch,
            Mode::Interactive => RenderType::Interactive,
            Mode::SceneDescription => RenderType::SceneDescription,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading renderer config");
            RendererConfig::load(path)?
        }
        None => RendererConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("scenepreview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", scenepreview_common::crate_info());
            println!("backend: {}", scenepreview_backend::crate_info());
            println!("shading: {}", scenepreview_shading::crate_info());
            println!("renderer: {}", scenepreview_renderer::crate_info());
            let registry = RendererRegistry::builtin();
            println!("renderers: {}", registry.types().collect::<Vec<_>>().join(", "));
        }
        Commands::Types => {
            let registry = NodeRegistry::builtin();
            for kind in [NodeKind::Shader, NodeKind::Light, NodeKind::Shape, NodeKind::Camera] {
                println!("{kind:?}: {}", registry.type_names(kind).join(", "));
            }
        }
        Commands::Demo {
            objects,
            distinct,
            render_type,
            output,
        } => {
            let registry = RendererRegistry::builtin();
            let mut renderer =
                registry.create(PREVIEW_RENDERER, render_type.into(), output.as_deref(), &config)?;

            renderer.camera("camera", &Camera::default())?;
            renderer.option("camera", ParameterValue::String("camera".into()))?;
            renderer.option("ai:AA_samples", ParameterValue::Int(3))?;

            let light_network = ShaderNetwork::single(
                Shader::new("distant_light").with_parameter("intensity", 2.0f32),
            )?;
            let light_attributes =
                renderer.attributes(&AttributeSet::new().with(LIGHT_ATTRIBUTE, light_network))?;
            let light = renderer.light("sun")?;
            renderer.set_attributes(light, &light_attributes)?;
            renderer.release_attributes(light_attributes);

            let plane: Primitive = MeshPrimitive::plane(Vec2::splat(-1.0), Vec2::splat(1.0)).into();
            let distinct = distinct.max(1);
            for i in 0..objects {
                let shade = (i % distinct) as f32 / distinct as f32;
                let network = ShaderNetwork::single(
                    Shader::new("flat").with_parameter("color", ParameterValue::color(shade, 0.5, 1.0)),
                )?;
                let attributes =
                    renderer.attributes(&AttributeSet::new().with(SURFACE_ATTRIBUTE, network))?;
                let object = renderer.object(&format!("plane{i}"), &plane)?;
                renderer.set_transform(
                    object,
                    Mat4::from_translation(Vec3::new(i as f32 * 2.5, 0.0, 0.0)),
                )?;
                renderer.set_attributes(object, &attributes)?;
                renderer.release_attributes(attributes);
            }

            let summary = renderer.render()?;
            println!("{summary}");
            if let Some(header) = summary.header {
                println!(
                    "Scene description: session={}, nodes={}, checksum={}",
                    header.session, header.node_count, header.checksum
                );
            }
        }
        Commands::Inspect { path, nodes } => {
            let (universe, header) = Universe::load(&path, NodeRegistry::builtin())?;
            println!(
                "{}: format={}, session={}, nodes={}",
                path.display(),
                header.format_version,
                header.session,
                header.node_count
            );
            for kind in [NodeKind::Shape, NodeKind::Light, NodeKind::Shader, NodeKind::Camera] {
                println!("  {kind:?}: {}", universe.count(kind));
            }
            if nodes {
                for (id, node) in universe.nodes() {
                    println!(
                        "  [{}] {} ({}), {} parameters",
                        id.0,
                        node.name,
                        node.type_name,
                        node.parameters.len()
                    );
                }
            }
        }
    }

    Ok(())
}
