//! mesh-raster - decode, animate and render meshes to PNG

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use mesh_raster::anim::{animate, Frame, Framemap, PosedMesh};
use mesh_raster::config::{load_config, RenderConfig};
use mesh_raster::lighting::light_mesh;
use mesh_raster::model::{decode_mesh, BoneIndex, Mesh};
use mesh_raster::rasterizer::{FrameStats, Framebuffer, RenderContext};

#[derive(Parser)]
#[command(name = "mesh-raster")]
#[command(about = "Fixed-point mesh decoder and software rasterizer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a mesh and print what it contains
    Info {
        /// Mesh file
        model: PathBuf,
    },

    /// Render one image of a mesh
    Render {
        /// Mesh file
        model: PathBuf,

        /// Output PNG
        #[arg(short, long, default_value = "out.png")]
        output: PathBuf,

        /// RON render config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Framemap file; its numeric file name is the framemap id
        #[arg(long, requires = "frame")]
        framemap: Option<PathBuf>,

        /// Frame to pose the mesh with before rendering
        #[arg(long, requires = "framemap")]
        frame: Option<PathBuf>,
    },

    /// Render one image per frame of an animation
    Animate {
        /// Mesh file
        model: PathBuf,

        /// Framemap file shared by every frame
        #[arg(long)]
        framemap: PathBuf,

        /// Frame files, rendered in order
        #[arg(long, num_args = 1.., required = true)]
        frames: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// RON render config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { model } => print_info(&model),
        Commands::Render {
            model,
            output,
            config,
            framemap,
            frame,
        } => render_one(&model, &output, config.as_deref(), framemap.as_deref().zip(frame.as_deref())),
        Commands::Animate {
            model,
            framemap,
            frames,
            output,
            config,
        } => render_animation(&model, &framemap, &frames, &output, config.as_deref()),
    }
}

// ============================================================================
// Loading
// ============================================================================

fn load_mesh(path: &Path) -> Result<Mesh> {
    let data = fs::read(path).with_context(|| format!("Failed to read mesh {}", path.display()))?;
    decode_mesh(&data).with_context(|| format!("Failed to decode mesh {}", path.display()))
}

fn load_render_config(path: Option<&Path>) -> Result<RenderConfig> {
    let config = match path {
        Some(path) => load_config(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// The framemap id is its file stem when that is a number, otherwise the id
/// the frame asks for.
fn load_framemap(path: &Path, frame_data: &[u8]) -> Result<Framemap> {
    let data = fs::read(path).with_context(|| format!("Failed to read framemap {}", path.display()))?;
    let id = match path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u16>().ok()) {
        Some(id) => id,
        None => Frame::peek_framemap_id(frame_data)
            .context("Failed to read framemap id from frame")?,
    };
    Framemap::decode(id, &data).with_context(|| format!("Failed to decode framemap {}", path.display()))
}

fn load_frame(path: &Path, framemap: &Framemap) -> Result<Frame> {
    let data = fs::read(path).with_context(|| format!("Failed to read frame {}", path.display()))?;
    Frame::decode(&data, framemap).with_context(|| format!("Failed to decode frame {}", path.display()))
}

// ============================================================================
// Commands
// ============================================================================

fn print_info(path: &Path) -> Result<()> {
    let mesh = load_mesh(path)?;

    let present = |name: &str, has: bool| if has { name.to_string() } else { format!("-{}", name) };
    let sections = [
        present("infos", mesh.face_infos.is_some()),
        present("priorities", mesh.face_priorities.is_some()),
        present("alphas", mesh.face_alphas.is_some()),
        present("vertex_bones", mesh.vertex_bones.is_some()),
        present("face_bones", mesh.face_bones.is_some()),
        present("textures", mesh.face_textures.is_some()),
        present("texture_coords", mesh.face_texture_coords.is_some()),
    ];

    println!("{}", path.display());
    println!("  format:    {}", mesh.format.name());
    println!("  vertices:  {}", mesh.vertex_count());
    println!("  faces:     {}", mesh.face_count());
    println!("  textures:  {}", mesh.texture_mapping.len());
    if mesh.face_priorities.is_none() {
        println!("  priority:  {}", mesh.model_priority);
    }
    println!("  sections:  {}", sections.join(" "));
    match mesh.bounds() {
        Some((min, max)) => println!("  bounds:    {:?} .. {:?}", min, max),
        None => println!("  bounds:    empty"),
    }

    let bones = BoneIndex::from_mesh(&mesh);
    println!(
        "  bones:     {} vertex groups, {} face groups",
        bones.vertex_groups.len(),
        bones.face_groups.len()
    );
    Ok(())
}

/// Light and draw one pose into a fresh framebuffer
fn draw(ctx: &mut RenderContext, mesh: &Mesh, posed: &PosedMesh, config: &RenderConfig) -> (Framebuffer, FrameStats) {
    let mut fb = Framebuffer::new(config.width, config.height);
    fb.clear(config.background);
    let colors = light_mesh(mesh, posed, &config.lighting);
    let stats = ctx.render_mesh(
        &mut fb,
        mesh,
        posed,
        &colors,
        &config.placement,
        &config.camera,
        &config.options,
    );
    (fb, stats)
}

fn render_one(model: &Path, output: &Path, config: Option<&Path>, anim: Option<(&Path, &Path)>) -> Result<()> {
    let config = load_render_config(config)?;
    let mesh = load_mesh(model)?;
    let mut posed = PosedMesh::from_mesh(&mesh);

    if let Some((framemap_path, frame_path)) = anim {
        let frame_data =
            fs::read(frame_path).with_context(|| format!("Failed to read frame {}", frame_path.display()))?;
        let framemap = load_framemap(framemap_path, &frame_data)?;
        let frame = Frame::decode(&frame_data, &framemap)
            .with_context(|| format!("Failed to decode frame {}", frame_path.display()))?;
        let bones = BoneIndex::from_mesh(&mesh);
        animate(&mut posed, &bones, &frame, &framemap)?;
    }

    let mut ctx = RenderContext::new();
    let (fb, stats) = draw(&mut ctx, &mesh, &posed, &config);
    log::info!(
        "Drew {} faces ({} hidden, {} culled, {} dropped)",
        stats.faces_drawn,
        stats.faces_hidden,
        stats.faces_culled,
        stats.dropped_faces
    );

    fb.save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote {}", output.display());
    Ok(())
}

fn render_animation(
    model: &Path,
    framemap_path: &Path,
    frames: &[PathBuf],
    output: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_render_config(config)?;
    let mesh = load_mesh(model)?;
    let bones = BoneIndex::from_mesh(&mesh);

    let first_path = frames.first().context("No frames given")?;
    let first = fs::read(first_path).with_context(|| format!("Failed to read frame {}", first_path.display()))?;
    let framemap = load_framemap(framemap_path, &first)?;

    fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;

    let progress = ProgressBar::new(frames.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?.progress_chars("=> "),
    );

    let mut ctx = RenderContext::new();
    let mut posed = PosedMesh::from_mesh(&mesh);
    let mut total = FrameStats::default();

    for (i, frame_path) in frames.iter().enumerate() {
        let frame = load_frame(frame_path, &framemap)?;
        posed.reset(&mesh);
        animate(&mut posed, &bones, &frame, &framemap)
            .with_context(|| format!("Failed to apply frame {}", frame_path.display()))?;

        let (fb, stats) = draw(&mut ctx, &mesh, &posed, &config);
        total.merge(&stats);

        let out = output.join(format!("frame_{:04}.png", i));
        fb.save(&out)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        progress.set_message(out.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string());
        progress.inc(1);
    }

    progress.finish_and_clear();
    log::info!(
        "Rendered {} frames to {} ({} faces drawn, {} dropped)",
        frames.len(),
        output.display(),
        total.faces_drawn,
        total.dropped_faces
    );
    Ok(())
}
