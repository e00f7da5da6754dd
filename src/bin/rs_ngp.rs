//! Render a scene file (extension .ngp) with a reference field.

// std
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
// others
use clap::Parser;
// ngp
use rs_ngp::core::api::SceneDescription;
use rs_ngp::core::error::Result;
use rs_ngp::core::ngp::{clamp_t, gamma_correct, Float, Spectrum};
use rs_ngp::core::parser::parse_file;
use rs_ngp::integrators::volume::{RenderOutput, VolumeRenderer};

#[macro_use]
extern crate log;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a scene file and render it.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// use specified number of threads for staged rendering
    #[arg(short = 't', long = "nthreads", default_value_t = 0)]
    nthreads: u8,
    /// prefix of the written images (<prefix>_rgb.png, <prefix>_depth.png, <prefix>_mask.png)
    #[arg(short = 'o', long = "outfile", default_value = "ngp")]
    outfile: String,
    /// start from a stored occupancy grid instead of estimating it
    #[arg(long = "load-state")]
    load_state: Option<PathBuf>,
    /// store the occupancy grid after rendering
    #[arg(long = "save-state")]
    save_state: Option<PathBuf>,
    /// additional grid updates before rendering
    #[arg(short = 'w', long = "warmup", default_value_t = 0)]
    warmup: u32,
    /// The path to the file to read
    path: PathBuf,
}

fn to_byte(v: Float) -> u8 {
    clamp_t(255.0 as Float * v + 0.5, 0.0 as Float, 255.0 as Float) as u8
}

fn write_images(prefix: &str, output: &RenderOutput, width: u32, height: u32) -> Result<()> {
    let mut rgb: Vec<u8> = Vec::with_capacity(3 * output.len());
    for c in output.image.iter() {
        let c: Spectrum = c.clamp(0.0, 1.0);
        for i in 0..3 {
            rgb.push(to_byte(gamma_correct(c[i])));
        }
    }
    let depth: Vec<u8> = output.depth.iter().map(|d| to_byte(*d)).collect();
    let mask: Vec<u8> = output.mask.iter().map(|m| if *m { 255 } else { 0 }).collect();
    let rgb_name: String = format!("{}_rgb.png", prefix);
    image::save_buffer(
        Path::new(&rgb_name),
        &rgb,
        width,
        height,
        image::ColorType::Rgb8,
    )?;
    let depth_name: String = format!("{}_depth.png", prefix);
    image::save_buffer(
        Path::new(&depth_name),
        &depth,
        width,
        height,
        image::ColorType::L8,
    )?;
    let mask_name: String = format!("{}_mask.png", prefix);
    image::save_buffer(
        Path::new(&mask_name),
        &mask,
        width,
        height,
        image::ColorType::L8,
    )?;
    info!("wrote {:?}, {:?} and {:?}", rgb_name, depth_name, mask_name);
    Ok(())
}

fn run(args: &Cli) -> Result<()> {
    let statements = parse_file(&args.path)?;
    let mut scene: SceneDescription = SceneDescription::from_statements(&statements)?;
    if args.nthreads > 0 {
        scene.renderer.num_threads = args.nthreads;
    }
    let field = scene.field.as_ref();
    let mut renderer: VolumeRenderer = VolumeRenderer::new(scene.renderer)?;
    if renderer.grid.is_some() {
        match &args.load_state {
            Some(path) => {
                let mut reader = BufReader::new(File::open(path)?);
                renderer.load_state(&mut reader)?;
            }
            None => {
                info!("estimating occupancy grid ...");
                renderer.initialize_states(field);
                if !scene.training_views.is_empty() {
                    renderer.mark_untrained_grid(&scene.training_views, &scene.camera.intrinsics);
                }
            }
        }
        let decay: Float = scene.renderer.update_decay;
        for _ in pbr::PbIter::new(0..args.warmup) {
            renderer.update_extra_state(field, decay, false, false);
        }
    }
    let (rays_o, rays_d) = scene.camera.generate_rays();
    info!(
        "rendering {} x {} pixels ...",
        scene.camera.width, scene.camera.height
    );
    let output: RenderOutput =
        renderer.render(field, scene.background.as_deref(), &rays_o, &rays_d, &scene.render)?;
    let covered: usize = output.mask.iter().filter(|m| **m).count();
    info!(
        "{} samples, {} of {} pixels covered",
        output.sample_count,
        covered,
        output.len()
    );
    write_images(&args.outfile, &output, scene.camera.width, scene.camera.height)?;
    if let Some(path) = &args.save_state {
        let mut writer = BufWriter::new(File::create(path)?);
        renderer.save_state(&mut writer)?;
        writer.flush()?;
        info!("saved grid state to {:?}", path);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();
    info!("rs_ngp version {}", VERSION);
    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}
