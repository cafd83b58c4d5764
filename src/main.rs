mod sim;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use strata_geom::Vec3;
use strata_paging::{FlatHeightfield, NoiseHeightfield, PagingConfig, load_config_from_path};
use strata_runtime::SharedHeights;

use crate::sim::{FlyCamera, Simulation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Terrain {
    Flat,
    Noise,
}

/// Flies a camera over paged terrain without a window and reports how the
/// tile pool behaves.
#[derive(Parser, Debug)]
#[command(name = "strata", version)]
struct Args {
    /// Paging config; defaults are used when the file is missing.
    #[arg(long, default_value = "config/paging.toml")]
    config: String,
    #[arg(long, default_value_t = 600)]
    frames: u32,
    #[arg(long, value_enum, default_value_t = Terrain::Noise)]
    terrain: Terrain,
    #[arg(long, default_value_t = 1337)]
    seed: i32,
    /// World units per frame.
    #[arg(long, default_value_t = 4.0)]
    speed: f32,
    /// Build threads; 0 uses every core.
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Log a pool summary every N frames.
    #[arg(long, default_value_t = 60)]
    report_every: u32,
}

fn load_config(path: &str) -> Result<PagingConfig, String> {
    if !Path::new(path).exists() {
        log::warn!("paging config {} not found; using defaults", path);
        return Ok(PagingConfig::default());
    }
    let cfg = load_config_from_path(Path::new(path)).map_err(|e| format!("{}: {}", path, e))?;
    log::info!("paging config loaded from {}", path);
    Ok(cfg)
}

/// Height source plus its highest possible sample.
fn make_heights(args: &Args) -> (SharedHeights, f32) {
    match args.terrain {
        Terrain::Flat => {
            let flat: SharedHeights = Arc::new(FlatHeightfield::new(20.0));
            (flat, 20.0)
        }
        Terrain::Noise => {
            let amplitude = 48.0;
            let noise: SharedHeights =
                Arc::new(NoiseHeightfield::new(args.seed, 0.004, 0.0, amplitude));
            (noise, amplitude)
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let cfg = load_config(&args.config)?;
    let (heights, peak) = make_heights(&args);
    let ceiling = cfg.world_height(peak);
    let far = cfg.activation_radius * 2.0;
    let camera = FlyCamera::new(Vec3::new(0.5, ceiling + 30.0, 0.5), args.speed, far);
    let mut sim = Simulation::new(cfg, heights, camera, args.workers).map_err(|e| e.to_string())?;

    log::info!(
        "flying {} frames over {:?} terrain (seed {}, {} units/frame)",
        args.frames,
        args.terrain,
        args.seed,
        args.speed
    );
    let mut errors = 0usize;
    for frame in 0..args.frames {
        let stats = sim.step().map_err(|e| format!("frame {}: {}", frame, e))?;
        errors += stats.errors;
        if args.report_every > 0 && frame % args.report_every == 0 {
            sim.log_summary();
        }
    }

    let settled = sim.settle(Duration::from_secs(30));
    log::info!("settled: {} more tiles loaded", settled.loaded);
    sim.log_summary();

    let cam = sim.camera.position;
    match sim.pick_below(0.25) {
        Ok(hit) => log::info!(
            "ground below ({:.1}, {:.1}) at y={:.2}, {:.2} under the camera",
            cam.x,
            cam.z,
            hit.y,
            cam.y - hit.y
        ),
        Err(e) => return Err(format!("pick from ({:.1}, {:.1}) failed: {}", cam.x, cam.z, e)),
    }

    sim.shutdown().map_err(|e| e.to_string())?;
    if errors > 0 {
        return Err(format!("{} tile updates failed", errors));
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
