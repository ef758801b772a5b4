use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec3};
use jellyfield_common::{BlockColor, GameConfig, LevelData};
use jellyfield_kernel::{GridEvent, Session, SessionEvent, SessionState};
use jellyfield_render::{
    CameraState, CullParams, DebugTextRenderer, RenderFrame, Renderer, StreamKind, StreamView,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Mirrors the meshes the desktop renderer draws so the CPU cull matches
// it: `MeshData::cube()` for blocks and `MeshData::octahedron(0.5)` for
// projectiles (`index_count()` and `bound_radius()`, both pinned by the mesh
// tests in jellyfield-render-wgpu). This host does not link wgpu.
const BLOCK_INDEX_COUNT: u32 = 36;
const BLOCK_MESH_RADIUS: f32 = 0.866;
const PROJECTILE_INDEX_COUNT: u32 = 24;
const PROJECTILE_MESH_RADIUS: f32 = 0.866;

#[derive(Parser)]
#[command(name = "jellyfield-cli", about = "Headless jellyfield host")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and default tuning
    Info,
    /// Load a level file and report its statistics
    Validate {
        /// Level file (.yaml, .yml or .json)
        level: PathBuf,
    },
    /// Write the built-in demo level to a file
    WriteDemo {
        /// Destination (.yaml, .yml or .json)
        path: PathBuf,
    },
    /// Auto-play a level and print culling statistics
    Run {
        /// Level file; the built-in demo when omitted
        level: Option<PathBuf>,
        /// Simulated seconds
        #[arg(short, long, default_value = "20")]
        seconds: f32,
        /// Fixed timestep
        #[arg(long, default_value = "0.016666668")]
        dt: f32,
        /// Damage per shot
        #[arg(long, default_value = "10")]
        damage: u32,
        /// Shots per simulated second
        #[arg(long, default_value = "8")]
        fire_rate: f32,
        /// RNG seed for target colors
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Print a frame report every N ticks
        #[arg(long, default_value = "60")]
        report_every: u64,
    },
}

/// Fixed camera behind the firing line, looking at the grid origin.
fn camera_for(level: &LevelData) -> CameraState {
    let eye = Vec3::new(0.0, 9.0, -4.0);
    let view = Mat4::look_at_rh(eye, level.grid_origin, Vec3::Y);
    let proj = Mat4::perspective_rh(60.0_f32.to_radians(), 16.0 / 9.0, 0.1, 500.0);
    CameraState::new(eye, proj * view)
}

fn load_or_demo(path: Option<&PathBuf>) -> anyhow::Result<LevelData> {
    match path {
        Some(path) => LevelData::load(path)
            .with_context(|| format!("loading level {}", path.display())),
        None => Ok(LevelData::demo()),
    }
}

fn print_stats(level: &LevelData) {
    println!("level: {}", level.name);
    println!("grid: {}x{} at {:?}", level.columns, level.rows, level.grid_origin);
    println!("waves: {}", level.waves.len());
    for (i, wave) in level.waves.iter().enumerate() {
        println!(
            "  wave {i}: enemies={} advance_speed={:.2}",
            wave.enemies.len(),
            wave.advance_speed
        );
    }
    println!("max wave size: {}", level.max_wave_size());
    println!("enemy capacity: {}", level.enemy_capacity());
    println!("total enemy hp: {}", level.total_enemy_hp());
    println!("hammer charges: {}", level.hammer_charges);
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::WaveStarted { index, enemies } => {
            tracing::info!(wave = index, enemies, "wave started");
        }
        SessionEvent::Grid(GridEvent::EntityHit { index, damage }) => {
            tracing::debug!(index, damage, "hit");
        }
        SessionEvent::Grid(GridEvent::EntityDied { index, color, .. }) => {
            tracing::debug!(index, %color, "died");
        }
        SessionEvent::Grid(GridEvent::WaveCleared) => tracing::info!("wave cleared"),
        SessionEvent::LevelComplete => tracing::info!("level complete"),
    }
}

/// Color with the most live blocks, for the hammer.
fn most_common_color(session: &Session) -> Option<BlockColor> {
    BlockColor::ALL
        .into_iter()
        .map(|c| (c, session.store().count_alive_of_color(c)))
        .filter(|&(_, n)| n > 0)
        .max_by_key(|&(_, n)| n)
        .map(|(c, _)| c)
}

struct RunOptions {
    seconds: f32,
    dt: f32,
    damage: u32,
    fire_rate: f32,
    seed: u64,
    report_every: u64,
}

fn run(level: LevelData, opts: RunOptions) -> anyhow::Result<()> {
    anyhow::ensure!(opts.dt > 0.0, "dt must be positive");
    let config = level.config.clone();
    let camera = camera_for(&level);
    let muzzle = camera.position + (level.grid_origin - camera.position).normalize() * 1.5
        - Vec3::Y * 0.5;
    let block_cull = CullParams::new(BLOCK_MESH_RADIUS, config.bounds_padding, config.cull_distance);
    let projectile_cull = CullParams::new(
        PROJECTILE_MESH_RADIUS,
        config.bounds_padding,
        config.cull_distance,
    );

    let mut session = Session::new(level);
    session.start();
    let mut renderer = DebugTextRenderer::new();
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let ticks = (opts.seconds / opts.dt).ceil() as u64;
    let mut fire_budget = 0.0_f32;
    let mut shots = 0u64;
    let mut kills = 0u64;

    for tick in 0..ticks {
        fire_budget += opts.fire_rate * opts.dt;
        while fire_budget >= 1.0 {
            fire_budget -= 1.0;
            let live: Vec<BlockColor> = BlockColor::ALL
                .into_iter()
                .filter(|&c| session.store().has_alive_of_color(c))
                .collect();
            if live.is_empty() {
                break;
            }
            let color = live[rng.gen_range(0..live.len())];
            if session.fire(color, muzzle, opts.damage).is_some() {
                shots += 1;
            }
        }
        if session.hammer_charges() > 0 && rng.gen_bool(1.0 / 600.0) {
            if let Some(color) = most_common_color(&session) {
                if let Some(n) = session.hammer(color) {
                    tracing::info!(%color, killed = n, "hammer");
                }
            }
        }

        session.tick(opts.dt);
        for event in session.drain_events() {
            if matches!(event, SessionEvent::Grid(GridEvent::EntityDied { .. })) {
                kills += 1;
            }
            log_event(&event);
        }

        if opts.report_every > 0 && tick % opts.report_every == 0 {
            let streams = [
                StreamView {
                    batch: session.batch(StreamKind::Enemy),
                    cull: block_cull,
                    index_count: BLOCK_INDEX_COUNT,
                },
                StreamView {
                    batch: session.batch(StreamKind::Projectile),
                    cull: projectile_cull,
                    index_count: PROJECTILE_INDEX_COUNT,
                },
            ];
            let frame = RenderFrame {
                camera,
                streams: &streams,
            };
            print!("t={:.2}s {}", tick as f32 * opts.dt, renderer.render(&frame));
        }
        // Stand-in for the GPU upload.
        for kind in StreamKind::ALL {
            session.batch_mut(kind).take_upload();
        }

        if session.state() == SessionState::Victory {
            break;
        }
    }

    println!(
        "state={:?} shots={shots} kills={kills} alive={} hammer_charges={}",
        session.state(),
        session.store().alive_count(),
        session.hammer_charges()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("jellyfield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", jellyfield_common::crate_info());
            println!("render: {}", jellyfield_render::crate_info());
            let config = GameConfig::default();
            println!(
                "defaults: cell_size={} gravity={} projectile_pool={} cull_distance={}",
                config.cell_size, config.gravity, config.projectile_pool_size, config.cull_distance
            );
        }
        Commands::Validate { level } => {
            let data = LevelData::load(&level)
                .with_context(|| format!("loading level {}", level.display()))?;
            print_stats(&data);
            println!("OK");
        }
        Commands::WriteDemo { path } => {
            LevelData::demo()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        Commands::Run {
            level,
            seconds,
            dt,
            damage,
            fire_rate,
            seed,
            report_every,
        } => {
            let data = load_or_demo(level.as_ref())?;
            print_stats(&data);
            run(
                data,
                RunOptions {
                    seconds,
                    dt,
                    damage,
                    fire_rate,
                    seed,
                    report_every,
                },
            )?;
        }
    }

    Ok(())
}
