//! Headless demo driver.
//!
//! Runs the full four-stage pipeline against the software device, so the
//! loop can be exercised (and profiled) on machines with no graphics
//! context. Supply a velocity image with `--field`, or let it generate a
//! solid-body rotation field.

use std::path::{Path, PathBuf};

use clap::Parser;

use windtrace::prelude::*;
use windtrace::TextureError;

#[derive(Parser, Debug)]
#[command(
    name = "windtrace",
    version,
    about = "Headless particle tracing over a 2D velocity field"
)]
struct Args {
    /// Velocity field image (R = u, G = v); synthetic rotation when omitted.
    #[arg(long)]
    field: Option<PathBuf>,

    /// Minimum u (horizontal) velocity encoded by the red channel.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    u_min: f32,

    /// Maximum u velocity.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    u_max: f32,

    /// Minimum v (vertical) velocity encoded by the green channel.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    v_min: f32,

    /// Maximum v velocity.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    v_max: f32,

    /// Particle grid side; the particle count is its square.
    #[arg(long, default_value_t = 64)]
    resolution: u32,

    /// Frames to run before exiting.
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Trail fade factor per frame.
    #[arg(long, default_value_t = 0.92)]
    opacity: f32,

    /// Advection speed multiplier.
    #[arg(long, default_value_t = 0.00007)]
    speed: f32,

    /// Pace scalar on the 17 ms base frame interval; 0 runs unthrottled.
    #[arg(long, default_value_t = 0.0)]
    time_constant: f32,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Write the final particle state texture to this PNG path.
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let metadata = VelocityMetadata {
        u: ChannelRange::new(args.u_min, args.u_max),
        v: ChannelRange::new(args.v_min, args.v_max),
    };
    let field = match &args.field {
        Some(path) => VelocityField::open(path, metadata)?,
        None => synthetic_rotation(64, metadata)?,
    };
    log::info!("velocity field {:?}", field.shape());

    let config = SimulationConfig::new()
        .with_resolution(args.resolution)
        .with_opacity(args.opacity)
        .with_speed(args.speed);

    let mut sim = Simulation::new(HeadlessDevice::new(), config, (args.width, args.height))
        .with_velocity(field);
    sim.start()?;
    println!("{}", sim.status());

    sim.time_constant().set(args.time_constant);
    sim.run(Some(args.frames))?;
    println!(
        "ran {} frames, {} device calls, {} draws",
        sim.frame(),
        sim.device().calls(),
        sim.device().draw_calls()
    );

    if let Some(path) = &args.dump {
        dump_particle_state(&sim, path)?;
        println!("wrote {}", path.display());
    }

    sim.stop();
    Ok(())
}

/// Solid-body rotation about the field center, encoded into RGBA bytes the
/// same way decoded forecast images are.
fn synthetic_rotation(side: u32, metadata: VelocityMetadata) -> Result<VelocityField, TextureError> {
    let mut data = Vec::with_capacity((side * side * 4) as usize);
    for y in 0..side {
        for x in 0..side {
            let fx = x as f32 / (side - 1) as f32 - 0.5;
            let fy = y as f32 / (side - 1) as f32 - 0.5;
            let u = (-fy + 0.5).clamp(0.0, 1.0);
            let v = (fx + 0.5).clamp(0.0, 1.0);
            data.push((u * 255.0) as u8);
            data.push((v * 255.0) as u8);
            data.push(0);
            data.push(255);
        }
    }
    VelocityField::from_bytes(data, (side, side), metadata)
}

fn dump_particle_state(
    sim: &Simulation<HeadlessDevice>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = sim.simulation_state().ok_or("session has no state")?;
    let texture = state.particles.current();
    let data = sim
        .device()
        .texture_data(texture.id)
        .ok_or("particle texture is not live")?;
    let image = image::RgbaImage::from_raw(texture.shape.0, texture.shape.1, data.to_vec())
        .ok_or("particle texture has a bad byte length")?;
    image.save(path)?;
    Ok(())
}
