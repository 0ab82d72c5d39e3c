use anyhow::Context;
use clap::Parser;
use medusa_sim::prelude::*;
use std::f32::consts::TAU;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Species preset (aurelia, chrysaora)
    #[arg(long, default_value = "aurelia")]
    species: Species,

    /// Species definition file (RON), replaces the preset
    #[arg(long)]
    species_file: Option<PathBuf>,

    /// Generator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Frames to simulate after warm-up
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// Visual frame delta in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Simulation config file (RON, extension optional)
    #[arg(long, default_value = "medusa")]
    config: PathBuf,

    /// Half-extent of the cube the creature swims in
    #[arg(long, default_value_t = 10.0)]
    bounds: f32,

    /// Print the species definition as RON and exit
    #[arg(long)]
    print_species: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut species = match &args.species_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read species file {:?}", path))?;
            SpeciesConfig::from_ron(&text)
                .with_context(|| format!("Failed to parse species file {:?}", path))?
        }
        None => args.species.config(),
    };
    if let Some(seed) = args.seed {
        species = species.with_seed(seed);
    }

    if args.print_species {
        println!("{}", species.to_ron()?);
        return Ok(());
    }

    let config = SimConfig::load_from(&args.config)?;
    log::info!("Starting {} (seed {})", species.name, species.seed);

    let creature = species.build()?;
    let shape = BellShape::new(species.seed as u32);
    let mut carrier = CarrierState::default();
    let mut body = bake(creature.graph, shape, config.clone(), carrier)?;

    body.warm_up()?;
    log::info!(
        "Warm-up done after {} steps",
        body.stats().total_steps
    );

    swim(&mut body, &mut carrier, &args, &config)?;

    let stats = body.stats();
    let positions = body.positions()?;
    let lowest = positions
        .iter()
        .map(|p| p.y)
        .fold(f32::INFINITY, f32::min);
    log::info!(
        "Simulated {:.2}s in {} frames / {} steps ({} truncated), lowest vertex at y={:.3}",
        stats.sim_time,
        stats.frames,
        stats.total_steps,
        stats.truncated_frames,
        lowest
    );
    Ok(())
}

/// Pulse-driven swimming inside a wrapping cube
fn swim<S: ShapeFn>(
    body: &mut SoftBody<S>,
    carrier: &mut CarrierState,
    args: &Args,
    config: &SimConfig,
) -> anyhow::Result<()> {
    let turn_rate = 0.1;
    for frame in 0..args.frames {
        carrier.phase = (carrier.phase + config.animation.phase_speed * TAU * args.dt) % TAU;

        let thrust = 0.4 + 0.3 * carrier.phase.sin();
        let rotation = carrier.transform.rotation * Quat::from_rotation_z(turn_rate * args.dt);
        let heading = rotation * Vec3::Y;
        carrier.transform.rotation = rotation;
        carrier.transform.position += heading * thrust * args.dt;

        if carrier.transform.position.abs().max_element() > args.bounds {
            let wrapped = wrap(carrier.transform.position, args.bounds);
            let delta = wrapped - carrier.transform.position;
            body.teleport(delta)?;
            carrier.transform.position = wrapped;
            log::debug!("Frame {}: wrapped carrier by {}", frame, delta);
        }

        body.step(*carrier, args.dt)?;
    }
    Ok(())
}

fn wrap(position: Vec3, bounds: f32) -> Vec3 {
    let size = bounds * 2.0;
    let wrap_axis = |v: f32| (v + bounds).rem_euclid(size) - bounds;
    Vec3::new(wrap_axis(position.x), wrap_axis(position.y), wrap_axis(position.z))
}
