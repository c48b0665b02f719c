use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use city_traffic::simulation::{
    ArchetypeRegistry, GridPos, GridRoadNetwork, RoadGraph, TrafficConfig, TrafficEngine,
};

#[derive(Parser)]
#[command(name = "city_traffic")]
#[command(about = "Headless ambient traffic simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.05")]
    delta: f32,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Road layout file, `#` for road cells
    #[arg(long)]
    map: Option<PathBuf>,

    /// Hard cap on simultaneous vehicles
    #[arg(long)]
    max_vehicles: Option<usize>,

    /// Vehicles allowed per road node
    #[arg(long)]
    ratio: Option<f32>,

    /// Base seconds between spawn attempts
    #[arg(long)]
    spawn_interval: Option<f32>,

    /// Bulldoze or rebuild a random road cell every N ticks
    #[arg(long)]
    edit_every: Option<u32>,

    /// Print a summary every N ticks
    #[arg(long, default_value = "100")]
    report_every: u32,

    /// Only print the final summary
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> TrafficConfig {
        let mut config = TrafficConfig {
            seed: self.seed,
            ..TrafficConfig::default()
        };
        if let Some(max_vehicles) = self.max_vehicles {
            config.absolute_max_vehicles = max_vehicles;
        }
        if let Some(ratio) = self.ratio {
            config.vehicles_per_road_ratio = ratio;
        }
        if let Some(interval) = self.spawn_interval {
            config.spawn_interval_base = interval;
        }
        config
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let network = match &cli.map {
        Some(path) => {
            let layout = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read map {}", path.display()))?;
            GridRoadNetwork::from_ascii(&layout)
                .with_context(|| format!("Failed to parse map {}", path.display()))?
        }
        None => GridRoadNetwork::create_test_network(),
    };

    run_headless(&cli, network)
}

/// Run the simulation without any graphics
fn run_headless(cli: &Cli, network: GridRoadNetwork) -> Result<()> {
    let config = cli.config();
    let mut editor_rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_os_rng(),
    };

    let mut engine = TrafficEngine::new(network, ArchetypeRegistry::with_defaults(), config)?;
    info!(
        "Running {} ticks of {}s on {} road nodes",
        cli.ticks,
        cli.delta,
        engine.graph().node_count()
    );

    if !cli.quiet {
        println!("Initial map:");
        engine.draw_map();
        println!();
    }

    engine.start();
    let mut bulldozed: Option<GridPos> = None;

    for tick in 1..=cli.ticks {
        engine.tick(cli.delta);

        if let Some(every) = cli.edit_every.filter(|every| *every > 0) {
            if tick % every == 0 {
                bulldozed = edit_roads(engine.graph_mut(), bulldozed, &mut editor_rng);
            }
        }

        if !cli.quiet && cli.report_every > 0 && tick % cli.report_every == 0 {
            println!("--- After tick {} ({:.1}s simulated) ---", tick, engine.time());
            engine.print_summary();
            engine.draw_map();
            println!();
        }
    }

    println!("=== Final State ===");
    engine.print_summary();
    engine.draw_map();

    engine.stop();
    info!("{}", engine.stats().summary());
    Ok(())
}

/// Rebuild the last bulldozed cell, or bulldoze a random one
fn edit_roads(
    network: &mut GridRoadNetwork,
    bulldozed: Option<GridPos>,
    rng: &mut StdRng,
) -> Option<GridPos> {
    if let Some(cell) = bulldozed {
        network.add_road(cell);
        info!("Rebuilt road at {:?}", cell);
        return None;
    }

    let cell = *network.all_road_nodes().choose(rng)?;
    match network.remove_road(cell) {
        Ok(()) => {
            info!("Bulldozed road at {:?}", cell);
            Some(cell)
        }
        Err(e) => {
            warn!("Failed to bulldoze road: {}", e);
            None
        }
    }
}
