mod simulation;

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = "garbage_sim")]
#[command(about = "Garbage-collection fleet simulation on a toroidal road grid")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of collection vehicles in the fleet
    #[arg(long, default_value = "8")]
    vehicles: usize,

    /// Ticks between console summaries
    #[arg(long, default_value = "100")]
    summary_interval: u64,

    /// Draw the ASCII world map with each summary
    #[arg(long)]
    map: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    println!("Running garbage fleet simulation...");
    println!("Ticks: {}, Vehicles: {}", cli.ticks, cli.vehicles);
    match cli.seed {
        Some(seed) => println!("Seed: {}", seed),
        None => println!("Seed: (from OS entropy)"),
    }
    println!();

    let mut world = match cli.seed {
        Some(seed) => simulation::SimWorld::create_city_world_with_seed(cli.vehicles, seed)?,
        None => simulation::SimWorld::create_city_world(cli.vehicles)?,
    };

    println!("Initial state:");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }
    println!();

    for tick in 1..=cli.ticks {
        world.tick();

        if tick % cli.summary_interval == 0 {
            println!("--- After tick {} ---", tick);
            world.print_summary();
            if cli.map {
                world.draw_map();
            }
            println!();
        }
    }

    println!("=== Final State ===");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }

    Ok(())
}
