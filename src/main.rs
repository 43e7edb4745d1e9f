//! Tile Empires - headless match runner
//!
//! Generates a map, lets one bot per team play for a fixed amount of
//! simulated time and prints a summary of every team.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tile_empires::ai::StrategicMode;
use tile_empires::core::config::{load_config, SimulationConfig};
use tile_empires::core::error::Result;
use tile_empires::simulation::Match;

/// Headless bot-vs-bot matches
#[derive(Parser, Debug)]
#[command(name = "tile-empires")]
#[command(about = "Run bot-controlled teams on a generated map and report the outcome")]
struct Args {
    /// TOML config; omitted keys keep their defaults
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Random seed for map generation
    #[arg(long)]
    seed: Option<u64>,

    /// Map width in tiles (overrides the config)
    #[arg(long)]
    width: Option<i32>,

    /// Map height in tiles (overrides the config)
    #[arg(long)]
    height: Option<i32>,

    /// Number of teams; defaults to the number of --mode flags, or 2
    #[arg(long)]
    teams: Option<u8>,

    /// Strategic mode per team (economic, defensive, offensive, default), repeatable
    #[arg(long = "mode")]
    modes: Vec<StrategicMode>,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 600.0)]
    seconds: f64,

    /// Seconds per frame
    #[arg(long, default_value_t = 0.1)]
    frame_dt: f64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tile_empires=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(width) = args.width {
        config.map.width = width;
    }
    if let Some(height) = args.height {
        config.map.height = height;
    }
    config.validate()?;

    let team_count = args
        .teams
        .unwrap_or(if args.modes.is_empty() { 2 } else { args.modes.len() as u8 })
        .max(1);
    let modes: Vec<StrategicMode> = (0..team_count as usize)
        .map(|i| args.modes.get(i % args.modes.len().max(1)).copied().unwrap_or_default())
        .collect();

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, teams = team_count, seconds = args.seconds, "Tile Empires starting");

    let mut game = Match::generate(config, &modes, seed);
    let summary = game.run_for(args.seconds, args.frame_dt);

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
    }
    Ok(())
}
