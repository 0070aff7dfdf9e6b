//! emberswarm — wildfire-containment swarm simulator.
//!
//! Loads configuration, spawns the sim-loop thread, and reports progress
//! until the requested duration elapses. Exit codes: 0 on normal shutdown,
//! 1 on configuration errors, 2 on a kernel invariant violation.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use emberswarm_app::sim_loop::{spawn_sim_loop, SimLoopOptions};
use emberswarm_app::AppState;
use emberswarm_core::config::SimulationConfig;

#[derive(Parser, Debug)]
#[command(name = "emberswarm")]
#[command(about = "Software-in-the-loop wildfire containment swarm simulator", long_about = None)]
struct Args {
    /// Path to a YAML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the master RNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override the leader count
    #[arg(long)]
    leaders: Option<u32>,

    /// Override the follower count
    #[arg(long)]
    followers: Option<u32>,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "60.0")]
    duration: f64,

    /// Run as fast as possible instead of pacing to wall clock
    #[arg(long)]
    fast: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set tracing subscriber");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "configuration error");
            std::process::exit(1);
        }
    };

    let dt = config.sim.dt_s;
    let max_ticks = (args.duration / dt).ceil() as u64;
    info!(
        seed = config.sim.seed,
        leaders = config.swarm.num_leaders,
        followers = config.swarm.num_followers,
        duration_s = args.duration,
        "starting simulation"
    );

    let state = AppState::new();
    let (command_tx, handle) = spawn_sim_loop(
        config,
        SimLoopOptions {
            max_ticks: Some(max_ticks),
            real_time: !args.fast,
            auto_start: true,
        },
        state.latest_snapshot.clone(),
    );
    *state.command_tx.lock().unwrap() = Some(command_tx);
    *state.running.lock().unwrap() = true;

    // Report progress from the outbox about once a second until the loop
    // finishes.
    while !handle.is_finished() {
        std::thread::sleep(Duration::from_millis(1000));
        if let Some(snapshot) = state.latest_snapshot.lock().unwrap().as_ref() {
            info!(
                sim_time_s = snapshot.time.elapsed_secs,
                burning = snapshot.fire.burning_count,
                airborne = snapshot.metrics.active_drones,
                battery_avg_percent = snapshot.metrics.average_battery_percent,
                transmissions = snapshot.metrics.transmissions_total,
                "progress"
            );
        }
    }

    match handle.join() {
        Ok(Ok(())) => {
            info!("simulation complete");
        }
        Ok(Err(error)) => {
            error!(%error, "kernel invariant violation");
            std::process::exit(2);
        }
        Err(_) => {
            error!("sim loop thread panicked");
            std::process::exit(2);
        }
    }
}

fn load_config(args: &Args) -> Result<SimulationConfig, emberswarm_core::error::ConfigError> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_yaml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.sim.seed = seed;
    }
    if let Some(leaders) = args.leaders {
        config.swarm.num_leaders = leaders;
    }
    if let Some(followers) = args.followers {
        config.swarm.num_followers = followers;
    }
    config.validate()?;
    Ok(config)
}
