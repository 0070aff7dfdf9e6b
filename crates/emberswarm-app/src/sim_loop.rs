//! Sim-loop thread: drives the kernel at the configured tick rate.
//!
//! Each iteration drains the command inbox, advances one tick, and
//! publishes the snapshot into the latest-only outbox. In real-time mode
//! the loop paces itself to the tick duration with a catch-up reset when it
//! falls far behind; in fast mode it ticks flat out.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use emberswarm_core::config::SimulationConfig;
use emberswarm_core::error::KernelError;
use emberswarm_core::state::WorldSnapshot;
use emberswarm_sim::{world_setup, SimulationEngine};

use crate::state::SimLoopCommand;

/// Bounded inbox depth; producers block briefly rather than flooding the
/// kernel.
const INBOX_DEPTH: usize = 256;

/// Options for a sim-loop run.
#[derive(Debug, Clone)]
pub struct SimLoopOptions {
    /// Stop after this many ticks (None = run until Shutdown).
    pub max_ticks: Option<u64>,
    /// Pace ticks to wall-clock time.
    pub real_time: bool,
    /// Queue a Start command before the first tick.
    pub auto_start: bool,
}

/// Spawn the sim loop on its own thread.
///
/// Returns the inbox sender and the join handle; the handle resolves to the
/// kernel's final result so the caller can map invariant violations to the
/// fatal exit code.
pub fn spawn_sim_loop(
    config: SimulationConfig,
    options: SimLoopOptions,
    latest_snapshot: Arc<Mutex<Option<WorldSnapshot>>>,
) -> (
    mpsc::SyncSender<SimLoopCommand>,
    JoinHandle<Result<(), KernelError>>,
) {
    let (command_tx, command_rx) = mpsc::sync_channel::<SimLoopCommand>(INBOX_DEPTH);

    let handle = std::thread::Builder::new()
        .name("emberswarm-sim-loop".into())
        .spawn(move || run_sim_loop(config, options, command_rx, &latest_snapshot))
        .expect("failed to spawn sim loop thread");

    (command_tx, handle)
}

/// The sim loop. Runs until Shutdown, channel disconnect, tick budget
/// exhaustion, or a fatal kernel error.
fn run_sim_loop(
    config: SimulationConfig,
    options: SimLoopOptions,
    command_rx: mpsc::Receiver<SimLoopCommand>,
    latest_snapshot: &Mutex<Option<WorldSnapshot>>,
) -> Result<(), KernelError> {
    let dt = config.sim.dt_s;
    let tick_duration = Duration::from_secs_f64(dt);

    let mut engine = SimulationEngine::new(config);
    world_setup::populate(&mut engine)?;
    if options.auto_start {
        engine.queue_command(emberswarm_core::commands::SimCommand::Start);
    }

    let mut ticks: u64 = 0;
    let mut next_tick_time = Instant::now();

    loop {
        // 1. Drain all pending inbox commands. The shutdown flag is only
        //    honored between ticks; an in-flight tick always completes.
        loop {
            match command_rx.try_recv() {
                Ok(SimLoopCommand::Kernel(command)) => engine.queue_command(command),
                Ok(SimLoopCommand::Shutdown) => {
                    info!("sim loop shutting down");
                    return Ok(());
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    info!("inbox disconnected, sim loop exiting");
                    return Ok(());
                }
            }
        }

        // 2. Advance one tick.
        let snapshot = match engine.step(dt) {
            Ok(snapshot) => snapshot,
            Err(error) if error.is_fatal() => {
                warn!(%error, "kernel refused to continue");
                return Err(error);
            }
            Err(error) => {
                warn!(%error, "tick failed");
                continue;
            }
        };

        // 3. Publish into the latest-only outbox.
        if let Ok(mut slot) = latest_snapshot.lock() {
            *slot = Some(snapshot);
        }

        ticks += 1;
        if let Some(max) = options.max_ticks {
            if ticks >= max {
                info!(ticks, "tick budget reached, sim loop exiting");
                return Ok(());
            }
        }

        // 4. Pace to wall clock in real-time mode.
        if options.real_time {
            next_tick_time += tick_duration;
            let now = Instant::now();
            if next_tick_time > now {
                std::thread::sleep(next_tick_time - now);
            } else if now - next_tick_time > tick_duration * 2 {
                // Too far behind; reset to avoid a catch-up spiral.
                next_tick_time = now;
            }
        }
    }
}
