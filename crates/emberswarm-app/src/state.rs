//! Application state shared between external surfaces and the sim-loop
//! thread.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use emberswarm_core::commands::SimCommand;
use emberswarm_core::state::WorldSnapshot;

/// Commands sent from external surfaces to the sim-loop thread.
#[derive(Debug)]
pub enum SimLoopCommand {
    /// A kernel command to queue at the next tick boundary.
    Kernel(SimCommand),
    /// Shut down the sim loop gracefully; the in-flight tick completes.
    Shutdown,
}

/// Shared application state.
///
/// The snapshot slot is latest-only: the loop overwrites it after every
/// tick, and slow readers simply miss intermediate ticks without ever
/// blocking the kernel.
pub struct AppState {
    /// Channel sender into the sim loop. `None` before the loop is spawned.
    pub command_tx: Mutex<Option<mpsc::SyncSender<SimLoopCommand>>>,
    /// Latest complete snapshot published by the loop.
    pub latest_snapshot: Arc<Mutex<Option<WorldSnapshot>>>,
    /// Whether the sim loop is currently running.
    pub running: Mutex<bool>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            command_tx: Mutex::new(None),
            latest_snapshot: Arc::new(Mutex::new(None)),
            running: Mutex::new(false),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
