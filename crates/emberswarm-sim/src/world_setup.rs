//! Swarm spawn factories: build the initial world from configuration.

use tracing::info;

use emberswarm_core::config::SimulationConfig;
use emberswarm_core::enums::DroneRole;
use emberswarm_core::error::KernelError;
use emberswarm_core::types::Position;

use crate::engine::SimulationEngine;

/// Register the configured swarm and light the configured initial fires.
///
/// Leaders take ids 1..=L, followers L+1..=L+F, each docked along the
/// southern map edge.
pub fn populate(engine: &mut SimulationEngine) -> Result<(), KernelError> {
    let config = engine.config().clone();
    let mut index = 0u32;

    for _ in 0..config.swarm.num_leaders {
        let id = index + 1;
        engine.register_drone_with_role(id, dock_pose(&config, index), DroneRole::Leader)?;
        index += 1;
    }
    for _ in 0..config.swarm.num_followers {
        let id = index + 1;
        engine.register_drone_with_role(id, dock_pose(&config, index), DroneRole::Follower)?;
        index += 1;
    }

    for ignition in &config.fire.initial_fires {
        engine.ignite(ignition.x_m, ignition.y_m, ignition.intensity)?;
    }

    info!(
        leaders = config.swarm.num_leaders,
        followers = config.swarm.num_followers,
        fires = config.fire.initial_fires.len(),
        "world populated"
    );
    Ok(())
}

fn dock_pose(config: &SimulationConfig, index: u32) -> Position {
    config.dock_position(index)
}
