//! Energy step: apply flight and hover drain per drone from the distance
//! moved this tick and the elapsed time. Grounded drones draw nothing, and
//! battery level only rises again on an explicit dock recharge.

use std::collections::BTreeMap;

use hecs::{Entity, World};

use emberswarm_core::components::{Battery, Odometer};
use emberswarm_core::config::SimulationConfig;
use emberswarm_core::enums::DroneState;
use emberswarm_core::error::KernelError;

/// Apply per-tick energy drain for every drone.
pub fn run(
    world: &mut World,
    entities: &BTreeMap<u32, Entity>,
    config: &SimulationConfig,
    dt: f64,
) -> Result<(), KernelError> {
    for (&id, &entity) in entities {
        let (state, battery, odometer) = world
            .query_one_mut::<(&DroneState, &mut Battery, &mut Odometer)>(entity)
            .map_err(|_| {
                KernelError::InvariantViolation(format!("drone {id} lost its components"))
            })?;

        if state.is_airborne() {
            let drain = odometer.tick_distance_m * config.battery.energy_drain_per_meter
                + dt * config.battery.energy_drain_hover_per_sec;
            battery.drain(drain);
        }
        odometer.tick_distance_m = 0.0;
    }
    Ok(())
}
