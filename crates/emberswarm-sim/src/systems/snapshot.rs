//! Snapshot system: builds a complete WorldSnapshot from the current world.
//!
//! Read-only; every collection is emitted in a deterministic order (drones
//! by id, links by (sender, receiver), burning cells row-major).

use std::collections::BTreeMap;

use hecs::{Entity, World};

use emberswarm_core::components::{Battery, DroneIdentity, Odometer, Payload};
use emberswarm_core::enums::{DroneState, SimPhase};
use emberswarm_core::error::KernelError;
use emberswarm_core::state::{DroneSnapshot, FireView, MetricsView, WindView, WorldSnapshot};
use emberswarm_core::types::{Position, SimTime, Velocity};
use emberswarm_fire::FireGrid;

use crate::channel::ChannelTable;
use crate::engine::AgentRuntime;

/// Build a complete snapshot of the world.
pub fn build_snapshot(
    world: &World,
    entities: &BTreeMap<u32, Entity>,
    agents: &BTreeMap<u32, AgentRuntime>,
    fire: &FireGrid,
    channel: &ChannelTable,
    metrics: MetricsView,
    time: SimTime,
    phase: SimPhase,
) -> Result<WorldSnapshot, KernelError> {
    let mut drones = Vec::with_capacity(entities.len());
    for (&id, &entity) in entities {
        let mut query = world
            .query_one::<(
                &DroneIdentity,
                &Position,
                &Velocity,
                &DroneState,
                &Battery,
                &Payload,
                &Odometer,
            )>(entity)
            .map_err(|_| KernelError::InvariantViolation(format!("drone {id} lost its entity")))?;
        let (identity, pose, velocity, state, battery, payload, odometer) =
            query.get().ok_or_else(|| {
                KernelError::InvariantViolation(format!("drone {id} lost its components"))
            })?;
        let agent = agents
            .get(&id)
            .ok_or_else(|| KernelError::InvariantViolation(format!("drone {id} has no agent")))?;

        drones.push(DroneSnapshot {
            id: identity.id,
            role: identity.role,
            state: *state,
            pose: *pose,
            velocity: *velocity,
            battery_percent: battery.percent(),
            payload_remaining: payload.remaining_units,
            last_broadcast_pose: agent.etm.last_broadcast_pose(),
            last_broadcast_time_s: agent.etm.last_broadcast_time_s(),
            total_distance_m: odometer.total_distance_m,
            fires_detected: agent.fires_detected,
            suppression_ticks: agent.suppression_ticks,
            transmissions: agent.etm.total_transmissions(),
            triggers_suppressed: agent.etm.total_suppressed(),
        });
    }

    let summary = fire.summary();
    let fire_view = FireView {
        burning_count: summary.burning_count,
        perimeter_count: summary.perimeter_count,
        max_intensity: summary.max_intensity,
        total_fuel_remaining: summary.total_fuel_remaining,
        burning_cells: fire.iter_burning().collect(),
    };

    Ok(WorldSnapshot {
        time,
        phase,
        wind: WindView {
            speed_ms: fire.wind().speed_ms,
            heading_rad: fire.wind().heading_rad,
        },
        drones,
        fire: fire_view,
        links: channel.iter().copied().collect(),
        metrics,
    })
}
