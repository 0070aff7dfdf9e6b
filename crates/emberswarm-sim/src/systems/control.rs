//! Vehicle control step: sense, run the behavior FSM, act, integrate motion.
//!
//! Drones are visited in id order so per-agent RNG consumption is stable
//! across runs. Each drone senses the world through read queries, evaluates
//! its state machine, and mutates the world only through the narrow typed
//! operations the engine exposes (queue a suppression, report a detection).

use std::collections::BTreeMap;

use hecs::{Entity, World};
use rand::Rng;
use tracing::{debug, info, warn};

use emberswarm_core::commands::DroneCommand;
use emberswarm_core::components::{Battery, HomeDock, Odometer, Payload};
use emberswarm_core::config::SimulationConfig;
use emberswarm_core::enums::DroneState;
use emberswarm_core::error::KernelError;
use emberswarm_core::messages::{MessagePayload, SwarmMessage};
use emberswarm_core::types::{Position, Velocity};
use emberswarm_fire::FireGrid;

use emberswarm_agent::fsm::{self, DroneAction, DroneContext, FlightLimits};

use crate::engine::AgentRuntime;
use crate::systems::metrics::TickCounters;

/// Messages produced by the control step, broadcast outside ETM gating.
#[derive(Debug, Default)]
pub struct ControlOutput {
    pub outbound: Vec<SwarmMessage>,
}

/// Run the control step for every drone.
#[allow(clippy::too_many_arguments)]
pub fn run(
    world: &mut World,
    entities: &BTreeMap<u32, Entity>,
    agents: &mut BTreeMap<u32, AgentRuntime>,
    fire: &mut FireGrid,
    config: &SimulationConfig,
    now_s: f64,
    dt: f64,
    counters: &mut TickCounters,
) -> Result<ControlOutput, KernelError> {
    let limits = flight_limits(config);
    let (extent_x, extent_y) = config.map_extent_m();
    let mut output = ControlOutput::default();

    for (&id, &entity) in entities {
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| KernelError::InvariantViolation(format!("drone {id} has no agent")))?;

        // --- Sense ---
        let (pose, state, battery_percent, payload_units, home) = {
            let (pose, state, battery, payload, dock) = world
                .query_one_mut::<(&Position, &DroneState, &Battery, &Payload, &HomeDock)>(entity)
                .map_err(|_| {
                    KernelError::InvariantViolation(format!("drone {id} lost its components"))
                })?;
            (*pose, *state, battery.percent(), payload.remaining_units, dock.position)
        };

        let local_fire_intensity = fire.sample_intensity(pose.x, pose.y).unwrap_or(0.0);

        // A shared fire sighting is spent once the drone arrives; its own
        // sensor takes over from there.
        if let Some(sighting) = agent.known_fire {
            if pose.horizontal_range_to(&sighting) < limits.waypoint_radius_m {
                agent.known_fire = None;
            }
        }

        // Probabilistic onboard detection while searching or suppressing.
        let mut fire_detected = false;
        if matches!(state, DroneState::Search | DroneState::Suppress)
            && local_fire_intensity > config.swarm.detection_threshold
        {
            fire_detected = agent.rng.gen_bool(local_fire_intensity.clamp(0.0, 1.0));
            if fire_detected {
                agent.fires_detected += 1;
                counters.fire_detections += 1;
                output.outbound.push(SwarmMessage {
                    sender_id: id,
                    send_time_s: now_s,
                    deliver_time_s: now_s,
                    payload: MessagePayload::FireDetection {
                        x_m: pose.x,
                        y_m: pose.y,
                        intensity: local_fire_intensity,
                    },
                });
            }
        }

        // Observer-based separation check.
        let collision_deferred = !agent
            .observer
            .collision_risks(now_s, pose, config.swarm.min_separation_m)
            .is_empty();
        if collision_deferred {
            debug!(drone = id, "deferring motion for separation");
        }

        // Commands that carry targets update agent bookkeeping first.
        match agent.pending_command {
            Some(DroneCommand::Goto { position }) => {
                agent.waypoint = Some(position);
                agent.known_fire = None;
            }
            Some(DroneCommand::EnterFormation { leader_id }) => {
                agent.formation_leader = Some(leader_id);
                agent.formation_offset = None;
            }
            _ => {}
        }

        let formation_target = formation_target(agent, pose, now_s, config);

        // --- Decide ---
        let ctx = DroneContext {
            state,
            pose,
            battery_percent,
            payload_remaining: payload_units,
            home,
            local_fire_intensity,
            fire_detected,
            waypoint: agent.waypoint,
            known_fire: agent.known_fire,
            formation_target,
            pending_command: agent.pending_command,
            collision_deferred,
            limits,
        };
        let update = fsm::evaluate(&ctx);
        agent.pending_command = None;

        if update.state_changed {
            info!(drone = id, from = ?state, to = ?update.new_state, "state transition");
        }

        // --- Act ---
        match update.action {
            DroneAction::Suppress { strength } => {
                match fire.queue_suppression_world(pose.x, pose.y, strength) {
                    Ok(_) => {
                        agent.suppression_ticks += 1;
                        counters.suppression_applications += 1;
                        output.outbound.push(SwarmMessage {
                            sender_id: id,
                            send_time_s: now_s,
                            deliver_time_s: now_s,
                            payload: MessagePayload::Suppression {
                                x_m: pose.x,
                                y_m: pose.y,
                                strength,
                            },
                        });
                        let payload = world
                            .query_one_mut::<&mut Payload>(entity)
                            .map_err(|_| {
                                KernelError::InvariantViolation(format!(
                                    "drone {id} lost its components"
                                ))
                            })?;
                        payload.consume(config.battery.payload_drain_per_suppression);
                    }
                    Err(error) => warn!(drone = id, %error, "suppression rejected"),
                }
            }
            DroneAction::Dock => {
                let (battery, payload) = world
                    .query_one_mut::<(&mut Battery, &mut Payload)>(entity)
                    .map_err(|_| {
                        KernelError::InvariantViolation(format!("drone {id} lost its components"))
                    })?;
                battery.recharge();
                payload.refill();
                info!(drone = id, "docked: battery charged, payload refilled");
            }
            DroneAction::RequestWaypoint => {
                let (dx, dy) = agent.walker.next_step();
                agent.waypoint = Some(Position::new(
                    (pose.x + dx).clamp(0.0, extent_x),
                    (pose.y + dy).clamp(0.0, extent_y),
                    config.swarm.takeoff_altitude_m,
                ));
            }
            DroneAction::None => {}
        }

        // --- Integrate ---
        let (new_pose, moved) = integrate(pose, update.velocity, dt, extent_x, extent_y);
        {
            let (position, velocity, state_component, odometer) = world
                .query_one_mut::<(&mut Position, &mut Velocity, &mut DroneState, &mut Odometer)>(
                    entity,
                )
                .map_err(|_| {
                    KernelError::InvariantViolation(format!("drone {id} lost its components"))
                })?;
            *position = new_pose;
            *velocity = update.velocity;
            *state_component = update.new_state;
            odometer.total_distance_m += moved;
            odometer.tick_distance_m = moved;
        }
    }

    Ok(output)
}

/// Predicted hold position for a drone in formation, from the observer's
/// estimate of its leader. The offset is captured on the first usable
/// estimate after entering formation.
fn formation_target(
    agent: &mut AgentRuntime,
    pose: Position,
    now_s: f64,
    config: &SimulationConfig,
) -> Option<Position> {
    let leader_id = agent.formation_leader?;
    let prediction = agent.observer.predict(leader_id, now_s)?;
    if prediction.confidence <= config.swarm.observer_min_confidence {
        return None;
    }
    let (dx, dy) = *agent.formation_offset.get_or_insert((
        pose.x - prediction.pose.x,
        pose.y - prediction.pose.y,
    ));
    Some(Position::new(
        prediction.pose.x + dx,
        prediction.pose.y + dy,
        config.swarm.takeoff_altitude_m,
    ))
}

fn flight_limits(config: &SimulationConfig) -> FlightLimits {
    FlightLimits {
        cruise_speed_ms: config.swarm.cruise_speed_ms,
        climb_rate_ms: config.swarm.climb_rate_ms,
        takeoff_altitude_m: config.swarm.takeoff_altitude_m,
        landing_radius_m: config.swarm.landing_radius_m,
        waypoint_radius_m: config.swarm.waypoint_radius_m,
        rtl_threshold_percent: config.battery.rtl_threshold_percent,
        suppression_strength: config.swarm.suppression_strength,
    }
}

/// Euler pose integration, clipped to map bounds and the ground plane.
fn integrate(
    pose: Position,
    velocity: Velocity,
    dt: f64,
    extent_x: f64,
    extent_y: f64,
) -> (Position, f64) {
    let new_pose = Position::new(
        (pose.x + velocity.x * dt).clamp(0.0, extent_x),
        (pose.y + velocity.y * dt).clamp(0.0, extent_y),
        (pose.z + velocity.z * dt).max(0.0),
    );
    let moved = pose.range_to(&new_pose);
    (new_pose, moved)
}
