//! Drone behavior finite state machine.
//!
//! Pure functions that compute state transitions and motion intent from a
//! per-tick context. No ECS dependency; the engine's control system builds
//! the context, applies the returned update, and performs the side effects
//! named by the returned action.

use emberswarm_core::commands::DroneCommand;
use emberswarm_core::constants::BURNING_EPSILON;
use emberswarm_core::enums::DroneState;
use emberswarm_core::types::{Position, Velocity};

/// Flight envelope and mission thresholds, drawn from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightLimits {
    pub cruise_speed_ms: f64,
    pub climb_rate_ms: f64,
    pub takeoff_altitude_m: f64,
    pub landing_radius_m: f64,
    pub waypoint_radius_m: f64,
    pub rtl_threshold_percent: f64,
    pub suppression_strength: f64,
}

/// Input to the FSM for a single drone tick.
#[derive(Debug, Clone, Copy)]
pub struct DroneContext {
    pub state: DroneState,
    pub pose: Position,
    pub battery_percent: f64,
    pub payload_remaining: f64,
    pub home: Position,
    /// Fire intensity sampled at the drone's own position.
    pub local_fire_intensity: f64,
    /// Whether the probabilistic fire-detection draw succeeded this tick.
    pub fire_detected: bool,
    /// Current search waypoint, if any.
    pub waypoint: Option<Position>,
    /// A fire location reported by another drone.
    pub known_fire: Option<Position>,
    /// Target pose while holding formation on a leader.
    pub formation_target: Option<Position>,
    /// External command awaiting processing.
    pub pending_command: Option<DroneCommand>,
    /// The observer flagged a neighbor inside minimum separation.
    pub collision_deferred: bool,
    pub limits: FlightLimits,
}

/// Side effect requested by the FSM, performed by the control system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DroneAction {
    None,
    /// Release suppressant at the current position.
    Suppress { strength: f64 },
    /// Landed: recharge battery and refill payload at the dock.
    Dock,
    /// Draw a fresh search waypoint from the Lévy walker.
    RequestWaypoint,
}

/// Output of one FSM evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneUpdate {
    pub new_state: DroneState,
    pub state_changed: bool,
    pub velocity: Velocity,
    pub action: DroneAction,
}

/// Evaluate the FSM for one drone tick.
pub fn evaluate(ctx: &DroneContext) -> DroneUpdate {
    // Hard return-to-launch override: any airborne state yields immediately
    // to battery or payload exhaustion, regardless of mission state.
    if ctx.state.is_airborne()
        && ctx.state != DroneState::ReturnToLaunch
        && (ctx.battery_percent <= ctx.limits.rtl_threshold_percent
            || ctx.payload_remaining <= 0.0)
    {
        return transition(ctx, DroneState::ReturnToLaunch);
    }

    if let Some(update) = apply_command(ctx) {
        return update;
    }

    match ctx.state {
        DroneState::Idle => hold(ctx),
        DroneState::Takeoff => evaluate_takeoff(ctx),
        DroneState::Search => evaluate_search(ctx),
        DroneState::Formation => evaluate_formation(ctx),
        DroneState::Suppress => evaluate_suppress(ctx),
        DroneState::ReturnToLaunch => evaluate_rtl(ctx),
        DroneState::Land => evaluate_land(ctx),
    }
}

/// Process an external command, if one applies in the current state.
fn apply_command(ctx: &DroneContext) -> Option<DroneUpdate> {
    let command = ctx.pending_command?;
    match (ctx.state, command) {
        (DroneState::Idle, DroneCommand::Takeoff)
            if ctx.battery_percent > ctx.limits.rtl_threshold_percent =>
        {
            Some(transition(ctx, DroneState::Takeoff))
        }
        (state, DroneCommand::Land) if state.is_airborne() => {
            Some(transition(ctx, DroneState::Land))
        }
        (state, DroneCommand::ReturnToLaunch)
            if state.is_airborne() && state != DroneState::ReturnToLaunch =>
        {
            Some(transition(ctx, DroneState::ReturnToLaunch))
        }
        // The control system stores the Goto waypoint before evaluation;
        // here the command just steers the drone back into search.
        (state, DroneCommand::Goto { .. })
            if state.is_airborne() && state != DroneState::Search =>
        {
            Some(transition(ctx, DroneState::Search))
        }
        (state, DroneCommand::EnterFormation { .. })
            if state.is_airborne() && state != DroneState::Formation =>
        {
            Some(transition(ctx, DroneState::Formation))
        }
        _ => None,
    }
}

fn evaluate_takeoff(ctx: &DroneContext) -> DroneUpdate {
    if ctx.pose.z >= ctx.limits.takeoff_altitude_m {
        return transition(ctx, DroneState::Search);
    }
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: Velocity::new(0.0, 0.0, ctx.limits.climb_rate_ms),
        action: DroneAction::None,
    }
}

fn evaluate_search(ctx: &DroneContext) -> DroneUpdate {
    // Fire underfoot: switch to suppression. Battery and payload guards are
    // implied by the override above.
    if ctx.fire_detected {
        return transition(ctx, DroneState::Suppress);
    }

    if ctx.collision_deferred {
        return hover(ctx);
    }

    // Reported fires take priority over the random walk.
    let target = ctx.known_fire.or(ctx.waypoint);
    match target {
        Some(target) => {
            if ctx.pose.horizontal_range_to(&target) < ctx.limits.waypoint_radius_m {
                DroneUpdate {
                    new_state: ctx.state,
                    state_changed: false,
                    velocity: altitude_hold(ctx),
                    action: DroneAction::RequestWaypoint,
                }
            } else {
                DroneUpdate {
                    new_state: ctx.state,
                    state_changed: false,
                    velocity: cruise_toward(ctx, target),
                    action: DroneAction::None,
                }
            }
        }
        None => DroneUpdate {
            new_state: ctx.state,
            state_changed: false,
            velocity: altitude_hold(ctx),
            action: DroneAction::RequestWaypoint,
        },
    }
}

fn evaluate_formation(ctx: &DroneContext) -> DroneUpdate {
    if ctx.collision_deferred {
        return hover(ctx);
    }
    match ctx.formation_target {
        Some(target) if ctx.pose.horizontal_range_to(&target) >= ctx.limits.waypoint_radius_m => {
            DroneUpdate {
                new_state: ctx.state,
                state_changed: false,
                velocity: cruise_toward(ctx, target),
                action: DroneAction::None,
            }
        }
        // On station, or the leader estimate has expired: hold.
        _ => hover(ctx),
    }
}

fn evaluate_suppress(ctx: &DroneContext) -> DroneUpdate {
    if ctx.local_fire_intensity < BURNING_EPSILON {
        // Fire out underfoot. Payload exhaustion is handled by the override.
        return transition(ctx, DroneState::Search);
    }
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: Velocity::default(),
        action: DroneAction::Suppress {
            strength: ctx.limits.suppression_strength,
        },
    }
}

fn evaluate_rtl(ctx: &DroneContext) -> DroneUpdate {
    if ctx.pose.range_to(&ctx.home) < ctx.limits.landing_radius_m {
        return transition(ctx, DroneState::Land);
    }
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: velocity_toward(ctx.pose, ctx.home, ctx.limits.cruise_speed_ms),
        action: DroneAction::None,
    }
}

fn evaluate_land(ctx: &DroneContext) -> DroneUpdate {
    if ctx.pose.z <= 0.1 {
        return DroneUpdate {
            new_state: DroneState::Idle,
            state_changed: true,
            velocity: Velocity::default(),
            action: DroneAction::Dock,
        };
    }
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: Velocity::new(0.0, 0.0, -ctx.limits.climb_rate_ms),
        action: DroneAction::None,
    }
}

/// Enter a new state with zero velocity this tick.
fn transition(ctx: &DroneContext, new_state: DroneState) -> DroneUpdate {
    DroneUpdate {
        new_state,
        state_changed: new_state != ctx.state,
        velocity: Velocity::default(),
        action: DroneAction::None,
    }
}

fn hold(ctx: &DroneContext) -> DroneUpdate {
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: Velocity::default(),
        action: DroneAction::None,
    }
}

fn hover(ctx: &DroneContext) -> DroneUpdate {
    DroneUpdate {
        new_state: ctx.state,
        state_changed: false,
        velocity: altitude_hold(ctx),
        action: DroneAction::None,
    }
}

/// Zero horizontal motion, correcting altitude toward the operating height.
fn altitude_hold(ctx: &DroneContext) -> Velocity {
    let error = ctx.limits.takeoff_altitude_m - ctx.pose.z;
    Velocity::new(
        0.0,
        0.0,
        error.clamp(-ctx.limits.climb_rate_ms, ctx.limits.climb_rate_ms),
    )
}

/// Horizontal cruise toward a target with altitude hold.
fn cruise_toward(ctx: &DroneContext, target: Position) -> Velocity {
    let dx = target.x - ctx.pose.x;
    let dy = target.y - ctx.pose.y;
    let dist = (dx * dx + dy * dy).sqrt();
    let vertical = altitude_hold(ctx);
    if dist < 1e-9 {
        return vertical;
    }
    let scale = ctx.limits.cruise_speed_ms / dist;
    Velocity::new(dx * scale, dy * scale, vertical.z)
}

/// Full 3D motion toward a target (used for return-to-launch descent).
fn velocity_toward(from: Position, to: Position, speed: f64) -> Velocity {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dz = to.z - from.z;
    let dist = (dx * dx + dy * dy + dz * dz).sqrt();
    if dist < 1e-9 {
        return Velocity::default();
    }
    let scale = speed / dist;
    Velocity::new(dx * scale, dy * scale, dz * scale)
}
