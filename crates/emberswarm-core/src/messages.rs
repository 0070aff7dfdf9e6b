//! Messages exchanged between drones over the modeled radio channel.
//!
//! Message kinds form a closed sum type carrying typed payloads. Delivery
//! order is by `deliver_time_s` with sender-id tie-break.

use serde::{Deserialize, Serialize};

use crate::commands::DroneCommand;
use crate::enums::DroneState;
use crate::types::{Position, Velocity};

/// A message in flight on the swarm bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMessage {
    pub sender_id: u32,
    /// Simulated time at emission (seconds).
    pub send_time_s: f64,
    /// Simulated time at which the message becomes deliverable (seconds).
    pub deliver_time_s: f64,
    pub payload: MessagePayload,
}

/// Typed payloads for each message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MessagePayload {
    /// Event-triggered state broadcast.
    Telemetry(Telemetry),
    /// A drone reported fire at its position. Emitted outside ETM gating.
    FireDetection {
        x_m: f64,
        y_m: f64,
        intensity: f64,
    },
    /// A drone applied suppression at its position.
    Suppression {
        x_m: f64,
        y_m: f64,
        strength: f64,
    },
    /// Ground-station command relayed to a drone.
    Command { command: DroneCommand },
}

/// Telemetry snapshot of a drone's own state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub pose: Position,
    pub velocity: Velocity,
    pub battery_percent: f64,
    pub payload_remaining: f64,
    pub state: DroneState,
}
