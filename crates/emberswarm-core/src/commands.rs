//! External commands sent to the kernel through the inbox.
//!
//! Commands are drained at the top of each tick before any kernel work.
//! Validation failures are rejected at the boundary with kernel state
//! untouched.

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// All external commands accepted by the kernel inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimCommand {
    /// Begin advancing simulated time.
    Start,
    /// Stop advancing simulated time; world freezes.
    Stop,
    /// Ignite a fire at world coordinates.
    Ignite {
        x_m: f64,
        y_m: f64,
        intensity: f64,
    },
    /// Apply suppression at world coordinates.
    Suppress {
        x_m: f64,
        y_m: f64,
        strength: f64,
    },
    /// Change the uniform wind field.
    SetWind {
        speed_ms: f64,
        heading_rad: f64,
    },
    /// Hot-reload the event-trigger parameters for every drone.
    UpdateEtmParams { eta0_m: f64, lambda_per_s: f64 },
    /// Hot-reload the battery return-to-launch threshold.
    SetRtlThreshold { percent: f64 },
    /// Direct a command to a single drone over the reliable command path.
    Drone {
        drone_id: u32,
        command: DroneCommand,
    },
}

/// Commands addressed to an individual drone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DroneCommand {
    /// Leave the dock and climb to operating altitude.
    Takeoff,
    /// Descend and land in place.
    Land,
    /// Abandon the mission and return to the dock.
    ReturnToLaunch,
    /// Fly to a waypoint and resume searching there.
    Goto { position: Position },
    /// Hold a relative position on the named leader.
    EnterFormation { leader_id: u32 },
}
