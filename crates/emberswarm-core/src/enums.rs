//! Enumeration types used throughout the simulation.

use serde::{Deserialize, Serialize};

/// Drone role in the swarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DroneRole {
    Leader,
    #[default]
    Follower,
}

/// Drone operational state. Exactly one state at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DroneState {
    /// On the ground at the dock, waiting for a mission.
    #[default]
    Idle,
    /// Climbing to operating altitude.
    Takeoff,
    /// Exploring for fire with a heavy-tailed random walk.
    Search,
    /// Holding a relative position on a leader.
    Formation,
    /// Hovering over fire, releasing suppressant.
    Suppress,
    /// Returning to the dock on low battery or empty payload.
    ReturnToLaunch,
    /// Final descent onto the dock.
    Land,
}

impl DroneState {
    /// Whether the drone is off the ground in this state.
    pub fn is_airborne(&self) -> bool {
        !matches!(self, DroneState::Idle | DroneState::Land)
    }
}

/// Norm used for the event-trigger error computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EtmNorm {
    /// Euclidean norm.
    #[default]
    L2,
    /// Max-absolute-component norm.
    LInf,
}

/// Top-level simulation phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimPhase {
    /// Created but not started; ticks process commands only.
    #[default]
    Idle,
    /// Advancing simulated time.
    Running,
    /// Stopped; world is frozen.
    Stopped,
}
