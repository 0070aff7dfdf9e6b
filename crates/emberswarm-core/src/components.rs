//! ECS components for hecs entities.
//!
//! Components are plain data structs with no behavior beyond small
//! accessors. Simulation logic lives in systems, not components.

use serde::{Deserialize, Serialize};

use crate::enums::DroneRole;
use crate::types::Position;

/// Identity of a drone entity: unique positive id plus swarm role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DroneIdentity {
    pub id: u32,
    pub role: DroneRole,
}

/// Battery state in watt-hours. Monotone non-increasing except on dock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Battery {
    pub capacity_wh: f64,
    pub remaining_wh: f64,
}

impl Battery {
    /// Full battery of the given capacity (mAh at the given pack voltage).
    pub fn full(capacity_mah: f64, voltage_v: f64) -> Self {
        let capacity_wh = capacity_mah / 1000.0 * voltage_v;
        Self {
            capacity_wh,
            remaining_wh: capacity_wh,
        }
    }

    pub fn percent(&self) -> f64 {
        (self.remaining_wh / self.capacity_wh * 100.0).clamp(0.0, 100.0)
    }

    /// Drain energy, clamped at empty. Returns energy actually consumed.
    pub fn drain(&mut self, energy_wh: f64) -> f64 {
        let consumed = energy_wh.min(self.remaining_wh);
        self.remaining_wh -= consumed;
        consumed
    }

    /// Explicit reset at the dock.
    pub fn recharge(&mut self) {
        self.remaining_wh = self.capacity_wh;
    }
}

/// Suppressant payload. Monotone non-increasing except on dock refill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Payload {
    pub max_units: f64,
    pub remaining_units: f64,
}

impl Payload {
    pub fn full(max_units: f64) -> Self {
        Self {
            max_units,
            remaining_units: max_units,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_units <= 0.0
    }

    /// Consume payload, clamped at empty. Returns units actually consumed.
    pub fn consume(&mut self, units: f64) -> f64 {
        let consumed = units.min(self.remaining_units);
        self.remaining_units -= consumed;
        consumed
    }

    /// Explicit reset at the dock.
    pub fn refill(&mut self) {
        self.remaining_units = self.max_units;
    }
}

/// Home/dock position used for return-to-launch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HomeDock {
    pub position: Position,
}

/// Flight distance accounting, fed to the energy model each tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Odometer {
    /// Total distance flown since registration (meters).
    pub total_distance_m: f64,
    /// Distance moved during the current tick (meters).
    pub tick_distance_m: f64,
}
