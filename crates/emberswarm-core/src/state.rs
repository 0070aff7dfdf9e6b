//! World state snapshot — the complete observable state published after
//! each tick.
//!
//! Snapshots are deep copies with deterministically ordered collections, so
//! two runs with the same configuration and seed serialize to identical
//! bytes.

use serde::{Deserialize, Serialize};

use crate::enums::{DroneRole, DroneState, SimPhase};
use crate::types::{Position, SimTime, Velocity};

/// Complete world snapshot published through the outbox after each tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub time: SimTime,
    pub phase: SimPhase,
    pub wind: WindView,
    /// Drone records, sorted by id.
    pub drones: Vec<DroneSnapshot>,
    pub fire: FireView,
    /// Directed link states, sorted by (sender, receiver).
    pub links: Vec<LinkSnapshot>,
    pub metrics: MetricsView,
}

/// Uniform wind field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindView {
    pub speed_ms: f64,
    pub heading_rad: f64,
}

/// Visible state of one drone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneSnapshot {
    pub id: u32,
    pub role: DroneRole,
    pub state: DroneState,
    pub pose: Position,
    pub velocity: Velocity,
    pub battery_percent: f64,
    pub payload_remaining: f64,
    pub last_broadcast_pose: Option<Position>,
    pub last_broadcast_time_s: Option<f64>,
    pub total_distance_m: f64,
    pub fires_detected: u64,
    pub suppression_ticks: u64,
    pub transmissions: u64,
    pub triggers_suppressed: u64,
}

/// Fire grid summary plus the burning cell set (row-major order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FireView {
    pub burning_count: usize,
    /// Burning cells with at least one non-burning 4-neighbor.
    pub perimeter_count: usize,
    pub max_intensity: f64,
    pub total_fuel_remaining: f64,
    pub burning_cells: Vec<BurningCell>,
}

/// One burning cell in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurningCell {
    pub gx: usize,
    pub gy: usize,
    pub intensity: f64,
}

/// Immutable by-value state of one directed RF link.
///
/// Returned by value from RSSI queries so that callers hold a stable
/// snapshot across subsequent channel updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub sender_id: u32,
    pub receiver_id: u32,
    pub distance_m: f64,
    pub path_loss_db: f64,
    pub fading_db: f64,
    pub rssi_dbm: f64,
    pub packet_loss_prob: f64,
    pub latency_s: f64,
    /// Above receiver sensitivity and inside broadcast range.
    pub connected: bool,
    pub last_updated_s: f64,
}

/// Rolling swarm metrics for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
    pub tick: u64,
    pub transmissions_total: u64,
    pub triggers_suppressed_total: u64,
    pub messages_delivered_total: u64,
    pub messages_dropped_total: u64,
    pub fire_detections_total: u64,
    pub suppression_applications_total: u64,
    pub average_battery_percent: f64,
    pub active_drones: usize,
    pub burning_cells: usize,
}
