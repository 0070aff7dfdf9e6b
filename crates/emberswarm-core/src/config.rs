//! Simulation configuration.
//!
//! A plain, immutable value loaded once at startup and threaded through
//! constructors. Every field has a default so a partial YAML file (or none
//! at all) yields a runnable configuration. `validate` rejects out-of-range
//! values before the kernel is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::EtmNorm;
use crate::error::ConfigError;
use crate::types::Position;

/// Master configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub sim: SimSection,
    pub swarm: SwarmSection,
    pub battery: BatterySection,
    pub fire: FireSection,
    pub channel: ChannelSection,
}

/// Kernel timing and seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSection {
    /// Tick duration in simulated seconds.
    pub dt_s: f64,
    /// Master RNG seed; all subsystem RNGs derive from it.
    pub seed: u64,
}

/// Swarm composition and behavior parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSection {
    pub num_leaders: u32,
    pub num_followers: u32,
    /// ETM initial threshold (meters).
    pub detm_eta0: f64,
    /// ETM threshold decay rate (1/s).
    pub detm_lambda: f64,
    /// ETM threshold floor (meters).
    pub detm_eta_min: f64,
    pub detm_norm: EtmNorm,
    pub cruise_speed_ms: f64,
    pub climb_rate_ms: f64,
    /// Operating altitude reached after takeoff (meters).
    pub takeoff_altitude_m: f64,
    /// Distance from the dock at which landing begins (meters).
    pub landing_radius_m: f64,
    /// Distance at which a search waypoint counts as reached (meters).
    pub waypoint_radius_m: f64,
    /// Minimum safe separation between drones (meters).
    pub min_separation_m: f64,
    /// Confidence floor below which observer estimates are ignored.
    pub observer_min_confidence: f64,
    /// Neighbor estimates older than this are expired (seconds).
    pub observer_max_age_s: f64,
    /// Fire intensity above which the onboard sensor can detect.
    pub detection_threshold: f64,
    /// Suppression strength applied per tick while suppressing.
    pub suppression_strength: f64,
    /// Lévy flight tail exponent.
    pub levy_alpha: f64,
    /// Typical Lévy step length (meters).
    pub levy_step_scale_m: f64,
}

/// Battery and payload parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatterySection {
    pub capacity_mah: f64,
    pub voltage_v: f64,
    /// Flight drain per meter flown (Wh/m).
    pub energy_drain_per_meter: f64,
    /// Hover drain per airborne second (Wh/s).
    pub energy_drain_hover_per_sec: f64,
    /// Hard return-to-launch threshold (percent).
    pub rtl_threshold_percent: f64,
    pub max_payload_units: f64,
    /// Payload consumed per suppression tick at full strength.
    pub payload_drain_per_suppression: f64,
}

/// Fire grid and propagation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireSection {
    pub grid_width: usize,
    pub grid_height: usize,
    pub cell_size_m: f64,
    /// Base spread rate (meters per minute).
    pub spread_rate_mpm: f64,
    /// Per-application intensity reduction factor k in (1 - k*strength).
    pub suppression_effectiveness: f64,
    /// Initial uniform fuel density.
    pub fuel_density: f64,
    pub wind_speed_ms: f64,
    pub wind_heading_rad: f64,
    /// Fires ignited at startup (world coordinates).
    pub initial_fires: Vec<IgnitionPoint>,
}

/// A configured startup ignition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IgnitionPoint {
    pub x_m: f64,
    pub y_m: f64,
    pub intensity: f64,
}

/// RF channel model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    pub path_loss_exponent: f64,
    /// RSSI at the reference distance (dBm).
    pub reference_rssi_dbm: f64,
    pub reference_distance_m: f64,
    /// Rice K-factor; mapped to fading sigma via the documented
    /// approximation (K = 8 -> ~2 dB).
    pub rice_k_factor: f64,
    /// Links beyond this range drop every packet.
    pub max_broadcast_range_m: f64,
    /// Receiver sensitivity (dBm); links below it report disconnected.
    pub sensitivity_dbm: f64,
}

impl Default for SimSection {
    fn default() -> Self {
        Self { dt_s: 0.1, seed: 0 }
    }
}

impl Default for SwarmSection {
    fn default() -> Self {
        Self {
            num_leaders: 3,
            num_followers: 10,
            detm_eta0: 1.0,
            detm_lambda: 0.5,
            detm_eta_min: crate::constants::ETM_MIN_ETA_M,
            detm_norm: EtmNorm::L2,
            cruise_speed_ms: 15.0,
            climb_rate_ms: 2.0,
            takeoff_altitude_m: 10.0,
            landing_radius_m: 5.0,
            waypoint_radius_m: 5.0,
            min_separation_m: 10.0,
            observer_min_confidence: 0.0,
            observer_max_age_s: 0.5,
            detection_threshold: 0.1,
            suppression_strength: 0.8,
            levy_alpha: 1.5,
            levy_step_scale_m: 50.0,
        }
    }
}

impl Default for BatterySection {
    fn default() -> Self {
        Self {
            capacity_mah: 5000.0,
            voltage_v: 14.8,
            energy_drain_per_meter: 0.08,
            energy_drain_hover_per_sec: 0.0001,
            rtl_threshold_percent: 20.0,
            max_payload_units: 40.0,
            payload_drain_per_suppression: 1.0,
        }
    }
}

impl Default for FireSection {
    fn default() -> Self {
        Self {
            grid_width: 100,
            grid_height: 100,
            cell_size_m: 10.0,
            spread_rate_mpm: 30.0,
            suppression_effectiveness: 0.9,
            fuel_density: 1.0,
            wind_speed_ms: 0.0,
            wind_heading_rad: 0.0,
            initial_fires: Vec::new(),
        }
    }
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            path_loss_exponent: 3.0,
            reference_rssi_dbm: -40.0,
            reference_distance_m: 1.0,
            rice_k_factor: 8.0,
            max_broadcast_range_m: 100.0,
            sensitivity_dbm: -110.0,
        }
    }
}

impl SimulationConfig {
    /// Load from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse from a YAML string. Missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Map-bounds in world meters, derived from the fire grid.
    pub fn map_extent_m(&self) -> (f64, f64) {
        (
            self.fire.grid_width as f64 * self.fire.cell_size_m,
            self.fire.grid_height as f64 * self.fire.cell_size_m,
        )
    }

    /// Reject out-of-range values. Called once before the kernel is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sim.dt_s > 0.0) {
            return Err(ConfigError::out_of_range("sim.dt_s", "must be > 0"));
        }
        if self.swarm.num_leaders + self.swarm.num_followers == 0 {
            return Err(ConfigError::out_of_range(
                "swarm.num_leaders + swarm.num_followers",
                "swarm must contain at least one drone",
            ));
        }
        if self.swarm.detm_eta0 < 0.0 || self.swarm.detm_lambda < 0.0 {
            return Err(ConfigError::out_of_range(
                "swarm.detm_eta0 / swarm.detm_lambda",
                "must be >= 0",
            ));
        }
        if self.swarm.detm_eta_min < 0.0 {
            return Err(ConfigError::out_of_range("swarm.detm_eta_min", "must be >= 0"));
        }
        if !(self.swarm.levy_alpha > 1.0 && self.swarm.levy_alpha < 2.0) {
            return Err(ConfigError::out_of_range(
                "swarm.levy_alpha",
                "must lie in (1, 2)",
            ));
        }
        if !(self.swarm.cruise_speed_ms > 0.0 && self.swarm.climb_rate_ms > 0.0) {
            return Err(ConfigError::out_of_range(
                "swarm.cruise_speed_ms / swarm.climb_rate_ms",
                "must be > 0",
            ));
        }
        if !(self.swarm.suppression_strength > 0.0 && self.swarm.suppression_strength <= 1.0) {
            return Err(ConfigError::out_of_range(
                "swarm.suppression_strength",
                "must lie in (0, 1]",
            ));
        }
        if !(self.swarm.observer_max_age_s > 0.0) {
            return Err(ConfigError::out_of_range(
                "swarm.observer_max_age_s",
                "must be > 0",
            ));
        }
        if !(self.battery.capacity_mah > 0.0 && self.battery.voltage_v > 0.0) {
            return Err(ConfigError::out_of_range(
                "battery.capacity_mah / battery.voltage_v",
                "must be > 0",
            ));
        }
        if !(0.0..=100.0).contains(&self.battery.rtl_threshold_percent) {
            return Err(ConfigError::out_of_range(
                "battery.rtl_threshold_percent",
                "must lie in [0, 100]",
            ));
        }
        if self.battery.energy_drain_per_meter < 0.0 || self.battery.energy_drain_hover_per_sec < 0.0
        {
            return Err(ConfigError::out_of_range(
                "battery.energy_drain_per_meter / battery.energy_drain_hover_per_sec",
                "must be >= 0",
            ));
        }
        if self.battery.max_payload_units <= 0.0 {
            return Err(ConfigError::out_of_range(
                "battery.max_payload_units",
                "must be > 0",
            ));
        }
        if self.fire.grid_width == 0 || self.fire.grid_height == 0 {
            return Err(ConfigError::out_of_range(
                "fire.grid_width / fire.grid_height",
                "must be > 0",
            ));
        }
        if !(self.fire.cell_size_m > 0.0) {
            return Err(ConfigError::out_of_range("fire.cell_size_m", "must be > 0"));
        }
        if self.fire.spread_rate_mpm < 0.0 {
            return Err(ConfigError::out_of_range("fire.spread_rate_mpm", "must be >= 0"));
        }
        if !(self.fire.suppression_effectiveness > 0.0 && self.fire.suppression_effectiveness <= 1.0)
        {
            return Err(ConfigError::out_of_range(
                "fire.suppression_effectiveness",
                "must lie in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.fire.fuel_density) {
            return Err(ConfigError::out_of_range("fire.fuel_density", "must lie in [0, 1]"));
        }
        if !(self.channel.path_loss_exponent > 0.0) {
            return Err(ConfigError::out_of_range(
                "channel.path_loss_exponent",
                "must be > 0",
            ));
        }
        if !(self.channel.reference_distance_m > 0.0) {
            return Err(ConfigError::out_of_range(
                "channel.reference_distance_m",
                "must be > 0",
            ));
        }
        if !(self.channel.rice_k_factor > 0.0) {
            return Err(ConfigError::out_of_range(
                "channel.rice_k_factor",
                "must be > 0",
            ));
        }
        if !(self.channel.max_broadcast_range_m > 0.0) {
            return Err(ConfigError::out_of_range(
                "channel.max_broadcast_range_m",
                "must be > 0",
            ));
        }
        for fire in &self.fire.initial_fires {
            if !(fire.intensity > 0.0 && fire.intensity <= 1.0) {
                return Err(ConfigError::out_of_range(
                    "fire.initial_fires",
                    "intensity must lie in (0, 1]",
                ));
            }
        }
        Ok(())
    }

    /// Dock position for a drone, spread along the southern map edge.
    pub fn dock_position(&self, index: u32) -> Position {
        Position::new(10.0 + 15.0 * index as f64, 10.0, 0.0)
    }
}
