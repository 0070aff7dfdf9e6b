//! Simulation constants and tuning parameters.
//!
//! Values that are operator-tunable live in `config`; the constants here are
//! model parameters that define the physics itself.

// --- Fire model ---

/// Intensity below which a cell is considered non-burning.
pub const BURNING_EPSILON: f64 = 0.01;

/// Neighbor cells above this intensity are not re-ignited by spread.
pub const IGNITION_THRESHOLD: f64 = 0.1;

/// Fraction of the source intensity carried into a newly ignited cell.
pub const SPREAD_IGNITE_FRACTION: f64 = 0.8;

/// Overall scale on the per-neighbor ignition probability.
pub const SPREAD_PROBABILITY_SCALE: f64 = 0.3;

/// Natural intensity decay factor per second of burning.
pub const INTENSITY_DECAY_PER_SEC: f64 = 0.95;

/// Fuel consumed per unit intensity per second.
pub const FUEL_BURN_RATE: f64 = 0.01;

/// Wind speed at which the directional spread bias saturates (m/s).
pub const WIND_REFERENCE_SPEED_MS: f64 = 5.0;

/// Directional coupling strength of wind on spread.
pub const WIND_COUPLING_K: f64 = 1.0;

/// Clamp bounds for the wind spread factor.
pub const WIND_FACTOR_MIN: f64 = 0.25;
pub const WIND_FACTOR_MAX: f64 = 2.0;

/// Ambient cell temperature (Kelvin, ~20°C).
pub const AMBIENT_TEMPERATURE_K: f64 = 293.0;

/// Burning cell temperature model: base + span * intensity.
pub const FIRE_BASE_TEMPERATURE_K: f64 = 300.0;
pub const FIRE_TEMPERATURE_SPAN_K: f64 = 700.0;

// --- RF channel ---

/// Maximum physically realizable RSSI (clipping). Also the sentinel
/// reported for a drone's link to itself.
pub const MAX_RSSI_DBM: f64 = 0.0;

/// Minimum RSSI clamp.
pub const MIN_RSSI_DBM: f64 = -200.0;

/// RSSI at or below which packet loss probability reaches 1.0.
pub const PACKET_LOSS_FLOOR_RSSI_DBM: f64 = -100.0;

/// dB of margin per decade of packet loss probability.
pub const PACKET_LOSS_DECAY_DB: f64 = 10.0;

/// Reference RSSI for latency scaling.
pub const LATENCY_REFERENCE_RSSI_DBM: f64 = -60.0;

/// Latency floor (seconds).
pub const BASE_LATENCY_S: f64 = 0.005;

/// Additional latency per dB below the latency reference (seconds).
pub const LATENCY_PER_DB_S: f64 = 0.0005;

/// Anchor point for the Rice-K to fading-sigma approximation:
/// K = 8.0 maps to sigma ~= 2 dB.
pub const RICE_K_REFERENCE: f64 = 8.0;
pub const FADING_STD_REFERENCE_DB: f64 = 2.0;

// --- Event-triggered messaging ---

/// Threshold floor preventing underflow during long silences (meters).
pub const ETM_MIN_ETA_M: f64 = 0.01;

// --- Distributed observer ---

/// Confidence lost as an estimate ages to max_age: 1.0 -> 0.2.
pub const OBSERVER_CONFIDENCE_DROP: f64 = 0.8;

// --- Flight controller assignment ---

/// Base UDP port for external flight-controller processes.
pub const FLIGHT_CONTROLLER_BASE_PORT: u32 = 14550;

/// Port stride between consecutive vehicles.
pub const FLIGHT_CONTROLLER_PORT_STRIDE: u32 = 10;
