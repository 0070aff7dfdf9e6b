//! Simulation engine — the deterministic kernel of emberswarm.
//!
//! `SimulationEngine` owns the authoritative world state (fire grid, RF
//! links, per-vehicle energy and pose), processes external commands, runs
//! the per-tick subsystems in a fixed order, and produces `WorldSnapshot`s.
//! Completely headless, enabling deterministic testing: two engines built
//! from the same configuration produce bitwise-identical snapshots.

pub mod channel;
pub mod engine;
pub mod systems;
pub mod world_setup;

pub use channel::{ChannelParams, ChannelTable};
pub use engine::SimulationEngine;
