//! Wildfire propagation model.
//!
//! A rectangular cellular automaton with wind-biased stochastic spread,
//! suppression, and burndown. All randomness comes from a single seeded RNG
//! passed into `FireGrid::step`, and cells are visited in row-major order,
//! so identical seeds reproduce identical fires.

mod grid;
mod spread;
mod wind;

pub use grid::{FireCell, FireGrid, FireStepReport, FireSummary, SuppressionReceipt};
pub use wind::Wind;
