//! FireGrid: the W×H cell array with ignition, suppression, and queries.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use emberswarm_core::constants::{
    AMBIENT_TEMPERATURE_K, BURNING_EPSILON, FIRE_BASE_TEMPERATURE_K, FIRE_TEMPERATURE_SPAN_K,
};
use emberswarm_core::error::KernelError;
use emberswarm_core::state::BurningCell;

use crate::wind::Wind;

/// State of a single fire cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireCell {
    /// Burn intensity in [0, 1].
    pub intensity: f64,
    /// Remaining fuel in [0, 1].
    pub fuel_density: f64,
    /// Informational temperature (Kelvin), tracks intensity.
    pub temperature_k: f64,
    /// Simulated time of first ignition, if any.
    pub ignition_time_s: Option<f64>,
}

impl FireCell {
    fn fresh(fuel_density: f64) -> Self {
        Self {
            intensity: 0.0,
            fuel_density,
            temperature_k: AMBIENT_TEMPERATURE_K,
            ignition_time_s: None,
        }
    }

    /// A cell burns while its intensity exceeds the burning epsilon.
    pub fn is_burning(&self) -> bool {
        self.intensity > BURNING_EPSILON
    }
}

/// A suppression waiting to be applied between spread and burndown.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingSuppression {
    pub gx: usize,
    pub gy: usize,
    pub strength: f64,
}

/// Receipt returned when a suppression is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionReceipt {
    pub gx: usize,
    pub gy: usize,
    pub cells_affected: usize,
}

/// Global fire statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FireSummary {
    pub burning_count: usize,
    /// Burning cells with at least one non-burning 4-neighbor.
    pub perimeter_count: usize,
    pub max_intensity: f64,
    pub total_fuel_remaining: f64,
}

/// Outcome of one automaton step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FireStepReport {
    pub newly_ignited: usize,
    pub suppressions_applied: usize,
}

/// The rectangular fire grid. Row-major cell storage; world coordinates map
/// to cells by flooring against the cell size.
#[derive(Debug, Clone)]
pub struct FireGrid {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) cell_size_m: f64,
    pub(crate) cells: Vec<FireCell>,
    pub(crate) wind: Wind,
    /// Base spread rate in m/s (configured in m/min).
    pub(crate) spread_rate_mps: f64,
    /// Factor k in the per-application reduction (1 - k*strength).
    pub(crate) suppression_effectiveness: f64,
    pending: Vec<PendingSuppression>,
    /// Simulated clock, advanced by `step`, used to stamp ignition times.
    time_s: f64,
}

impl FireGrid {
    pub fn new(
        width: usize,
        height: usize,
        cell_size_m: f64,
        fuel_density: f64,
        spread_rate_mpm: f64,
        suppression_effectiveness: f64,
    ) -> Self {
        Self {
            width,
            height,
            cell_size_m,
            cells: vec![FireCell::fresh(fuel_density); width * height],
            wind: Wind::default(),
            spread_rate_mps: spread_rate_mpm / 60.0,
            suppression_effectiveness,
            pending: Vec::new(),
            time_s: 0.0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size_m(&self) -> f64 {
        self.cell_size_m
    }

    pub fn wind(&self) -> Wind {
        self.wind
    }

    pub fn set_wind(&mut self, wind: Wind) {
        info!(
            speed_ms = wind.speed_ms,
            heading_rad = wind.heading_rad,
            "wind updated"
        );
        self.wind = wind;
    }

    pub(crate) fn in_bounds(&self, gx: i64, gy: i64) -> bool {
        gx >= 0 && gy >= 0 && (gx as usize) < self.width && (gy as usize) < self.height
    }

    pub(crate) fn index(&self, gx: usize, gy: usize) -> usize {
        gy * self.width + gx
    }

    /// Map world meters to a grid cell, or None off-grid.
    pub fn world_to_grid(&self, x_m: f64, y_m: f64) -> Option<(usize, usize)> {
        let gx = (x_m / self.cell_size_m).floor() as i64;
        let gy = (y_m / self.cell_size_m).floor() as i64;
        self.in_bounds(gx, gy).then(|| (gx as usize, gy as usize))
    }

    pub fn cell(&self, gx: usize, gy: usize) -> Option<&FireCell> {
        (gx < self.width && gy < self.height).then(|| &self.cells[gy * self.width + gx])
    }

    pub(crate) fn cell_mut(&mut self, gx: usize, gy: usize) -> &mut FireCell {
        let idx = self.index(gx, gy);
        &mut self.cells[idx]
    }

    /// Ignite the cell at grid coordinates. Intensity merges by max, so
    /// re-igniting never lowers an existing fire. A zero-fuel cell is a
    /// no-op (returns false).
    pub fn ignite(&mut self, gx: usize, gy: usize, intensity: f64) -> Result<bool, KernelError> {
        if gx >= self.width || gy >= self.height {
            return Err(KernelError::OutOfBounds {
                x: gx as f64 * self.cell_size_m,
                y: gy as f64 * self.cell_size_m,
            });
        }
        let time_s = self.time_s;
        let cell = self.cell_mut(gx, gy);
        if cell.fuel_density <= 0.0 {
            return Ok(false);
        }
        cell.intensity = cell.intensity.max(intensity.min(1.0));
        cell.temperature_k = FIRE_BASE_TEMPERATURE_K + cell.intensity * FIRE_TEMPERATURE_SPAN_K;
        if cell.ignition_time_s.is_none() {
            cell.ignition_time_s = Some(time_s);
        }
        debug!(gx, gy, intensity = cell.intensity, "cell ignited");
        Ok(true)
    }

    /// Ignite at world coordinates.
    pub fn ignite_world(
        &mut self,
        x_m: f64,
        y_m: f64,
        intensity: f64,
    ) -> Result<bool, KernelError> {
        let (gx, gy) = self
            .world_to_grid(x_m, y_m)
            .ok_or(KernelError::OutOfBounds { x: x_m, y: y_m })?;
        self.ignite(gx, gy, intensity)
    }

    /// Queue a suppression at world coordinates. It takes effect during the
    /// next step, between spread and burndown.
    pub fn queue_suppression_world(
        &mut self,
        x_m: f64,
        y_m: f64,
        strength: f64,
    ) -> Result<SuppressionReceipt, KernelError> {
        let (gx, gy) = self
            .world_to_grid(x_m, y_m)
            .ok_or(KernelError::OutOfBounds { x: x_m, y: y_m })?;
        self.pending.push(PendingSuppression { gx, gy, strength });
        Ok(SuppressionReceipt {
            gx,
            gy,
            cells_affected: 1,
        })
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingSuppression> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn advance_clock(&mut self, dt: f64) -> f64 {
        self.time_s += dt;
        self.time_s
    }

    /// Fire intensity at world coordinates, or None off-grid.
    pub fn sample_intensity(&self, x_m: f64, y_m: f64) -> Option<f64> {
        self.world_to_grid(x_m, y_m)
            .map(|(gx, gy)| self.cells[gy * self.width + gx].intensity)
    }

    /// Burning cells in row-major order.
    pub fn iter_burning(&self) -> impl Iterator<Item = BurningCell> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.is_burning().then(|| BurningCell {
                gx: i % self.width,
                gy: i / self.width,
                intensity: cell.intensity,
            })
        })
    }

    /// Global fire statistics. Perimeter counts burning cells with at least
    /// one non-burning in-grid 4-neighbor.
    pub fn summary(&self) -> FireSummary {
        let mut summary = FireSummary::default();
        for gy in 0..self.height {
            for gx in 0..self.width {
                let cell = &self.cells[gy * self.width + gx];
                summary.total_fuel_remaining += cell.fuel_density;
                if !cell.is_burning() {
                    continue;
                }
                summary.burning_count += 1;
                summary.max_intensity = summary.max_intensity.max(cell.intensity);
                let on_perimeter = [(0i64, -1i64), (0, 1), (-1, 0), (1, 0)]
                    .iter()
                    .any(|(dx, dy)| {
                        let nx = gx as i64 + dx;
                        let ny = gy as i64 + dy;
                        self.in_bounds(nx, ny)
                            && !self.cells[ny as usize * self.width + nx as usize].is_burning()
                    });
                if on_perimeter {
                    summary.perimeter_count += 1;
                }
            }
        }
        summary
    }

    /// Check the grid's own invariants. Used by the kernel's per-tick
    /// invariant sweep.
    pub fn check_invariants(&self) -> Result<(), KernelError> {
        for (i, cell) in self.cells.iter().enumerate() {
            if !(0.0..=1.0).contains(&cell.intensity) || !cell.intensity.is_finite() {
                return Err(KernelError::InvariantViolation(format!(
                    "cell ({}, {}) intensity {} outside [0, 1]",
                    i % self.width,
                    i / self.width,
                    cell.intensity
                )));
            }
            if cell.fuel_density < 0.0 || !cell.fuel_density.is_finite() {
                return Err(KernelError::InvariantViolation(format!(
                    "cell ({}, {}) fuel density {} negative",
                    i % self.width,
                    i / self.width,
                    cell.fuel_density
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_grid() -> FireGrid {
        FireGrid::new(10, 10, 10.0, 1.0, 30.0, 0.9)
    }

    #[test]
    fn test_world_to_grid_floors() {
        let grid = make_grid();
        assert_eq!(grid.world_to_grid(0.0, 0.0), Some((0, 0)));
        assert_eq!(grid.world_to_grid(9.99, 9.99), Some((0, 0)));
        assert_eq!(grid.world_to_grid(10.0, 25.0), Some((1, 2)));
        assert_eq!(grid.world_to_grid(-0.1, 5.0), None);
        assert_eq!(grid.world_to_grid(100.0, 5.0), None);
    }

    #[test]
    fn test_ignite_merges_by_max() {
        let mut grid = make_grid();
        grid.ignite(3, 3, 0.8).unwrap();
        grid.ignite(3, 3, 0.4).unwrap();
        assert!((grid.cell(3, 3).unwrap().intensity - 0.8).abs() < 1e-12);
        grid.ignite(3, 3, 1.0).unwrap();
        assert!((grid.cell(3, 3).unwrap().intensity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ignite_zero_fuel_is_noop() {
        let mut grid = FireGrid::new(10, 10, 10.0, 0.0, 30.0, 0.9);
        let ignited = grid.ignite(5, 5, 1.0).unwrap();
        assert!(!ignited);
        assert_eq!(grid.cell(5, 5).unwrap().intensity, 0.0);
    }

    #[test]
    fn test_ignite_out_of_bounds() {
        let mut grid = make_grid();
        assert!(matches!(
            grid.ignite_world(-5.0, 0.0, 1.0),
            Err(KernelError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.ignite(10, 0, 1.0),
            Err(KernelError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_sample_intensity() {
        let mut grid = make_grid();
        grid.ignite_world(35.0, 45.0, 0.7).unwrap();
        assert!((grid.sample_intensity(35.0, 45.0).unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(grid.sample_intensity(85.0, 85.0).unwrap(), 0.0);
        assert!(grid.sample_intensity(-1.0, 0.0).is_none());
    }

    #[test]
    fn test_summary_counts_perimeter() {
        let mut grid = make_grid();
        // A 3x3 burning block: the center has four burning 4-neighbors,
        // the eight surrounding cells are perimeter.
        for gy in 3..6 {
            for gx in 3..6 {
                grid.ignite(gx, gy, 1.0).unwrap();
            }
        }
        let summary = grid.summary();
        assert_eq!(summary.burning_count, 9);
        assert_eq!(summary.perimeter_count, 8);
        assert!((summary.max_intensity - 1.0).abs() < 1e-12);
    }
}
