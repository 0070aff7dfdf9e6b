//! The per-step automaton update: spread, pending suppression, burndown.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use emberswarm_core::constants::{
    AMBIENT_TEMPERATURE_K, BURNING_EPSILON, FIRE_BASE_TEMPERATURE_K, FIRE_TEMPERATURE_SPAN_K,
    FUEL_BURN_RATE, IGNITION_THRESHOLD, INTENSITY_DECAY_PER_SEC, SPREAD_IGNITE_FRACTION,
    SPREAD_PROBABILITY_SCALE, WIND_COUPLING_K, WIND_FACTOR_MAX, WIND_FACTOR_MIN,
    WIND_REFERENCE_SPEED_MS,
};

use crate::grid::{FireGrid, FireStepReport};

/// Moore neighborhood offsets in fixed scan order. Keeping this order stable
/// keeps RNG draw consumption stable across runs.
const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

impl FireGrid {
    /// Advance the automaton one step of `dt` seconds.
    ///
    /// Order within the step: stochastic spread from every burning cell,
    /// then application of queued suppressions, then burndown decay. All
    /// spread draws come from the single RNG passed in; iteration is
    /// row-major.
    pub fn step(&mut self, dt: f64, rng: &mut ChaCha8Rng) -> FireStepReport {
        let now = self.advance_clock(dt);
        let mut report = FireStepReport::default();

        // --- Spread ---
        let spread_cells_base = self.spread_rate_mps * dt / self.cell_size_m;
        let wind = self.wind;
        let wind_push = WIND_COUPLING_K * (wind.speed_ms / WIND_REFERENCE_SPEED_MS).min(1.0);

        let mut ignitions: Vec<(usize, usize, f64)> = Vec::new();
        for gy in 0..self.height {
            for gx in 0..self.width {
                let source = self.cells[gy * self.width + gx];
                if !source.is_burning() {
                    continue;
                }

                for (dx, dy) in NEIGHBOR_OFFSETS {
                    let nx = gx as i64 + dx;
                    let ny = gy as i64 + dy;
                    if !self.in_bounds(nx, ny) {
                        continue;
                    }
                    let neighbor = self.cells[ny as usize * self.width + nx as usize];
                    if neighbor.fuel_density <= 0.0 || neighbor.intensity >= IGNITION_THRESHOLD {
                        continue;
                    }

                    let wind_factor = if wind.speed_ms > 0.0 {
                        let toward = (dy as f64).atan2(dx as f64);
                        (1.0 + wind_push * (toward - wind.heading_rad).cos())
                            .clamp(WIND_FACTOR_MIN, WIND_FACTOR_MAX)
                    } else {
                        1.0
                    };

                    // Chebyshev distance within the Moore neighborhood is 1;
                    // the +1 keeps boundary neighbors ignitable even when the
                    // per-step spread distance is below one cell.
                    let spread_cells = spread_cells_base * wind_factor;
                    let chebyshev = dx.abs().max(dy.abs()) as f64;
                    let distance_factor = (spread_cells - chebyshev + 1.0).clamp(0.0, 1.0);

                    let p_ignite = source.intensity
                        * distance_factor
                        * neighbor.fuel_density
                        * SPREAD_PROBABILITY_SCALE;

                    if rng.gen_range(0.0..1.0) < p_ignite {
                        ignitions.push((
                            nx as usize,
                            ny as usize,
                            (source.intensity * SPREAD_IGNITE_FRACTION).min(1.0),
                        ));
                    }
                }
            }
        }

        for (gx, gy, intensity) in ignitions {
            let cell = self.cell_mut(gx, gy);
            let was_burning = cell.is_burning();
            cell.intensity = cell.intensity.max(intensity);
            cell.temperature_k = FIRE_BASE_TEMPERATURE_K + cell.intensity * FIRE_TEMPERATURE_SPAN_K;
            if cell.ignition_time_s.is_none() {
                cell.ignition_time_s = Some(now);
            }
            if !was_burning {
                report.newly_ignited += 1;
            }
        }

        // --- Pending suppressions, between spread and burndown ---
        let effectiveness = self.suppression_effectiveness;
        for suppression in self.take_pending() {
            let cell = self.cell_mut(suppression.gx, suppression.gy);
            cell.intensity *= 1.0 - effectiveness * suppression.strength;
            if !cell.is_burning() {
                cell.temperature_k = FIRE_BASE_TEMPERATURE_K;
            }
            report.suppressions_applied += 1;
        }

        // --- Burndown ---
        let decay = INTENSITY_DECAY_PER_SEC.powf(dt);
        for cell in &mut self.cells {
            if !cell.is_burning() {
                continue;
            }
            cell.intensity *= decay;
            cell.fuel_density = (cell.fuel_density - FUEL_BURN_RATE * cell.intensity * dt).max(0.0);
            if cell.intensity < BURNING_EPSILON {
                cell.temperature_k = AMBIENT_TEMPERATURE_K;
            } else {
                cell.temperature_k =
                    FIRE_BASE_TEMPERATURE_K + cell.intensity * FIRE_TEMPERATURE_SPAN_K;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Wind;
    use rand::SeedableRng;

    fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    fn run_steps(grid: &mut FireGrid, rng: &mut ChaCha8Rng, steps: usize, dt: f64) {
        for _ in 0..steps {
            grid.step(dt, rng);
        }
    }

    #[test]
    fn test_fire_spread_sanity_blob() {
        // 50x50 grid, uniform fuel, no wind, seed 42: ignite the center at
        // full intensity and run 60 simulated seconds.
        let mut grid = FireGrid::new(50, 50, 10.0, 1.0, 30.0, 0.9);
        let mut rng = seeded_rng(42);
        grid.ignite_world(250.0, 250.0, 1.0).unwrap();
        run_steps(&mut grid, &mut rng, 600, 0.1);

        let summary = grid.summary();
        assert!(
            summary.burning_count >= 20 && summary.burning_count <= 400,
            "burning count {} outside [20, 400]",
            summary.burning_count
        );

        // The burn blob stays centered on the ignition cell without wind.
        let (mut cx, mut cy, mut n) = (0.0, 0.0, 0.0);
        for cell in grid.iter_burning() {
            cx += cell.gx as f64;
            cy += cell.gy as f64;
            n += 1.0;
        }
        cx /= n;
        cy /= n;
        assert!((cx - 25.0).abs() < 3.0, "x centroid {cx} drifted from 25");
        assert!((cy - 25.0).abs() < 3.0, "y centroid {cy} drifted from 25");
    }

    #[test]
    fn test_wind_biases_spread_downwind() {
        // Wind blowing toward +x at 5 m/s: after 60 s the burn centroid has
        // moved to larger x while staying near the ignition row.
        let mut grid = FireGrid::new(50, 50, 10.0, 1.0, 30.0, 0.9);
        grid.set_wind(Wind::new(5.0, 0.0));
        let mut rng = seeded_rng(42);
        grid.ignite_world(250.0, 250.0, 1.0).unwrap();
        run_steps(&mut grid, &mut rng, 600, 0.1);

        let (mut cx, mut cy, mut n) = (0.0, 0.0, 0.0);
        for cell in grid.iter_burning() {
            cx += cell.gx as f64;
            cy += cell.gy as f64;
            n += 1.0;
        }
        assert!(n > 0.0, "fire died out under wind");
        cx /= n;
        cy /= n;
        assert!(cx > 25.0, "x centroid {cx} should move downwind of 25");
        assert!((cy - 25.0).abs() <= 1.0, "y centroid {cy} should stay near 25");
    }

    #[test]
    fn test_spread_happens_with_subcell_step_distance() {
        // With dt = 0.1 s and 10 m cells the per-step spread distance is far
        // below one cell; boundary neighbors must still ignite eventually.
        let mut grid = FireGrid::new(11, 11, 10.0, 1.0, 30.0, 0.9);
        let mut rng = seeded_rng(7);
        grid.ignite(5, 5, 1.0).unwrap();
        run_steps(&mut grid, &mut rng, 600, 0.1);
        assert!(
            grid.summary().burning_count > 1,
            "fire never left the ignition cell"
        );
    }

    #[test]
    fn test_suppression_applied_between_spread_and_burndown() {
        let mut grid = FireGrid::new(10, 10, 10.0, 1.0, 30.0, 0.9);
        let mut rng = seeded_rng(1);
        grid.ignite(5, 5, 1.0).unwrap();
        grid.queue_suppression_world(55.0, 55.0, 1.0).unwrap();
        grid.step(0.1, &mut rng);
        // One full-strength application: 1.0 * (1 - 0.9) then burndown decay.
        let expected = 0.1 * 0.95f64.powf(0.1);
        let actual = grid.cell(5, 5).unwrap().intensity;
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_suppression_monotonicity() {
        // Applying s then s' never leaves more fire than either alone.
        let run = |strengths: &[f64]| {
            let mut grid = FireGrid::new(10, 10, 10.0, 1.0, 30.0, 0.9);
            let mut rng = seeded_rng(3);
            grid.ignite(4, 4, 1.0).unwrap();
            for &s in strengths {
                grid.queue_suppression_world(45.0, 45.0, s).unwrap();
            }
            grid.step(0.1, &mut rng);
            grid.cell(4, 4).unwrap().intensity
        };
        let both = run(&[0.5, 0.7]);
        let first = run(&[0.5]);
        let second = run(&[0.7]);
        assert!(both <= first + 1e-12);
        assert!(both <= second + 1e-12);
    }

    #[test]
    fn test_burndown_decays_and_consumes_fuel() {
        let mut grid = FireGrid::new(5, 5, 10.0, 1.0, 30.0, 0.9);
        let mut rng = seeded_rng(9);
        grid.ignite(2, 2, 1.0).unwrap();
        let fuel_before = grid.cell(2, 2).unwrap().fuel_density;
        run_steps(&mut grid, &mut rng, 10, 0.1);
        let cell = *grid.cell(2, 2).unwrap();
        assert!(cell.intensity < 1.0);
        assert!((cell.intensity - 0.95f64.powf(1.0)).abs() < 0.05);
        assert!(cell.fuel_density < fuel_before);
    }

    #[test]
    fn test_exhausted_fuel_cell_decays_monotonically() {
        let mut grid = FireGrid::new(5, 5, 10.0, 1.0, 30.0, 0.9);
        let mut rng = seeded_rng(11);
        grid.ignite(2, 2, 1.0).unwrap();
        grid.cell_mut(2, 2).fuel_density = 0.0;
        let mut last = grid.cell(2, 2).unwrap().intensity;
        for _ in 0..100 {
            grid.step(0.1, &mut rng);
            let now = grid.cell(2, 2).unwrap().intensity;
            assert!(now <= last + 1e-15, "intensity rose on a fuel-less cell");
            last = now;
        }
    }

    #[test]
    fn test_identical_seeds_identical_fires() {
        let run = || {
            let mut grid = FireGrid::new(30, 30, 10.0, 1.0, 30.0, 0.9);
            let mut rng = seeded_rng(1234);
            grid.ignite(15, 15, 1.0).unwrap();
            run_steps(&mut grid, &mut rng, 300, 0.1);
            grid.iter_burning().collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
