//! Uniform wind field affecting fire spread direction and rate.

use serde::{Deserialize, Serialize};

/// Wind applied uniformly across the grid. Heading uses the math
/// convention: 0 rad = +x (East), counterclockwise positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed_ms: f64,
    pub heading_rad: f64,
}

impl Wind {
    pub fn new(speed_ms: f64, heading_rad: f64) -> Self {
        Self {
            speed_ms: speed_ms.max(0.0),
            heading_rad,
        }
    }

    /// Wind as (vx, vy) components in m/s.
    pub fn vector(&self) -> (f64, f64) {
        (
            self.speed_ms * self.heading_rad.cos(),
            self.speed_ms * self.heading_rad.sin(),
        )
    }
}
