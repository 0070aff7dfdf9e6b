//! Distributed observer over neighboring vehicles.
//!
//! Each vehicle keeps the last received state per neighbor and predicts
//! poses between sparse updates with a constant-velocity model. Confidence
//! decays with estimate age and collapses to zero past the maximum age, at
//! which point the estimate freezes (no extrapolation).

use std::collections::BTreeMap;

use emberswarm_core::constants::OBSERVER_CONFIDENCE_DROP;
use emberswarm_core::types::{Position, Velocity};

/// Observer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverParams {
    /// Estimates older than this are expired (seconds).
    pub max_age_s: f64,
    /// Collision queries ignore estimates at or below this confidence.
    pub min_confidence: f64,
}

/// Last received state for one neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEstimate {
    pub pose: Position,
    pub velocity: Velocity,
    /// Sender-clock timestamp; used only for update precedence.
    pub send_time_s: f64,
    /// Local receive time; ages the estimate.
    pub update_time_s: f64,
}

/// A predicted neighbor pose with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPrediction {
    pub neighbor_id: u32,
    pub pose: Position,
    pub confidence: f64,
}

/// Table of neighbor estimates owned by one vehicle.
#[derive(Debug, Clone)]
pub struct NeighborObserver {
    params: ObserverParams,
    neighbors: BTreeMap<u32, NeighborEstimate>,
}

impl NeighborObserver {
    pub fn new(params: ObserverParams) -> Self {
        Self {
            params,
            neighbors: BTreeMap::new(),
        }
    }

    /// Ingest a telemetry update from a neighbor.
    ///
    /// A message carrying an older sender timestamp than the stored estimate
    /// never overwrites it (senders' clocks are monotone, so the stored
    /// estimate is fresher).
    pub fn update(
        &mut self,
        neighbor_id: u32,
        send_time_s: f64,
        recv_time_s: f64,
        pose: Position,
        velocity: Velocity,
    ) {
        if let Some(existing) = self.neighbors.get(&neighbor_id) {
            if existing.send_time_s > send_time_s {
                return;
            }
        }
        self.neighbors.insert(
            neighbor_id,
            NeighborEstimate {
                pose,
                velocity,
                send_time_s,
                update_time_s: recv_time_s,
            },
        );
    }

    /// Predict a neighbor's pose at `t_query_s`.
    ///
    /// Within `max_age` the estimate extrapolates at the last known
    /// velocity; past it the last pose is returned frozen with confidence 0.
    pub fn predict(&self, neighbor_id: u32, t_query_s: f64) -> Option<NeighborPrediction> {
        let estimate = self.neighbors.get(&neighbor_id)?;
        let age = (t_query_s - estimate.update_time_s).max(0.0);

        if age > self.params.max_age_s {
            return Some(NeighborPrediction {
                neighbor_id,
                pose: estimate.pose,
                confidence: 0.0,
            });
        }

        let pose = Position::new(
            estimate.pose.x + estimate.velocity.x * age,
            estimate.pose.y + estimate.velocity.y * age,
            estimate.pose.z + estimate.velocity.z * age,
        );
        let confidence = 1.0 - OBSERVER_CONFIDENCE_DROP * (age / self.params.max_age_s).min(1.0);
        Some(NeighborPrediction {
            neighbor_id,
            pose,
            confidence,
        })
    }

    /// Neighbors predicted within `s_min` of `own_pose` with usable
    /// confidence. Missing or fully expired neighbors simply drop out;
    /// this never fails.
    pub fn collision_risks(
        &self,
        t_query_s: f64,
        own_pose: Position,
        s_min_m: f64,
    ) -> Vec<NeighborPrediction> {
        self.neighbors
            .keys()
            .filter_map(|&id| self.predict(id, t_query_s))
            .filter(|p| {
                p.confidence > self.params.min_confidence
                    && own_pose.range_to(&p.pose) < s_min_m
            })
            .collect()
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn estimate(&self, neighbor_id: u32) -> Option<&NeighborEstimate> {
        self.neighbors.get(&neighbor_id)
    }
}
