//! Dynamic event-triggered messaging controller.
//!
//! Gates telemetry broadcasts on a threshold that decays exponentially with
//! time since the last transmission: long silences make the trigger easier,
//! so updates resume promptly when a vehicle starts moving again.

use tracing::debug;

use emberswarm_core::enums::EtmNorm;
use emberswarm_core::types::Position;

/// Trigger-law parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtmParams {
    /// Initial threshold (meters).
    pub eta0_m: f64,
    /// Exponential decay rate (1/s).
    pub lambda_per_s: f64,
    /// Threshold floor preventing underflow during long silences.
    pub eta_min_m: f64,
    pub norm: EtmNorm,
}

/// One trigger evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtmDecision {
    pub transmit: bool,
    pub threshold_m: f64,
    pub error_m: f64,
}

/// Per-drone event-trigger state.
#[derive(Debug, Clone)]
pub struct EtmController {
    params: EtmParams,
    last_tx_pose: Option<Position>,
    last_tx_time_s: f64,
    total_transmissions: u64,
    total_suppressed: u64,
    /// Last evaluation, keyed by simulated time. Re-evaluating at the same
    /// instant returns this decision without recounting.
    last_eval: Option<(f64, EtmDecision)>,
}

impl EtmController {
    pub fn new(params: EtmParams) -> Self {
        Self {
            params,
            last_tx_pose: None,
            last_tx_time_s: 0.0,
            total_transmissions: 0,
            total_suppressed: 0,
            last_eval: None,
        }
    }

    /// Current threshold for a given silence duration.
    pub fn threshold(&self, dt_since_tx_s: f64) -> f64 {
        (self.params.eta0_m * (-self.params.lambda_per_s * dt_since_tx_s).exp())
            .max(self.params.eta_min_m)
    }

    /// Decide whether to transmit at `now_s` from `pose`.
    ///
    /// Transmits if the vehicle has never transmitted, or if the pose error
    /// since the last transmission exceeds the decayed threshold. Idempotent
    /// within a single simulated instant.
    pub fn decide(&mut self, now_s: f64, pose: Position) -> EtmDecision {
        if let Some((eval_time, decision)) = self.last_eval {
            if eval_time == now_s {
                return decision;
            }
        }

        let decision = match self.last_tx_pose {
            None => EtmDecision {
                transmit: true,
                threshold_m: self.threshold(0.0),
                error_m: f64::INFINITY,
            },
            Some(last_pose) => {
                let threshold_m = self.threshold((now_s - self.last_tx_time_s).max(0.0));
                let error_m = match self.params.norm {
                    EtmNorm::L2 => pose.range_to(&last_pose),
                    EtmNorm::LInf => {
                        let dx = (pose.x - last_pose.x).abs();
                        let dy = (pose.y - last_pose.y).abs();
                        let dz = (pose.z - last_pose.z).abs();
                        dx.max(dy).max(dz)
                    }
                };
                EtmDecision {
                    transmit: error_m > threshold_m,
                    threshold_m,
                    error_m,
                }
            }
        };

        if decision.transmit {
            debug!(
                error_m = decision.error_m,
                threshold_m = decision.threshold_m,
                "etm trigger fired"
            );
        } else {
            self.total_suppressed += 1;
        }
        self.last_eval = Some((now_s, decision));
        decision
    }

    /// Record that a transmission went out at `now_s` from `pose`.
    pub fn record_transmission(&mut self, now_s: f64, pose: Position) {
        self.last_tx_pose = Some(pose);
        self.last_tx_time_s = now_s;
        self.total_transmissions += 1;
    }

    /// Hot-reload the threshold law. Counters and last-transmission state
    /// are preserved.
    pub fn set_params(&mut self, eta0_m: f64, lambda_per_s: f64) {
        self.params.eta0_m = eta0_m;
        self.params.lambda_per_s = lambda_per_s;
        self.last_eval = None;
    }

    pub fn params(&self) -> EtmParams {
        self.params
    }

    pub fn total_transmissions(&self) -> u64 {
        self.total_transmissions
    }

    pub fn total_suppressed(&self) -> u64 {
        self.total_suppressed
    }

    pub fn last_broadcast_pose(&self) -> Option<Position> {
        self.last_tx_pose
    }

    pub fn last_broadcast_time_s(&self) -> Option<f64> {
        self.last_tx_pose.map(|_| self.last_tx_time_s)
    }
}
