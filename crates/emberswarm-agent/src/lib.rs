//! Per-vehicle behavior for the emberswarm simulation.
//!
//! Pure data structures and functions with no ECS dependency: the behavior
//! state machine, the dynamic event-triggered messaging controller, the
//! distributed neighbor observer, and the Lévy-flight search walker. The
//! engine composes these into per-drone agent runtimes.

pub mod etm;
pub mod fsm;
pub mod levy;
pub mod observer;

pub use etm::{EtmController, EtmDecision, EtmParams};
pub use fsm::{evaluate, DroneAction, DroneContext, DroneUpdate, FlightLimits};
pub use levy::LevyWalker;
pub use observer::{NeighborObserver, NeighborPrediction, ObserverParams};

#[cfg(test)]
mod tests;
