//! Per-tick simulation systems, one module per phase of the tick order:
//! fire (in emberswarm-fire), control, channel update, messaging, energy,
//! metrics, snapshot.

pub mod channel_update;
pub mod control;
pub mod energy;
pub mod messaging;
pub mod metrics;
pub mod snapshot;
