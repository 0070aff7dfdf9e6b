//! Headless application shell around the simulation kernel.
//!
//! Runs the kernel on its own thread behind two narrow seams: a bounded
//! command inbox drained at each tick boundary, and a latest-only snapshot
//! outbox. External surfaces (the HTTP/WebSocket monitors, the flight
//! controller launcher) attach to these seams; they are collaborators
//! outside this crate.

pub mod launcher;
pub mod sim_loop;
pub mod state;

pub use state::{AppState, SimLoopCommand};
