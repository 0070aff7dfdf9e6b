//! Core types and definitions for the emberswarm simulation.
//!
//! This crate defines the vocabulary shared across all other crates:
//! geometric types, components, commands, messages, state snapshots,
//! configuration, errors, and constants. It has no dependency on the
//! ECS runtime or any I/O framework.

pub mod commands;
pub mod components;
pub mod config;
pub mod constants;
pub mod enums;
pub mod error;
pub mod messages;
pub mod state;
pub mod types;
