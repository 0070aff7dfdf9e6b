//! Error types for the simulation kernel and configuration loading.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
/// Any of these terminates the process with exit code 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field holds a value outside its allowed range.
    #[error("invalid config: {field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised by kernel operations.
///
/// All variants except `InvariantViolation` are boundary rejections: the
/// operation is refused and kernel state is untouched. `InvariantViolation`
/// is fatal; the kernel refuses to continue and the process exits with
/// code 2.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A drone with this id is already registered.
    #[error("duplicate drone id {0}")]
    DuplicateId(u32),

    /// Drone ids must be positive integers.
    #[error("invalid drone id {0}: ids must be >= 1")]
    InvalidDroneId(u32),

    /// No drone with this id is registered.
    #[error("unknown drone id {0}")]
    UnknownDrone(u32),

    /// World coordinates fall outside the fire grid.
    #[error("coordinates ({x:.1}, {y:.1}) are outside the fire grid")]
    OutOfBounds { x: f64, y: f64 },

    /// `step` requires a strictly positive time delta.
    #[error("step requires dt > 0, got {0}")]
    NegativeDt(f64),

    /// An externally supplied value failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A kernel invariant no longer holds. Fatal.
    #[error("kernel invariant violated: {0}")]
    InvariantViolation(String),
}

impl KernelError {
    /// Whether this error is fatal to the kernel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KernelError::InvariantViolation(_))
    }
}
