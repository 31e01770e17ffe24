//! Error types for the simulator

use mosq_gates::GateError;
use mosq_state::StateError;
use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Errors that can occur during simulation
///
/// Every error aborts the current shot; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulatorError {
    /// Operation or gate name the simulator does not know
    #[error("Invalid instruction '{name}'")]
    InvalidInstruction { name: String },

    /// Operation applied to a qubit list or payload of the wrong shape
    #[error("Invalid {op} operation: {reason}")]
    ShapeMismatch { op: String, reason: String },

    /// Qubit count does not match a matrix or vector size
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure inside the amplitude store
    #[error(transparent)]
    State(#[from] StateError),

    /// Failure resolving a gate record
    #[error(transparent)]
    Gate(#[from] GateError),

    /// A shot was aborted by one of the errors above
    #[error("Shot {shot} aborted: {source}")]
    Aborted {
        shot: usize,
        #[source]
        source: Box<SimulatorError>,
    },
}

impl SimulatorError {
    pub(crate) fn shape(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            op: op.into(),
            reason: reason.into(),
        }
    }
}
