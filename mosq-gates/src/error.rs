//! Error types for gate lookup

use thiserror::Error;

/// Errors raised while resolving a gate record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Name absent from the dispatch table
    #[error("Invalid gate instruction '{name}'")]
    UnknownGate { name: String },

    /// Too few numeric parameters for the gate
    #[error("Gate '{gate}' expects {expected} parameters, got {actual}")]
    MissingParameter {
        gate: String,
        expected: usize,
        actual: usize,
    },

    /// Gate needs a string parameter (Pauli label) that is absent
    #[error("Gate '{gate}' expects a string parameter")]
    MissingLabel { gate: String },
}

/// Result type for gate lookup
pub type Result<T> = std::result::Result<T, GateError>;
