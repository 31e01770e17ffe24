//! Error types for statevector operations

use thiserror::Error;

/// Errors that can occur during statevector operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Invalid qubit index
    #[error("Invalid qubit index {index} for {num_qubits}-qubit state")]
    InvalidQubitIndex { index: usize, num_qubits: usize },

    /// The same qubit appears twice in one subset
    #[error("Duplicate qubit {0} in qubit subset")]
    DuplicateQubit(usize),

    /// Qubit count exceeds what the index arithmetic or allocator supports
    #[error("Too many qubits: {requested} requested, at most {max} supported")]
    TooManyQubits { requested: usize, max: usize },

    /// Invalid state dimension
    #[error("Invalid state dimension {dimension}, expected power of 2")]
    InvalidDimension { dimension: usize },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Memory allocation error
    #[error("Failed to allocate {size} bytes for state vector")]
    AllocationError { size: usize },

    /// Pauli label contains something other than I, X, Y, Z or has the wrong length
    #[error("Invalid Pauli label '{label}' for {num_qubits} qubits")]
    InvalidPauli { label: String, num_qubits: usize },

    /// Bit masks of a fused Pauli rotation overlap or leave the declared qubits
    #[error("Invalid Pauli masks x={x:#x} y={y:#x} z={z:#x}: {reason}")]
    InvalidMasks {
        x: u64,
        y: u64,
        z: u64,
        reason: String,
    },

    /// Operation needs more qubits than were given
    #[error("Operation needs at least {required} qubits, got {actual}")]
    SubsetTooSmall { required: usize, actual: usize },

    /// Amplitude index outside the vector
    #[error("Index {index} out of range for vector of size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    /// Collapse onto an outcome that has no weight
    #[error("Cannot renormalize onto outcome {outcome} with probability {probability}")]
    ZeroProbability { outcome: u64, probability: f64 },
}

/// Result type for statevector operations
pub type Result<T> = std::result::Result<T, StateError>;
