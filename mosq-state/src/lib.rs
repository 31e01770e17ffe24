//! Dense statevector storage with parallel bit-indexed kernels
//!
//! This crate holds the numeric core of the simulator:
//!
//! - **Index generation** (`indexes`): expands a compressed index into the
//!   amplitude positions a qubit subset touches
//! - **Kernel runner** (`parallel`): full-range, subset-indexed, odd-parity and
//!   paired-index iteration with optional rayon fan-out and reductions
//! - **Amplitude store** (`qubit_vector`): gate, measurement and readout
//!   primitives, including the fused `MOSQ` parity-diagonal and the fused
//!   `MOSQ_CR` paired rotation
//!
//! # Example
//!
//! ```
//! use mosq_state::{CMatrix, QubitVector};
//! use num_complex::Complex64;
//!
//! let h = std::f64::consts::FRAC_1_SQRT_2;
//! let hadamard = CMatrix::from_array(&[
//!     [Complex64::new(h, 0.0), Complex64::new(h, 0.0)],
//!     [Complex64::new(h, 0.0), Complex64::new(-h, 0.0)],
//! ]);
//!
//! let mut qv = QubitVector::new(2).unwrap();
//! qv.apply_matrix(&[0], &hadamard).unwrap();
//! qv.apply_mcx(&[0, 1]).unwrap();
//!
//! let probs = qv.probabilities_of(&[0, 1]).unwrap();
//! assert!((probs[0] - 0.5).abs() < 1e-12);
//! assert!((probs[3] - 0.5).abs() < 1e-12);
//! ```

pub mod error;
pub mod indexes;
pub mod matrix;
pub mod parallel;
pub mod qubit_vector;

pub use error::{Result, StateError};
pub use indexes::PauliMasks;
pub use matrix::{CMatrix, Matrix2, Rotation};
pub use qubit_vector::QubitVector;
