//! Gate dispatch for the MOSQ statevector simulator
//!
//! This crate resolves instruction names to a closed set of gate kinds and
//! provides the matrices those kinds are built from.
//!
//! # Features
//!
//! - **Static dispatch table**: a process-wide immutable `name → Gate` map built
//!   on first use; unknown names are reported with the offending name
//! - **Categories**: every gate maps to one code path (identity, diagonal
//!   phase, rotation, dense unitary, swap, Pauli string, or one of the two
//!   fused kernels)
//! - **Standard matrices**: U3/U4, R, SX, SX†, ECR and the fused Clifford
//!   pairs `H+S` / `SDG+H`
//!
//! # Example
//!
//! ```
//! use mosq_gates::{matrices, Gate, GateCategory};
//!
//! assert_eq!(Gate::from_name("MOSQ_CR").unwrap().category(), GateCategory::MosqCr);
//! let u = matrices::u3(std::f64::consts::PI, 0.0, std::f64::consts::PI);
//! assert!((u[0][1].re - 1.0).abs() < 1e-12);
//! ```

pub mod error;
pub mod gate_table;
pub mod matrices;

pub use error::{GateError, Result};
pub use gate_table::{Gate, GateCategory};
