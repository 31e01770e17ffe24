//! Gate name dispatch table
//!
//! Every accepted instruction name resolves once, through a process-wide
//! immutable map, to a [`Gate`] variant. Many names share a variant: `cx`,
//! `ccx` and `mcx` are all [`Gate::Mcx`] and differ only in the length of
//! their qubit list (controls first, target last).
//!
//! # Example
//!
//! ```
//! use mosq_gates::{Gate, GateCategory};
//!
//! let gate = Gate::from_name("ccx").unwrap();
//! assert_eq!(gate, Gate::Mcx);
//! assert_eq!(gate.category(), GateCategory::Unitary);
//! assert!(Gate::from_name("frobnicate").is_err());
//! ```

use crate::error::{GateError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Resolved gate kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// `id`, `delay`
    Id,
    H,
    S,
    Sdg,
    T,
    Tdg,
    /// `H+S`
    Hs,
    /// `SDG+H`
    Sdgh,
    Ecr,
    Rxx,
    Ryy,
    Rzz,
    Rzx,
    Mcx,
    Mcy,
    /// Multi-controlled phase of -1
    Mcz,
    Mcr,
    Mcrx,
    Mcry,
    Mcrz,
    Mcp,
    Mcu2,
    Mcu3,
    /// U3 plus a global phase parameter
    Mcu,
    Mcswap,
    Mcsx,
    Mcsxdg,
    Pauli,
    /// Fused parity-diagonal
    Mosq,
    /// Fused paired rotation
    MosqCr,
}

/// Code path a gate takes through the amplitude store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateCategory {
    Identity,
    /// Single-qubit diagonal `[1, phase]`
    DiagonalPhase,
    /// Pauli rotation by one real angle
    Rotation,
    /// Dense (multi-controlled) unitary
    Unitary,
    Swap,
    Pauli,
    Mosq,
    MosqCr,
}

static GATE_TABLE: Lazy<HashMap<&'static str, Gate>> = Lazy::new(|| {
    use Gate::*;
    HashMap::from([
        // Identity-class
        ("id", Id),
        ("delay", Id),
        // Single-qubit
        ("x", Mcx),
        ("y", Mcy),
        ("z", Mcz),
        ("h", H),
        ("s", S),
        ("sdg", Sdg),
        ("t", T),
        ("tdg", Tdg),
        ("p", Mcp),
        ("sx", Mcsx),
        ("sxdg", Mcsxdg),
        ("H+S", Hs),
        ("SDG+H", Sdgh),
        ("r", Mcr),
        ("rx", Mcrx),
        ("ry", Mcry),
        ("rz", Mcrz),
        ("u1", Mcp),
        ("u2", Mcu2),
        ("u3", Mcu3),
        ("u", Mcu3),
        ("U", Mcu3),
        // Two-qubit
        ("CX", Mcx),
        ("cx", Mcx),
        ("cy", Mcy),
        ("cz", Mcz),
        ("cp", Mcp),
        ("cu1", Mcp),
        ("cu2", Mcu2),
        ("cu3", Mcu3),
        ("cu", Mcu),
        ("swap", Mcswap),
        ("rxx", Rxx),
        ("ryy", Ryy),
        ("rzz", Rzz),
        ("rzx", Rzx),
        ("csx", Mcsx),
        ("csxdg", Mcsxdg),
        ("ecr", Ecr),
        ("crx", Mcrx),
        ("cry", Mcry),
        ("crz", Mcrz),
        // Three-qubit
        ("ccx", Mcx),
        ("ccz", Mcz),
        ("cswap", Mcswap),
        // Multi-qubit controlled
        ("mcx", Mcx),
        ("mcy", Mcy),
        ("mcz", Mcz),
        ("mcr", Mcr),
        ("mcrx", Mcrx),
        ("mcry", Mcry),
        ("mcrz", Mcrz),
        ("mcphase", Mcp),
        ("mcp", Mcp),
        ("mcu1", Mcp),
        ("mcu2", Mcu2),
        ("mcu3", Mcu3),
        ("mcu", Mcu),
        ("mcswap", Mcswap),
        ("mcsx", Mcsx),
        ("mcsxdg", Mcsxdg),
        ("mcx_gray", Mcx),
        // Pauli string
        ("pauli", Pauli),
        // Fused kernels
        ("MOSQ", Mosq),
        ("MOSQ_CR", MosqCr),
    ])
});

impl Gate {
    /// Resolve an instruction name
    ///
    /// # Errors
    /// `UnknownGate` naming the offender when the name is not in the table.
    pub fn from_name(name: &str) -> Result<Self> {
        GATE_TABLE
            .get(name)
            .copied()
            .ok_or_else(|| GateError::UnknownGate {
                name: name.to_string(),
            })
    }

    /// Whether the table accepts `name`
    pub fn is_supported(name: &str) -> bool {
        GATE_TABLE.contains_key(name)
    }

    /// Every accepted instruction name, sorted
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = GATE_TABLE.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub const fn category(self) -> GateCategory {
        use Gate::*;
        match self {
            Id => GateCategory::Identity,
            S | Sdg | T | Tdg => GateCategory::DiagonalPhase,
            Rxx | Ryy | Rzz | Rzx | Mcrx | Mcry | Mcrz => GateCategory::Rotation,
            H | Hs | Sdgh | Ecr | Mcx | Mcy | Mcz | Mcr | Mcp | Mcu2 | Mcu3 | Mcu | Mcsx
            | Mcsxdg => GateCategory::Unitary,
            Mcswap => GateCategory::Swap,
            Pauli => GateCategory::Pauli,
            Mosq => GateCategory::Mosq,
            MosqCr => GateCategory::MosqCr,
        }
    }

    /// Number of real parameters the gate reads
    pub const fn num_params(self) -> usize {
        use Gate::*;
        match self {
            Rxx | Ryy | Rzz | Rzx | Mcrx | Mcry | Mcrz | Mcp | Mosq => 1,
            Mcr | Mcu2 => 2,
            Mcu3 => 3,
            Mcu | MosqCr => 4,
            _ => 0,
        }
    }

    /// Check that `params` carries enough values for this gate
    pub fn check_params(self, name: &str, params: &[f64]) -> Result<()> {
        if params.len() < self.num_params() {
            return Err(GateError::MissingParameter {
                gate: name.to_string(),
                expected: self.num_params(),
                actual: params.len(),
            });
        }
        Ok(())
    }
}
