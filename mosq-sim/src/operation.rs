//! Operation records consumed by the simulator

use crate::error::{Result, SimulatorError};
use crate::result::SaveType;
use mosq_state::CMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Kind of an operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Gate,
    Measure,
    Reset,
    Initialize,
    Barrier,
    Nop,
    Matrix,
    DiagonalMatrix,
    Multiplexer,
    Kraus,
    SetStatevec,
    SaveExpval,
    SaveExpvalVar,
    SaveProbs,
    SaveProbsKet,
    SaveAmps,
    SaveAmpsSq,
    SaveState,
    SaveStatevec,
    SaveStatevecDict,
    SaveDensmat,
}

impl OpType {
    const ALL: [OpType; 21] = [
        OpType::Gate,
        OpType::Measure,
        OpType::Reset,
        OpType::Initialize,
        OpType::Barrier,
        OpType::Nop,
        OpType::Matrix,
        OpType::DiagonalMatrix,
        OpType::Multiplexer,
        OpType::Kraus,
        OpType::SetStatevec,
        OpType::SaveExpval,
        OpType::SaveExpvalVar,
        OpType::SaveProbs,
        OpType::SaveProbsKet,
        OpType::SaveAmps,
        OpType::SaveAmpsSq,
        OpType::SaveState,
        OpType::SaveStatevec,
        OpType::SaveStatevecDict,
        OpType::SaveDensmat,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            OpType::Gate => "gate",
            OpType::Measure => "measure",
            OpType::Reset => "reset",
            OpType::Initialize => "initialize",
            OpType::Barrier => "barrier",
            OpType::Nop => "nop",
            OpType::Matrix => "matrix",
            OpType::DiagonalMatrix => "diagonal_matrix",
            OpType::Multiplexer => "multiplexer",
            OpType::Kraus => "kraus",
            OpType::SetStatevec => "set_statevec",
            OpType::SaveExpval => "save_expval",
            OpType::SaveExpvalVar => "save_expval_var",
            OpType::SaveProbs => "save_probs",
            OpType::SaveProbsKet => "save_probs_ket",
            OpType::SaveAmps => "save_amps",
            OpType::SaveAmpsSq => "save_amps_sq",
            OpType::SaveState => "save_state",
            OpType::SaveStatevec => "save_statevec",
            OpType::SaveStatevecDict => "save_statevec_dict",
            OpType::SaveDensmat => "save_densmat",
        }
    }

    /// Parse a kind name; anything unknown is an invalid instruction
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| SimulatorError::InvalidInstruction {
                name: name.to_string(),
            })
    }

    pub const fn is_save(self) -> bool {
        matches!(
            self,
            OpType::SaveExpval
                | OpType::SaveExpvalVar
                | OpType::SaveProbs
                | OpType::SaveProbsKet
                | OpType::SaveAmps
                | OpType::SaveAmpsSq
                | OpType::SaveState
                | OpType::SaveStatevec
                | OpType::SaveStatevecDict
                | OpType::SaveDensmat
        )
    }
}

/// One Pauli term of an observable
///
/// `coeff` weights the term in the expectation value and `sq_coeff` in the
/// expectation value of the squared observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpvalTerm {
    pub pauli: String,
    pub coeff: f64,
    #[serde(default)]
    pub sq_coeff: f64,
}

/// Immutable operation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    #[serde(rename = "type")]
    pub op_type: OpType,
    /// Gate name for `gate`, free label otherwise
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qubits: Vec<usize>,
    /// Real gate parameters
    #[serde(default)]
    pub params: Vec<f64>,
    /// Prepared state for `initialize` / `set_statevec`, diagonal for `diagonal_matrix`
    #[serde(default)]
    pub complex_params: Vec<Complex64>,
    /// Pauli label of the `pauli` gate
    #[serde(default)]
    pub string_params: Vec<String>,
    /// Basis indices read by `save_amps` / `save_amps_sq`
    #[serde(default)]
    pub int_params: Vec<u64>,
    #[serde(default)]
    pub expval_params: Vec<ExpvalTerm>,
    /// Matrix, Kraus operators, or multiplexer blocks
    #[serde(default)]
    pub mats: Vec<CMatrix>,
    /// Multiplexer register split: `[controls, targets]`
    #[serde(default)]
    pub regs: Vec<Vec<usize>>,
    #[serde(default)]
    pub memory: Vec<usize>,
    #[serde(default)]
    pub registers: Vec<usize>,
    /// Result key of a save
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub save_type: SaveType,
}

impl Op {
    fn new(op_type: OpType, name: impl Into<String>, qubits: Vec<usize>) -> Self {
        Self {
            op_type,
            name: name.into(),
            qubits,
            params: Vec::new(),
            complex_params: Vec::new(),
            string_params: Vec::new(),
            int_params: Vec::new(),
            expval_params: Vec::new(),
            mats: Vec::new(),
            regs: Vec::new(),
            memory: Vec::new(),
            registers: Vec::new(),
            key: String::new(),
            save_type: SaveType::default(),
        }
    }

    /// Named gate; controls precede the target in `qubits`
    pub fn gate(name: &str, qubits: &[usize], params: &[f64]) -> Self {
        let mut op = Self::new(OpType::Gate, name, qubits.to_vec());
        op.params = params.to_vec();
        op
    }

    /// Pauli string gate; the last label character acts on `qubits[0]`
    pub fn pauli(qubits: &[usize], label: &str) -> Self {
        let mut op = Self::new(OpType::Gate, "pauli", qubits.to_vec());
        op.string_params = vec![label.to_string()];
        op
    }

    /// Measure `qubits`, storing bit `i` into `memory[i]` and `registers[i]`
    pub fn measure(qubits: &[usize], memory: &[usize], registers: &[usize]) -> Self {
        let mut op = Self::new(OpType::Measure, "measure", qubits.to_vec());
        op.memory = memory.to_vec();
        op.registers = registers.to_vec();
        op
    }

    pub fn reset(qubits: &[usize]) -> Self {
        Self::new(OpType::Reset, "reset", qubits.to_vec())
    }

    pub fn barrier(qubits: &[usize]) -> Self {
        Self::new(OpType::Barrier, "barrier", qubits.to_vec())
    }

    pub fn initialize(qubits: &[usize], state: &[Complex64]) -> Self {
        let mut op = Self::new(OpType::Initialize, "initialize", qubits.to_vec());
        op.complex_params = state.to_vec();
        op
    }

    pub fn set_statevec(state: &[Complex64]) -> Self {
        let mut op = Self::new(OpType::SetStatevec, "set_statevec", Vec::new());
        op.complex_params = state.to_vec();
        op
    }

    pub fn matrix(qubits: &[usize], mat: CMatrix) -> Self {
        let mut op = Self::new(OpType::Matrix, "unitary", qubits.to_vec());
        op.mats = vec![mat];
        op
    }

    pub fn diagonal_matrix(qubits: &[usize], diag: &[Complex64]) -> Self {
        let mut op = Self::new(OpType::DiagonalMatrix, "diagonal", qubits.to_vec());
        op.complex_params = diag.to_vec();
        op
    }

    /// One block in `mats` per control basis state
    pub fn multiplexer(controls: &[usize], targets: &[usize], mats: Vec<CMatrix>) -> Self {
        let qubits = controls.iter().chain(targets).copied().collect();
        let mut op = Self::new(OpType::Multiplexer, "multiplexer", qubits);
        op.regs = vec![controls.to_vec(), targets.to_vec()];
        op.mats = mats;
        op
    }

    pub fn kraus(qubits: &[usize], mats: Vec<CMatrix>) -> Self {
        let mut op = Self::new(OpType::Kraus, "kraus", qubits.to_vec());
        op.mats = mats;
        op
    }

    /// Save instruction of the given kind
    pub fn save(op_type: OpType, qubits: &[usize], key: &str, save_type: SaveType) -> Self {
        let mut op = Self::new(op_type, op_type.name(), qubits.to_vec());
        op.key = key.to_string();
        op.save_type = save_type;
        op
    }

    pub fn save_expval(
        qubits: &[usize],
        key: &str,
        terms: Vec<ExpvalTerm>,
        variance: bool,
        save_type: SaveType,
    ) -> Self {
        let kind = if variance {
            OpType::SaveExpvalVar
        } else {
            OpType::SaveExpval
        };
        let mut op = Self::save(kind, qubits, key, save_type);
        op.expval_params = terms;
        op
    }

    pub fn save_amps(
        qubits: &[usize],
        key: &str,
        indices: &[u64],
        squared: bool,
        save_type: SaveType,
    ) -> Self {
        let kind = if squared {
            OpType::SaveAmpsSq
        } else {
            OpType::SaveAmps
        };
        let mut op = Self::save(kind, qubits, key, save_type);
        op.int_params = indices.to_vec();
        op
    }

    /// Label used for telemetry
    pub fn label(&self) -> String {
        match self.op_type {
            OpType::Gate => self.name.clone(),
            OpType::Matrix => format!("fused_{}", self.qubits.len()),
            OpType::DiagonalMatrix => "diagonal".to_string(),
            other => other.name().to_string(),
        }
    }
}

/// Operations of one experiment plus its register sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub num_qubits: usize,
    #[serde(default)]
    pub num_memory: usize,
    #[serde(default)]
    pub num_registers: usize,
    pub ops: Vec<Op>,
}

/// Whether `qubits` is `0..num_qubits` in natural order
pub fn is_full_register(qubits: &[usize], num_qubits: usize) -> bool {
    qubits.len() == num_qubits && qubits.iter().enumerate().all(|(i, &q)| i == q)
}

impl Circuit {
    pub fn new(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            num_memory: 0,
            num_registers: 0,
            ops: Vec::new(),
        }
    }

    pub fn with_memory(mut self, num_memory: usize) -> Self {
        self.num_memory = num_memory;
        self
    }

    pub fn with_registers(mut self, num_registers: usize) -> Self {
        self.num_registers = num_registers;
        self
    }

    pub fn push(&mut self, op: Op) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Position of the first measurement when every later operation is a
    /// measurement or barrier and no earlier one is stochastic
    ///
    /// Such circuits can evolve once and sample every shot from the final
    /// state.
    pub fn sampling_start(&self) -> Option<usize> {
        let first = self
            .ops
            .iter()
            .position(|op| op.op_type == OpType::Measure)?;
        let prefix_ok = self.ops[..first].iter().all(|op| match op.op_type {
            OpType::Reset | OpType::Kraus => false,
            // a partial initialize resets its subset first
            OpType::Initialize => is_full_register(&op.qubits, self.num_qubits),
            other => !other.is_save(),
        });
        let tail_ok = self.ops[first..]
            .iter()
            .all(|op| matches!(op.op_type, OpType::Measure | OpType::Barrier | OpType::Nop));
        (prefix_ok && tail_ok).then_some(first)
    }
}
