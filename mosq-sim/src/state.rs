//! Per-shot quantum state orchestrator
//!
//! [`State`] owns the amplitude store and classical register of one
//! simulation session and applies operation records to them: gates through
//! the dispatch table, measurement and reset by projective collapse, Kraus
//! channels by stochastic operator selection, and saves into an
//! [`ExperimentResult`].

use crate::config::SimulatorConfig;
use crate::creg::ClassicalRegister;
use crate::error::{Result, SimulatorError};
use crate::operation::{is_full_register, Op, OpType};
use crate::result::{ExperimentResult, SavedValue};
use crate::telemetry::ExecutionTelemetry;
use mosq_gates::matrices::{self, PHASE_S, PHASE_SDG, PHASE_T, PHASE_TDG};
use mosq_gates::{Gate, GateError};
use mosq_state::indexes::check_qubits;
use mosq_state::{CMatrix, PauliMasks, QubitVector, Rotation, StateError};
use num_complex::Complex64;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

const ONE: Complex64 = Complex64::new(1.0, 0.0);
const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const DIAGONAL_TOLERANCE: f64 = 1e-12;

/// Amplitude store plus classical bits of one session
#[derive(Debug)]
pub struct State {
    qreg: QubitVector,
    creg: ClassicalRegister,
    global_phase: Option<Complex64>,
    telemetry: Option<ExecutionTelemetry>,
}

impl State {
    /// Allocate `num_qubits` in |0…0⟩ with the configured global phase
    pub fn new(
        num_qubits: usize,
        num_memory: usize,
        num_registers: usize,
        config: &SimulatorConfig,
    ) -> Result<Self> {
        let mut qreg = QubitVector::new(num_qubits)?;
        qreg.set_threads(config.effective_threads());
        qreg.set_parallel_threshold(config.parallel_threshold);
        qreg.set_zero_threshold(config.zero_threshold);
        qreg.set_sample_measure_index_size(config.sample_measure_index_size);

        let global_phase =
            (config.global_phase != 0.0).then(|| Complex64::from_polar(1.0, config.global_phase));
        let mut state = Self {
            qreg,
            creg: ClassicalRegister::new(num_memory, num_registers),
            global_phase,
            telemetry: config.collect_statistics.then(ExecutionTelemetry::new),
        };
        state.initialize_qreg()?;
        Ok(state)
    }

    /// Return to |0…0⟩ and apply the global phase
    pub fn initialize_qreg(&mut self) -> Result<()> {
        self.qreg.initialize();
        if let Some(phase) = self.global_phase {
            self.qreg.apply_diagonal_matrix(&[], &[phase])?;
        }
        Ok(())
    }

    /// Clear the classical bits before a new shot
    pub fn reset_creg(&mut self) {
        self.creg = ClassicalRegister::new(self.creg.memory().len(), self.creg.registers().len());
    }

    pub fn qreg(&self) -> &QubitVector {
        &self.qreg
    }

    pub fn creg(&self) -> &ClassicalRegister {
        &self.creg
    }

    pub fn telemetry(&self) -> Option<&ExecutionTelemetry> {
        self.telemetry.as_ref()
    }

    pub fn take_telemetry(&mut self) -> Option<ExecutionTelemetry> {
        self.telemetry.take()
    }

    /// Apply a sequence of operations in order
    ///
    /// With `final_ops` set, the last operation may consume the amplitude
    /// buffer (a full statevector save moves instead of copying).
    pub fn apply_ops<R: Rng + ?Sized>(
        &mut self,
        ops: &[Op],
        result: &mut ExperimentResult,
        rng: &mut R,
        final_ops: bool,
    ) -> Result<()> {
        let last = ops.len().saturating_sub(1);
        for (i, op) in ops.iter().enumerate() {
            self.apply_op(op, result, rng, final_ops && i == last)?;
        }
        Ok(())
    }

    /// Apply one operation, recording its time when telemetry is enabled
    pub fn apply_op<R: Rng + ?Sized>(
        &mut self,
        op: &Op,
        result: &mut ExperimentResult,
        rng: &mut R,
        final_op: bool,
    ) -> Result<()> {
        let start = self.telemetry.is_some().then(Instant::now);
        let outcome = self.dispatch(op, result, rng, final_op);
        if let (Some(telemetry), Some(start)) = (self.telemetry.as_mut(), start) {
            match &outcome {
                Ok(()) => telemetry.record(&op.label(), start.elapsed()),
                Err(err) => telemetry.log_error(format!("{}: {err}", op.label())),
            }
        }
        outcome
    }

    fn dispatch<R: Rng + ?Sized>(
        &mut self,
        op: &Op,
        result: &mut ExperimentResult,
        rng: &mut R,
        final_op: bool,
    ) -> Result<()> {
        match op.op_type {
            OpType::Barrier | OpType::Nop => Ok(()),
            OpType::Gate => self.apply_gate(op),
            OpType::Measure => self.apply_measure(&op.qubits, &op.memory, &op.registers, rng),
            OpType::Reset => self.apply_reset(&op.qubits, rng),
            OpType::Initialize => self.apply_initialize(&op.qubits, &op.complex_params, rng),
            OpType::SetStatevec => Ok(self.qreg.initialize_from_vector(&op.complex_params)?),
            OpType::Matrix => {
                let mat = op
                    .mats
                    .first()
                    .ok_or_else(|| SimulatorError::shape("matrix", "no matrix payload"))?;
                self.apply_matrix(&op.qubits, mat)
            }
            OpType::DiagonalMatrix => Ok(self
                .qreg
                .apply_diagonal_matrix(&op.qubits, &op.complex_params)?),
            OpType::Multiplexer => {
                let [controls, targets] = op.regs.as_slice() else {
                    return Err(SimulatorError::shape(
                        "multiplexer",
                        format!("expected control and target registers, got {}", op.regs.len()),
                    ));
                };
                Ok(self.qreg.apply_multiplexer(controls, targets, &op.mats)?)
            }
            OpType::Kraus => self.apply_kraus(&op.qubits, &op.mats, rng),
            OpType::SaveExpval | OpType::SaveExpvalVar => self.save_expval(op, result),
            OpType::SaveProbs | OpType::SaveProbsKet => self.save_probs(op, result),
            OpType::SaveAmps | OpType::SaveAmpsSq => self.save_amps(op, result),
            OpType::SaveState | OpType::SaveStatevec => self.save_statevec(op, result, final_op),
            OpType::SaveStatevecDict => {
                self.require_full_register(op)?;
                result.save(&op.key, SavedValue::Ket(self.qreg.vector_ket()), op.save_type)
            }
            OpType::SaveDensmat => {
                let rho = self.qreg.reduced_density_matrix(&op.qubits)?;
                result.save(&op.key, SavedValue::Matrix(rho), op.save_type)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Gates
    // ---------------------------------------------------------------------

    /// Resolve a gate record through the dispatch table and apply it
    pub fn apply_gate(&mut self, op: &Op) -> Result<()> {
        let gate = Gate::from_name(&op.name).map_err(|err| {
            warn!(gate = %op.name, "{err}");
            SimulatorError::InvalidInstruction {
                name: op.name.clone(),
            }
        })?;
        gate.check_params(&op.name, &op.params)?;
        let (qubits, p) = (op.qubits.as_slice(), op.params.as_slice());
        let qreg = &mut self.qreg;

        match gate {
            Gate::Id => check_qubits(qubits, qreg.num_qubits())?,
            Gate::H => qreg.apply_mcu(qubits, &matrices::hadamard())?,
            Gate::S => apply_phase(qreg, op, PHASE_S)?,
            Gate::Sdg => apply_phase(qreg, op, PHASE_SDG)?,
            Gate::T => apply_phase(qreg, op, PHASE_T)?,
            Gate::Tdg => apply_phase(qreg, op, PHASE_TDG)?,
            Gate::Hs => qreg.apply_mcu(qubits, &matrices::h_then_s())?,
            Gate::Sdgh => qreg.apply_mcu(qubits, &matrices::sdg_then_h())?,
            Gate::Ecr => qreg.apply_matrix(qubits, &matrices::ecr())?,
            Gate::Rxx => qreg.apply_rotation(qubits, Rotation::XX, p[0])?,
            Gate::Ryy => qreg.apply_rotation(qubits, Rotation::YY, p[0])?,
            Gate::Rzz => qreg.apply_rotation(qubits, Rotation::ZZ, p[0])?,
            Gate::Rzx => qreg.apply_rotation(qubits, Rotation::ZX, p[0])?,
            Gate::Mcx => qreg.apply_mcx(qubits)?,
            Gate::Mcy => qreg.apply_mcy(qubits)?,
            Gate::Mcz => qreg.apply_mcphase(qubits, -ONE)?,
            Gate::Mcr => qreg.apply_mcu(qubits, &matrices::r(p[0], p[1]))?,
            Gate::Mcrx => qreg.apply_rotation(qubits, Rotation::X, p[0])?,
            Gate::Mcry => qreg.apply_rotation(qubits, Rotation::Y, p[0])?,
            Gate::Mcrz => qreg.apply_rotation(qubits, Rotation::Z, p[0])?,
            Gate::Mcp => qreg.apply_mcphase(qubits, Complex64::from_polar(1.0, p[0]))?,
            Gate::Mcu2 => qreg.apply_mcu(
                qubits,
                &matrices::u3(std::f64::consts::FRAC_PI_2, p[0], p[1]),
            )?,
            Gate::Mcu3 => qreg.apply_mcu(qubits, &matrices::u3(p[0], p[1], p[2]))?,
            Gate::Mcu => qreg.apply_mcu(qubits, &matrices::u4(p[0], p[1], p[2], p[3]))?,
            Gate::Mcswap => qreg.apply_mcswap(qubits)?,
            Gate::Mcsx => qreg.apply_mcu(qubits, &matrices::SX)?,
            Gate::Mcsxdg => qreg.apply_mcu(qubits, &matrices::SXDG)?,
            Gate::Pauli => {
                let label = op.string_params.first().ok_or_else(|| GateError::MissingLabel {
                    gate: op.name.clone(),
                })?;
                qreg.apply_pauli(qubits, label)?;
            }
            Gate::Mosq => qreg.apply_mosq(qubits, Complex64::from_polar(1.0, p[0]))?,
            Gate::MosqCr => {
                let masks = PauliMasks::new(
                    decode_mask(&op.name, p[1])?,
                    decode_mask(&op.name, p[2])?,
                    decode_mask(&op.name, p[3])?,
                );
                qreg.apply_mosq_cr(qubits, Complex64::from_polar(1.0, p[0]), masks)?;
            }
        }
        Ok(())
    }

    /// Dense matrix, routed to the diagonal primitive when it has no off-diagonal terms
    pub fn apply_matrix(&mut self, qubits: &[usize], mat: &CMatrix) -> Result<()> {
        if mat.is_diagonal(DIAGONAL_TOLERANCE) {
            mat.check_square(qubits.len())?;
            self.qreg.apply_diagonal_matrix(qubits, &mat.diagonal())?;
        } else {
            self.qreg.apply_matrix(qubits, mat)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Measurement, reset and initialization
    // ---------------------------------------------------------------------

    /// Measure `qubits`, collapse, and store the outcome bits
    pub fn apply_measure<R: Rng + ?Sized>(
        &mut self,
        qubits: &[usize],
        memory: &[usize],
        registers: &[usize],
        rng: &mut R,
    ) -> Result<()> {
        let (outcome, probability) = self.sample_outcome(qubits, rng)?;
        self.collapse(qubits, outcome, outcome, probability)?;
        self.creg.store_measure(outcome as u64, memory, registers)
    }

    /// Measure `qubits` and rotate the observed outcome onto |0…0⟩
    pub fn apply_reset<R: Rng + ?Sized>(&mut self, qubits: &[usize], rng: &mut R) -> Result<()> {
        let (outcome, probability) = self.sample_outcome(qubits, rng)?;
        self.collapse(qubits, 0, outcome, probability)
    }

    fn sample_outcome<R: Rng + ?Sized>(
        &self,
        qubits: &[usize],
        rng: &mut R,
    ) -> Result<(usize, f64)> {
        let probs = self.qreg.probabilities_of(qubits)?;
        let dist = WeightedIndex::new(&probs).map_err(|_| StateError::ZeroProbability {
            outcome: 0,
            probability: 0.0,
        })?;
        let outcome = dist.sample(rng);
        Ok((outcome, probs[outcome]))
    }

    /// Project onto `measured`, then move it to `target` if they differ
    fn collapse(
        &mut self,
        qubits: &[usize],
        target: usize,
        measured: usize,
        probability: f64,
    ) -> Result<()> {
        if probability <= 0.0 {
            return Err(StateError::ZeroProbability {
                outcome: measured as u64,
                probability,
            }
            .into());
        }
        let mut diag = vec![ZERO; 1 << qubits.len()];
        diag[measured] = Complex64::new(1.0 / probability.sqrt(), 0.0);
        self.qreg.apply_diagonal_matrix(qubits, &diag)?;

        if target == measured {
            return Ok(());
        }
        if let [qubit] = qubits {
            self.qreg.apply_mcx(&[*qubit])?;
        } else {
            let dim = 1 << qubits.len();
            let mut perm = CMatrix::identity(dim);
            perm.set(target, target, ZERO);
            perm.set(measured, measured, ZERO);
            perm.set(target, measured, ONE);
            perm.set(measured, target, ONE);
            self.qreg.apply_matrix(qubits, &perm)?;
        }
        Ok(())
    }

    /// Load a prepared state into `qubits`
    ///
    /// A full register in natural order is overwritten directly; any other
    /// subset is reset first and the state tensored in.
    pub fn apply_initialize<R: Rng + ?Sized>(
        &mut self,
        qubits: &[usize],
        params: &[Complex64],
        rng: &mut R,
    ) -> Result<()> {
        if is_full_register(qubits, self.qreg.num_qubits()) {
            match self.global_phase {
                Some(phase) => {
                    let phased: Vec<Complex64> = params.iter().map(|&a| a * phase).collect();
                    self.qreg.initialize_from_vector(&phased)?;
                }
                None => self.qreg.initialize_from_vector(params)?,
            }
            return Ok(());
        }
        let expected = 1usize << qubits.len();
        if params.len() != expected {
            return Err(SimulatorError::DimensionMismatch {
                expected,
                actual: params.len(),
            });
        }
        // the reset keeps the phase already carried by the rest of the register
        self.apply_reset(qubits, rng)?;
        Ok(self.qreg.initialize_component(qubits, params)?)
    }

    /// Draw `shots` outcomes over `qubits` without collapsing the state
    ///
    /// Bit `i` of each returned value is the outcome of `qubits[i]`.
    pub fn sample_measure<R: Rng + ?Sized>(
        &self,
        qubits: &[usize],
        shots: usize,
        rng: &mut R,
    ) -> Result<Vec<u64>> {
        check_qubits(qubits, self.qreg.num_qubits())?;
        let rnds: Vec<f64> = (0..shots).map(|_| rng.gen()).collect();
        let samples = self.qreg.sample_measure(&rnds);
        Ok(samples
            .par_iter()
            .map(|&sample| {
                qubits
                    .iter()
                    .enumerate()
                    .fold(0u64, |acc, (i, &q)| acc | (((sample >> q) & 1) << i))
            })
            .collect())
    }

    // ---------------------------------------------------------------------
    // Noise
    // ---------------------------------------------------------------------

    /// Apply one operator of a Kraus channel, chosen with its induced weight
    pub fn apply_kraus<R: Rng + ?Sized>(
        &mut self,
        qubits: &[usize],
        mats: &[CMatrix],
        rng: &mut R,
    ) -> Result<()> {
        let Some((last, rest)) = mats.split_last() else {
            return Ok(());
        };
        let r: f64 = rng.gen();
        let mut accum = 0.0;
        for mat in rest {
            let p = self.qreg.norm_matrix(qubits, mat)?;
            accum += p;
            if accum > r {
                let renorm = Complex64::new(1.0 / p.sqrt(), 0.0);
                return Ok(self.qreg.apply_matrix(qubits, &mat.scale(renorm))?);
            }
        }

        let p = 1.0 - accum;
        debug!(remaining = p, "kraus: falling through to the last operator");
        if p <= 0.0 {
            return Err(StateError::ZeroProbability {
                outcome: rest.len() as u64,
                probability: p,
            }
            .into());
        }
        let renorm = Complex64::new(1.0 / p.sqrt(), 0.0);
        Ok(self.qreg.apply_matrix(qubits, &last.scale(renorm))?)
    }

    // ---------------------------------------------------------------------
    // Saves
    // ---------------------------------------------------------------------

    fn save_expval(&self, op: &Op, result: &mut ExperimentResult) -> Result<()> {
        let (mut expval, mut sq_expval) = (0.0, 0.0);
        for term in &op.expval_params {
            let value = self.qreg.expval_pauli(&op.qubits, &term.pauli)?;
            expval += term.coeff * value;
            sq_expval += term.sq_coeff * value;
        }
        let value = if op.op_type == OpType::SaveExpvalVar {
            SavedValue::Reals(vec![expval, sq_expval - expval * expval])
        } else {
            SavedValue::Real(expval)
        };
        result.save(&op.key, value, op.save_type)
    }

    fn save_probs(&self, op: &Op, result: &mut ExperimentResult) -> Result<()> {
        let probs = self.qreg.probabilities_of(&op.qubits)?;
        let value = if op.op_type == OpType::SaveProbsKet {
            let epsilon = self.qreg.zero_threshold();
            SavedValue::RealKet(
                probs
                    .into_iter()
                    .enumerate()
                    .filter(|&(_, p)| p > epsilon)
                    .map(|(k, p)| (format!("{k:#x}"), p))
                    .collect::<BTreeMap<_, _>>(),
            )
        } else {
            SavedValue::Reals(probs)
        };
        result.save(&op.key, value, op.save_type)
    }

    fn save_amps(&self, op: &Op, result: &mut ExperimentResult) -> Result<()> {
        let value = if op.op_type == OpType::SaveAmpsSq {
            let probs = op
                .int_params
                .iter()
                .map(|&k| self.qreg.probability(k))
                .collect::<mosq_state::Result<Vec<_>>>()?;
            SavedValue::Reals(probs)
        } else {
            let amps = op
                .int_params
                .iter()
                .map(|&k| self.qreg.amplitude(k))
                .collect::<mosq_state::Result<Vec<_>>>()?;
            SavedValue::Complexes(amps)
        };
        result.save(&op.key, value, op.save_type)
    }

    fn require_full_register(&self, op: &Op) -> Result<()> {
        let n = self.qreg.num_qubits();
        if op.qubits.len() != n {
            return Err(SimulatorError::shape(
                op.op_type.name(),
                format!(
                    "statevector saves need all {n} qubits, got a subset of {}",
                    op.qubits.len()
                ),
            ));
        }
        Ok(())
    }

    fn save_statevec(&mut self, op: &Op, result: &mut ExperimentResult, final_op: bool) -> Result<()> {
        self.require_full_register(op)?;
        let data = if final_op {
            let spent = QubitVector::new(0)?;
            std::mem::replace(&mut self.qreg, spent).move_to_vector()
        } else {
            self.qreg.copy_to_vector()
        };
        result.save(&op.key, SavedValue::Complexes(data), op.save_type)
    }
}

fn apply_phase(qreg: &mut QubitVector, op: &Op, phase: Complex64) -> Result<()> {
    if op.qubits.len() != 1 {
        return Err(SimulatorError::shape(
            op.name.as_str(),
            format!("expected one qubit, got {}", op.qubits.len()),
        ));
    }
    Ok(qreg.apply_diagonal_matrix(&op.qubits, &[ONE, phase])?)
}

/// Real-encoded bit mask of a MOSQ_CR record
fn decode_mask(gate: &str, value: f64) -> Result<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(SimulatorError::shape(
            gate,
            format!("mask parameter {value} is not a non-negative integer"),
        ))
    }
}
