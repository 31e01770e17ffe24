//! Multi-shot driver

use crate::config::SimulatorConfig;
use crate::creg::ClassicalRegister;
use crate::error::{Result, SimulatorError};
use crate::operation::{Circuit, Op, OpType};
use crate::result::ExperimentResult;
use crate::state::State;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace, warn};

/// Statevector simulator running a circuit for a number of shots
///
/// Each shot starts from |0…0⟩ (with the configured global phase) and runs the
/// operations in order. A failing operation aborts the run with
/// [`SimulatorError::Aborted`] naming the shot.
///
/// # Example
///
/// ```
/// use mosq_sim::{Circuit, Op, Simulator, SimulatorConfig};
///
/// let mut circuit = Circuit::new(2).with_memory(2);
/// circuit
///     .push(Op::gate("h", &[0], &[]))
///     .push(Op::gate("cx", &[0, 1], &[]))
///     .push(Op::measure(&[0, 1], &[0, 1], &[]));
///
/// let simulator = Simulator::new(SimulatorConfig::new().with_shots(100).with_seed(1)).unwrap();
/// let result = simulator.run(&circuit).unwrap();
/// assert_eq!(result.counts.get("0x1"), None);
/// assert_eq!(result.counts.values().sum::<usize>(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a simulator after validating `config`
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run `circuit` for the configured number of shots
    ///
    /// # Errors
    /// Allocation failures are returned as they are; any failure inside a shot
    /// is wrapped in `Aborted`.
    pub fn run(&self, circuit: &Circuit) -> Result<ExperimentResult> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let shots = self.config.shots;
        let mut result = ExperimentResult::new(shots, seed);
        let mut state = State::new(
            circuit.num_qubits,
            circuit.num_memory,
            circuit.num_registers,
            &self.config,
        )?;

        let sampling = (self.config.measure_sampling && shots > 1)
            .then(|| circuit.sampling_start())
            .flatten();
        match sampling {
            Some(first) => {
                debug!(shots, first, "sampling tail measurements from one evolution");
                self.run_sampled(circuit, first, &mut state, &mut result, &mut rng)?;
            }
            None => {
                for shot in 0..shots {
                    trace!(shot, "starting shot");
                    if shot > 0 {
                        state.initialize_qreg().map_err(|e| abort(shot, e))?;
                        state.reset_creg();
                    }
                    state
                        .apply_ops(&circuit.ops, &mut result, &mut rng, shot + 1 == shots)
                        .map_err(|e| abort(shot, e))?;
                    if circuit.num_memory > 0 {
                        result.add_memory(state.creg().memory_hex());
                    }
                }
            }
        }

        result.telemetry = state.take_telemetry();
        Ok(result)
    }

    fn run_sampled(
        &self,
        circuit: &Circuit,
        first: usize,
        state: &mut State,
        result: &mut ExperimentResult,
        rng: &mut StdRng,
    ) -> Result<()> {
        let (prefix, tail) = circuit.ops.split_at(first);
        state
            .apply_ops(prefix, result, rng, false)
            .map_err(|e| abort(0, e))?;

        let measures: Vec<&Op> = tail
            .iter()
            .filter(|op| op.op_type == OpType::Measure)
            .collect();
        let mut measured: Vec<usize> = Vec::new();
        for op in &measures {
            for &q in &op.qubits {
                if !measured.contains(&q) {
                    measured.push(q);
                }
            }
        }

        let samples = state
            .sample_measure(&measured, self.config.shots, rng)
            .map_err(|e| abort(0, e))?;
        for (shot, sample) in samples.into_iter().enumerate() {
            let mut creg = ClassicalRegister::new(circuit.num_memory, circuit.num_registers);
            for op in &measures {
                let bits = op.qubits.iter().enumerate().fold(0u64, |acc, (i, q)| {
                    let pos = measured.iter().position(|m| m == q).unwrap_or(0);
                    acc | (((sample >> pos) & 1) << i)
                });
                creg.store_measure(bits, &op.memory, &op.registers)
                    .map_err(|e| abort(shot, e))?;
            }
            result.add_memory(creg.memory_hex());
        }
        Ok(())
    }
}

fn abort(shot: usize, err: SimulatorError) -> SimulatorError {
    warn!(shot, error = %err, "shot aborted");
    SimulatorError::Aborted {
        shot,
        source: Box::new(err),
    }
}
