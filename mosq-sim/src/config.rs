//! Simulator configuration

use crate::error::{Result, SimulatorError};
use mosq_state::qubit_vector::{
    DEFAULT_PARALLEL_THRESHOLD, DEFAULT_SAMPLE_INDEX_SIZE, DEFAULT_ZERO_THRESHOLD,
};
use serde::{Deserialize, Serialize};

/// Configuration for the statevector simulator
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Worker threads for kernel fan-out
    ///
    /// 0 uses rayon's current thread count.
    ///
    /// Default: 0
    pub threads: usize,

    /// Qubit count above which kernels fan out over the workers
    ///
    /// A performance tunable only; results do not depend on it.
    ///
    /// Default: 14
    pub parallel_threshold: usize,

    /// Magnitude below which exported amplitudes are chopped to zero
    ///
    /// Default: 1e-10
    pub zero_threshold: f64,

    /// Block size (as a power of two) of the measurement sampling index
    ///
    /// Default: 10
    pub sample_measure_index_size: usize,

    /// Global phase in radians applied after every allocation
    ///
    /// Default: 0.0 (none)
    pub global_phase: f64,

    /// Number of shots to run
    ///
    /// Default: 1024
    pub shots: usize,

    /// Random number generator seed for reproducibility
    ///
    /// Default: None (seeded from entropy)
    pub seed: Option<u64>,

    /// Sample tail measurements from one evolved state instead of
    /// re-running the circuit for every shot
    ///
    /// Default: true
    pub measure_sampling: bool,

    /// Record per-operation counts and timings
    ///
    /// Default: false
    pub collect_statistics: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            zero_threshold: DEFAULT_ZERO_THRESHOLD,
            sample_measure_index_size: DEFAULT_SAMPLE_INDEX_SIZE,
            global_phase: 0.0,
            shots: 1024,
            seed: None,
            measure_sampling: true,
            collect_statistics: false,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for debugging
    ///
    /// - Single worker thread
    /// - Every shot simulated in full
    /// - Statistics collection
    /// - Deterministic seed
    pub fn debug() -> Self {
        Self {
            threads: 1,
            measure_sampling: false,
            collect_statistics: true,
            seed: Some(42),
            ..Default::default()
        }
    }

    /// Set the number of worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the qubit count above which kernels run in parallel
    pub fn with_parallel_threshold(mut self, qubits: usize) -> Self {
        self.parallel_threshold = qubits;
        self
    }

    pub fn with_zero_threshold(mut self, epsilon: f64) -> Self {
        self.zero_threshold = epsilon;
        self
    }

    pub fn with_sample_measure_index_size(mut self, index_size: usize) -> Self {
        self.sample_measure_index_size = index_size;
        self
    }

    pub fn with_global_phase(mut self, phase: f64) -> Self {
        self.global_phase = phase;
        self
    }

    /// Set the number of shots
    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    /// Set the random seed for deterministic execution
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_measure_sampling(mut self, enabled: bool) -> Self {
        self.measure_sampling = enabled;
        self
    }

    /// Enable statistics collection
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.collect_statistics = enabled;
        self
    }

    /// Worker count after resolving `threads = 0`
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            rayon::current_num_threads()
        } else {
            self.threads
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.shots == 0 {
            return Err(SimulatorError::InvalidConfig(
                "shots must be > 0".to_string(),
            ));
        }

        if !(self.zero_threshold >= 0.0 && self.zero_threshold.is_finite()) {
            return Err(SimulatorError::InvalidConfig(format!(
                "zero_threshold must be a finite non-negative number, got {}",
                self.zero_threshold
            )));
        }

        if !self.global_phase.is_finite() {
            return Err(SimulatorError::InvalidConfig(format!(
                "global_phase must be finite, got {}",
                self.global_phase
            )));
        }

        if self.sample_measure_index_size >= 64 {
            return Err(SimulatorError::InvalidConfig(format!(
                "sample_measure_index_size must be < 64, got {}",
                self.sample_measure_index_size
            )));
        }

        Ok(())
    }
}
