//! Statevector simulation driver with fused MOSQ kernels
//!
//! This crate runs operation records against the amplitude store from
//! `mosq-state`, resolving gate names through the dispatch table in
//! `mosq-gates`.
//!
//! # Features
//!
//! - **Per-shot orchestration**: measurement, reset, initialize, Kraus
//!   channels, multiplexers and saves
//! - **Measurement sampling**: circuits whose measurements all sit at the end
//!   evolve once and draw every shot from the final state
//! - **Results**: per-shot, listed and averaged saves plus hex-keyed counts
//! - **Telemetry**: optional per-operation counts and timings
//!
//! # Example
//!
//! ```
//! use mosq_sim::{Circuit, Op, OpType, SaveType, SavedValue, Simulator, SimulatorConfig};
//!
//! let mut circuit = Circuit::new(3);
//! circuit
//!     .push(Op::gate("h", &[0], &[]))
//!     .push(Op::gate("MOSQ", &[0, 1, 2], &[0.0]))
//!     .push(Op::save(OpType::SaveProbs, &[0], "p", SaveType::Single));
//!
//! let result = Simulator::new(SimulatorConfig::new().with_shots(1))
//!     .unwrap()
//!     .run(&circuit)
//!     .unwrap();
//! match result.single("p") {
//!     Some(SavedValue::Reals(p)) => assert!((p[0] - 0.5).abs() < 1e-12),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod config;
pub mod creg;
pub mod error;
pub mod operation;
pub mod result;
pub mod simulator;
pub mod state;
pub mod telemetry;

pub use config::SimulatorConfig;
pub use creg::ClassicalRegister;
pub use error::{Result, SimulatorError};
pub use operation::{Circuit, ExpvalTerm, Op, OpType};
pub use result::{ExperimentResult, SaveType, SavedValue};
pub use simulator::Simulator;
pub use state::State;
pub use telemetry::ExecutionTelemetry;
