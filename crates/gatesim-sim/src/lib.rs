//! Evaluation engine for gatesim circuits
//!
//! Given a [`Circuit`](gatesim_model::Circuit) snapshot, the [`Evaluator`]
//! computes every gate's outputs and returns a new snapshot whose wires agree
//! with those outputs. Acyclic circuits take one combinational pass; circuits
//! with feedback (latches, ring oscillators) go through bounded event-driven
//! iteration, and non-convergence is reported rather than treated as failure.
//!
//! ```
//! use gatesim_model::{Circuit, Gate, GateKind};
//! use gatesim_sim::Evaluator;
//!
//! let mut circuit = Circuit::new();
//! circuit.add_gate(Gate::input("a", true)).unwrap();
//! circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
//! circuit.wire_up("w", "a", "n", 0).unwrap();
//!
//! let evaluation = Evaluator::default().evaluate(&circuit, 0.0).unwrap();
//! assert!(!evaluation.circuit.gate("n").unwrap().output());
//! ```

pub mod analyzer;
pub mod clock;
pub mod combinational;
pub mod config;
pub mod error;
pub mod event_driven;
pub mod gate_eval;
pub mod hybrid;
mod netlist;

pub use analyzer::{analyze, CyclicPartition, DependencyAnalysis, Stage};
pub use clock::{ClockDriver, ClockEdge, FrameReport};
pub use config::{EvaluatorConfig, MAX_ITERATIONS_CAP};
pub use error::{ConfigError, EvalError, EvalResult, GateFault};
pub use event_driven::CyclicOutcome;
pub use gate_eval::{evaluate_gate, GateOutput, MetadataUpdate, NotPrimitive};
pub use hybrid::{Evaluation, Evaluator, Strategy};
