//! Evaluation errors and per-gate faults

use gatesim_model::CircuitError;
use serde::Serialize;
use thiserror::Error;

/// Result type for evaluator operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that abort an evaluation call
///
/// Only structural corruption of the snapshot or a bad configuration ends an
/// evaluation early. Problems confined to one gate are reported as
/// [`GateFault`]s instead.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("malformed circuit: {0}")]
    Structure(#[from] CircuitError),
    #[error("invalid evaluator configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors loading or validating an [`EvaluatorConfig`](crate::EvaluatorConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Recoverable fault local to one gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "fault", rename_all = "camelCase")]
pub enum GateFault {
    /// The gate type is not one the evaluator knows; outputs read false
    #[error("unsupported gate type '{name}'")]
    UnknownKind { name: String },
    /// The custom gate, or a gate nested inside it, could not be evaluated
    ///
    /// When the sub-circuit itself cannot run (bad definition, recursion or
    /// depth limit) the gate's outputs hold their previous values. A fault
    /// further down is surfaced here while the outputs still follow the
    /// nested evaluation.
    #[error("invalid custom gate: {reason}")]
    InvalidCustomGate { reason: String },
}
