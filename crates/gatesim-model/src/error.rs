//! Error types for circuit construction and validation

use crate::gate::GateId;
use crate::wire::WireId;
use thiserror::Error;

/// Result type for circuit operations
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Structural errors in a circuit snapshot
///
/// These are raised when a circuit is mutated or loaded. The evaluator
/// assumes a circuit that passed validation and fails fast otherwise.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// Two gates share the same id
    #[error("duplicate gate id '{0}'")]
    DuplicateGate(GateId),

    /// Two wires share the same id
    #[error("duplicate wire id '{0}'")]
    DuplicateWire(WireId),

    /// A wire endpoint names a gate that is not in the circuit
    #[error("wire '{wire}' references unknown gate '{gate}'")]
    UnknownGate { wire: WireId, gate: GateId },

    /// A wire leaves a gate from something other than one of its output pins
    #[error("wire '{wire}' leaves gate '{gate}' from invalid output pin {pin}")]
    InvalidSourcePin { wire: WireId, gate: GateId, pin: i32 },

    /// A wire enters a gate on something other than one of its input pins
    #[error("wire '{wire}' enters gate '{gate}' on invalid input pin {pin}")]
    InvalidTargetPin { wire: WireId, gate: GateId, pin: i32 },

    /// An input pin already has an incoming wire
    #[error("input pin {pin} of gate '{gate}' is already driven by wire '{existing}'")]
    PinAlreadyDriven {
        gate: GateId,
        pin: i32,
        existing: WireId,
    },

    /// Gate lookup failed
    #[error("gate '{0}' not found")]
    GateNotFound(GateId),

    /// Operation requires an INPUT gate
    #[error("gate '{0}' is not an INPUT gate")]
    NotAnInput(GateId),

    /// Operation requires a CLOCK gate
    #[error("gate '{0}' is not a CLOCK gate")]
    NotAClock(GateId),

    /// A custom gate's pin mappings are malformed
    #[error("invalid pin mapping: {0}")]
    InvalidPinMapping(String),

    /// Persistence format could not be parsed or written
    #[error("circuit JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
