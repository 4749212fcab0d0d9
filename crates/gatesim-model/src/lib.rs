//! gatesim circuit model
//!
//! Plain data for the logic-circuit evaluator: gates, wires, and the circuit
//! aggregate that owns them. Everything here is serializable in the
//! persistence format `{ gates: Gate[], wires: Wire[] }`, with custom gates
//! embedding nested circuits of the same shape.

pub mod circuit;
pub mod error;
pub mod gate;
pub mod metadata;
pub mod wire;

pub use circuit::{Circuit, CustomCircuit, PinMapping};
pub use error::{CircuitError, Result};
pub use gate::{Gate, GateId, GateKind, Position};
pub use metadata::{
    ClockMeta, CounterMeta, DelayLine, FlipFlopMeta, GateMetadata, LatchMeta, MuxMeta,
    MAX_COUNTER_BITS, MAX_SELECT_BITS,
};
pub use wire::{Endpoint, Wire, WireId};
