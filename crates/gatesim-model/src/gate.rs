//! Gates: the nodes of a circuit
//!
//! A gate is a plain record. Its id is stable, its kind is a closed
//! enumeration, and everything that must persist between evaluation calls
//! (clock phase, flip-flop edge state, delay history, nested sub-circuits)
//! lives in its [`GateMetadata`].

use crate::circuit::CustomCircuit;
use crate::metadata::{ClockMeta, CounterMeta, DelayLine, GateMetadata, MuxMeta};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique, stable identifier of a gate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(pub String);

impl GateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for GateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Gate type
///
/// Serialized as the persistence format's `type` string. Names that are not
/// recognized deserialize to [`GateKind::Unknown`] so a snapshot written by a
/// newer editor still loads; the evaluator treats such gates as faulty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GateKind {
    Input,
    Output,
    And,
    Or,
    Not,
    Xor,
    Nand,
    Nor,
    Xnor,
    Clock,
    DFlipFlop,
    SrLatch,
    Mux,
    BinaryCounter,
    Custom,
    Delay,
    Unknown(String),
}

impl GateKind {
    pub fn as_str(&self) -> &str {
        match self {
            GateKind::Input => "INPUT",
            GateKind::Output => "OUTPUT",
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Not => "NOT",
            GateKind::Xor => "XOR",
            GateKind::Nand => "NAND",
            GateKind::Nor => "NOR",
            GateKind::Xnor => "XNOR",
            GateKind::Clock => "CLOCK",
            GateKind::DFlipFlop => "D-FF",
            GateKind::SrLatch => "SR-LATCH",
            GateKind::Mux => "MUX",
            GateKind::BinaryCounter => "BINARY_COUNTER",
            GateKind::Custom => "CUSTOM",
            GateKind::Delay => "DELAY",
            GateKind::Unknown(name) => name,
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for GateKind {
    fn from(name: &str) -> Self {
        match name {
            "INPUT" => GateKind::Input,
            "OUTPUT" => GateKind::Output,
            "AND" => GateKind::And,
            "OR" => GateKind::Or,
            "NOT" => GateKind::Not,
            "XOR" => GateKind::Xor,
            "NAND" => GateKind::Nand,
            "NOR" => GateKind::Nor,
            "XNOR" => GateKind::Xnor,
            "CLOCK" => GateKind::Clock,
            "D-FF" => GateKind::DFlipFlop,
            "SR-LATCH" => GateKind::SrLatch,
            "MUX" => GateKind::Mux,
            "BINARY_COUNTER" => GateKind::BinaryCounter,
            "CUSTOM" => GateKind::Custom,
            "DELAY" => GateKind::Delay,
            other => GateKind::Unknown(other.to_string()),
        }
    }
}

impl Serialize for GateKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GateKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(GateKind::from(name.as_str()))
    }
}

/// Canvas position; irrelevant to evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A gate instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    #[serde(rename = "type")]
    pub kind: GateKind,
    #[serde(default)]
    pub position: Position,
    /// Current input signal values, one per input pin
    #[serde(default)]
    pub inputs: Vec<bool>,
    /// Current output signal values, one per output pin
    #[serde(default)]
    pub outputs: Vec<bool>,
    #[serde(default, skip_serializing_if = "GateMetadata::is_empty")]
    pub metadata: GateMetadata,
}

impl Gate {
    /// Create a gate with default metadata and signal vectors sized to its arity
    pub fn new(id: impl Into<GateId>, kind: GateKind) -> Self {
        let metadata = GateMetadata::for_kind(&kind);
        Self::with_metadata(id, kind, metadata)
    }

    pub fn with_metadata(id: impl Into<GateId>, kind: GateKind, metadata: GateMetadata) -> Self {
        let mut gate = Self {
            id: id.into(),
            kind,
            position: Position::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            metadata,
        };
        gate.normalize_signals();
        gate
    }

    /// INPUT gate holding `value`
    pub fn input(id: impl Into<GateId>, value: bool) -> Self {
        let mut gate = Self::new(id, GateKind::Input);
        gate.outputs[0] = value;
        gate
    }

    /// Running CLOCK toggling every `1 / (2 * frequency)` seconds
    pub fn clock(id: impl Into<GateId>, frequency: f64) -> Self {
        let metadata = GateMetadata {
            clock: Some(ClockMeta {
                frequency,
                ..ClockMeta::default()
            }),
            ..GateMetadata::default()
        };
        Self::with_metadata(id, GateKind::Clock, metadata)
    }

    /// DELAY with a history `depth` evaluation steps deep
    pub fn delay(id: impl Into<GateId>, depth: usize) -> Self {
        let metadata = GateMetadata {
            delay: Some(DelayLine::new(depth)),
            ..GateMetadata::default()
        };
        Self::with_metadata(id, GateKind::Delay, metadata)
    }

    /// BINARY_COUNTER with `bits` output bits
    pub fn counter(id: impl Into<GateId>, bits: u8) -> Self {
        let metadata = GateMetadata {
            counter: Some(CounterMeta {
                bits,
                ..CounterMeta::default()
            }),
            ..GateMetadata::default()
        };
        Self::with_metadata(id, GateKind::BinaryCounter, metadata)
    }

    /// MUX with `select_bits` selector lines and `2^select_bits` data lines
    pub fn mux(id: impl Into<GateId>, select_bits: u8) -> Self {
        let metadata = GateMetadata {
            mux: Some(MuxMeta { select_bits }),
            ..GateMetadata::default()
        };
        Self::with_metadata(id, GateKind::Mux, metadata)
    }

    /// CUSTOM gate wrapping a sub-circuit
    pub fn custom(id: impl Into<GateId>, definition: CustomCircuit) -> Self {
        let metadata = GateMetadata {
            custom: Some(Box::new(definition)),
            ..GateMetadata::default()
        };
        Self::with_metadata(id, GateKind::Custom, metadata)
    }

    /// Number of input pins
    pub fn input_arity(&self) -> usize {
        match &self.kind {
            GateKind::Input | GateKind::Clock => 0,
            GateKind::Output | GateKind::Not | GateKind::Delay | GateKind::BinaryCounter => 1,
            GateKind::And
            | GateKind::Or
            | GateKind::Xor
            | GateKind::Nand
            | GateKind::Nor
            | GateKind::Xnor
            | GateKind::DFlipFlop
            | GateKind::SrLatch => 2,
            GateKind::Mux => {
                let select = self.metadata.mux_select_bits() as usize;
                (1usize << select) + select
            }
            GateKind::Custom => self
                .metadata
                .custom
                .as_ref()
                .map_or(0, |def| def.input_mappings.len()),
            GateKind::Unknown(_) => self.inputs.len(),
        }
    }

    /// Number of output pins
    pub fn output_arity(&self) -> usize {
        match &self.kind {
            GateKind::SrLatch => 2,
            GateKind::BinaryCounter => self.metadata.counter_bits() as usize,
            GateKind::Custom => self
                .metadata
                .custom
                .as_ref()
                .map_or(0, |def| def.output_mappings.len()),
            GateKind::Unknown(_) => self.outputs.len().max(1),
            _ => 1,
        }
    }

    /// Primary output (pin -1)
    pub fn output(&self) -> bool {
        self.outputs.first().copied().unwrap_or(false)
    }

    /// Output `index` (pin `-(index + 1)`); unconnected reads as false
    pub fn output_at(&self, index: usize) -> bool {
        self.outputs.get(index).copied().unwrap_or(false)
    }

    /// Resize `inputs` and `outputs` to the gate's arity, keeping existing values
    pub fn normalize_signals(&mut self) {
        let inputs = self.input_arity();
        let outputs = self.output_arity();
        self.inputs.resize(inputs, false);
        self.outputs.resize(outputs, false);
    }
}
