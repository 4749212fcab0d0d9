//! Wires: directed signal connections between gate pins

use crate::gate::GateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub String);

impl WireId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WireId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WireId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One end of a wire
///
/// Negative pins are output pins: `-1` is output 0, `-2` output 1, and so
/// on. Non-negative pins index the gate's input array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub gate_id: GateId,
    pub pin: i32,
}

impl Endpoint {
    /// Output pin `index` of `gate_id`
    pub fn output(gate_id: impl Into<GateId>, index: usize) -> Self {
        Self {
            gate_id: gate_id.into(),
            pin: -(index as i32) - 1,
        }
    }

    /// Input pin `index` of `gate_id`
    pub fn input(gate_id: impl Into<GateId>, index: usize) -> Self {
        Self {
            gate_id: gate_id.into(),
            pin: index as i32,
        }
    }

    pub fn output_index(&self) -> Option<usize> {
        (self.pin < 0).then(|| (-(self.pin + 1)) as usize)
    }

    pub fn input_index(&self) -> Option<usize> {
        (self.pin >= 0).then_some(self.pin as usize)
    }
}

/// A directed connection from an output pin to an input pin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    pub id: WireId,
    pub from: Endpoint,
    pub to: Endpoint,
    /// Mirror of the source pin's signal; derived by the evaluator
    #[serde(default)]
    pub is_active: bool,
}

impl Wire {
    pub fn new(id: impl Into<WireId>, from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            is_active: false,
        }
    }
}
