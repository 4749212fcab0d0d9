//! Per-gate state that persists across evaluation calls
//!
//! Each stateful gate type has its own section. State travels with the gate
//! value, so two gates never share phase or history.

use crate::circuit::CustomCircuit;
use crate::gate::GateKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Largest supported MUX selector width (64 data lines)
pub const MAX_SELECT_BITS: u8 = 6;

/// Largest supported BINARY_COUNTER width
pub const MAX_COUNTER_BITS: u8 = 64;

/// Type-specific auxiliary state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flip_flop: Option<FlipFlopMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latch: Option<LatchMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<CounterMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Box<CustomCircuit>>,
}

impl GateMetadata {
    /// Default metadata for a freshly placed gate of `kind`
    pub fn for_kind(kind: &GateKind) -> Self {
        let mut metadata = Self::default();
        match kind {
            GateKind::Clock => metadata.clock = Some(ClockMeta::default()),
            GateKind::DFlipFlop => metadata.flip_flop = Some(FlipFlopMeta::default()),
            GateKind::SrLatch => metadata.latch = Some(LatchMeta::default()),
            GateKind::Delay => metadata.delay = Some(DelayLine::default()),
            GateKind::BinaryCounter => metadata.counter = Some(CounterMeta::default()),
            GateKind::Mux => metadata.mux = Some(MuxMeta::default()),
            _ => {}
        }
        metadata
    }

    pub fn is_empty(&self) -> bool {
        self.clock.is_none()
            && self.flip_flop.is_none()
            && self.latch.is_none()
            && self.delay.is_none()
            && self.counter.is_none()
            && self.mux.is_none()
            && self.custom.is_none()
    }

    pub fn mux_select_bits(&self) -> u8 {
        self.mux
            .map_or(1, |mux| mux.select_bits)
            .clamp(1, MAX_SELECT_BITS)
    }

    pub fn counter_bits(&self) -> u8 {
        self.counter
            .as_ref()
            .map_or(CounterMeta::DEFAULT_BITS, |counter| counter.bits)
            .clamp(1, MAX_COUNTER_BITS)
    }
}

/// CLOCK state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockMeta {
    /// Toggle frequency in Hz
    pub frequency: f64,
    pub is_running: bool,
    /// Phase origin in milliseconds of logical time; set on first evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
}

impl Default for ClockMeta {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            is_running: true,
            start_time: None,
        }
    }
}

impl ClockMeta {
    /// Half period in milliseconds, if the frequency is usable
    pub fn half_period_ms(&self) -> Option<f64> {
        if self.frequency.is_finite() && self.frequency > 0.0 {
            Some(1000.0 / (2.0 * self.frequency))
        } else {
            None
        }
    }
}

/// D-FF state
///
/// `previous_clock` is the only edge-detection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlipFlopMeta {
    pub previous_clock: bool,
    pub q: bool,
}

/// SR-LATCH state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatchMeta {
    pub q: bool,
}

/// DELAY history queue, oldest value first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayLine {
    pub depth: usize,
    pub history: VecDeque<bool>,
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DelayLine {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            history: std::iter::repeat(false).take(depth).collect(),
        }
    }

    /// Push `input` and emit the value from `depth` steps ago
    pub fn step(&mut self, input: bool) -> bool {
        if self.depth == 0 {
            self.history.clear();
            return input;
        }
        while self.history.len() > self.depth {
            self.history.pop_front();
        }
        while self.history.len() < self.depth {
            self.history.push_front(false);
        }
        self.history.push_back(input);
        self.history.pop_front().unwrap_or(false)
    }
}

/// BINARY_COUNTER state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterMeta {
    pub bits: u8,
    pub value: u64,
    pub previous_clock: bool,
}

impl CounterMeta {
    pub const DEFAULT_BITS: u8 = 4;

    pub fn mask(&self) -> u64 {
        let bits = self.bits.clamp(1, MAX_COUNTER_BITS);
        if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }
}

impl Default for CounterMeta {
    fn default() -> Self {
        Self {
            bits: Self::DEFAULT_BITS,
            value: 0,
            previous_clock: false,
        }
    }
}

/// MUX shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MuxMeta {
    pub select_bits: u8,
}

impl Default for MuxMeta {
    fn default() -> Self {
        Self { select_bits: 1 }
    }
}
