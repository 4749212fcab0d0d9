//! Gate evaluation functions
//!
//! One pure function per gate type, mapping the current inputs (and, for
//! stateful gates, the retained metadata) to outputs plus a metadata update.
//! Dispatch is a closed `match` over [`GateKind`].
//!
//! # Usage
//!
//! ```
//! use gatesim_model::{Gate, GateKind};
//! use gatesim_sim::gate_eval::evaluate_gate;
//!
//! let and = Gate::new("g", GateKind::And);
//! let out = evaluate_gate(&and, &[true, true], 0.0).unwrap();
//! assert_eq!(out.outputs, vec![true]);
//! ```
//!
//! CUSTOM gates are not primitives; the evaluator recurses into their
//! sub-circuit instead.

use crate::clock::ClockEdge;
use gatesim_model::{
    ClockMeta, CounterMeta, DelayLine, FlipFlopMeta, Gate, GateKind, GateMetadata, LatchMeta,
};

/// Result of evaluating one gate
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutput {
    pub outputs: Vec<bool>,
    pub update: MetadataUpdate,
}

impl GateOutput {
    fn single(value: bool) -> Self {
        Self {
            outputs: vec![value],
            update: MetadataUpdate::None,
        }
    }
}

/// New state for a stateful gate
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    None,
    Clock(ClockMeta),
    FlipFlop(FlipFlopMeta),
    Latch(LatchMeta),
    Delay(DelayLine),
    Counter(CounterMeta),
}

impl MetadataUpdate {
    pub fn apply(self, metadata: &mut GateMetadata) {
        match self {
            MetadataUpdate::None => {}
            MetadataUpdate::Clock(clock) => metadata.clock = Some(clock),
            MetadataUpdate::FlipFlop(flip_flop) => metadata.flip_flop = Some(flip_flop),
            MetadataUpdate::Latch(latch) => metadata.latch = Some(latch),
            MetadataUpdate::Delay(delay) => metadata.delay = Some(delay),
            MetadataUpdate::Counter(counter) => metadata.counter = Some(counter),
        }
    }
}

/// Why a gate has no primitive evaluation function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotPrimitive {
    /// Sub-circuit; evaluated recursively by the orchestrator
    Custom,
    /// Gate type name the evaluator does not recognize
    Unknown(String),
}

/// Evaluate a primitive gate
///
/// `inputs` are the gathered input pin values and `now` is the logical time
/// in milliseconds.
pub fn evaluate_gate(gate: &Gate, inputs: &[bool], now: f64) -> Result<GateOutput, NotPrimitive> {
    let input = |i: usize| inputs.get(i).copied().unwrap_or(false);
    let output = match &gate.kind {
        // === Sources and sinks ===
        GateKind::Input => GateOutput::single(gate.output()),
        GateKind::Output => GateOutput::single(input(0)),
        GateKind::Clock => {
            let meta = gate.metadata.clock.unwrap_or_default();
            clock(&meta, gate.output(), now)
        }

        // === Combinational ===
        GateKind::And => GateOutput::single(and(inputs)),
        GateKind::Or => GateOutput::single(or(inputs)),
        GateKind::Not => GateOutput::single(!input(0)),
        GateKind::Xor => GateOutput::single(xor(inputs)),
        GateKind::Nand => GateOutput::single(!and(inputs)),
        GateKind::Nor => GateOutput::single(!or(inputs)),
        GateKind::Xnor => GateOutput::single(!xor(inputs)),
        GateKind::Mux => GateOutput::single(mux(inputs, gate.metadata.mux_select_bits())),

        // === Sequential ===
        GateKind::DFlipFlop => {
            let meta = gate.metadata.flip_flop.unwrap_or_default();
            let next = d_flip_flop(input(0), input(1), meta);
            GateOutput {
                outputs: vec![next.q],
                update: MetadataUpdate::FlipFlop(next),
            }
        }
        GateKind::SrLatch => {
            let meta = gate.metadata.latch.unwrap_or_default();
            let next = sr_latch(input(0), input(1), meta);
            GateOutput {
                outputs: vec![next.q, !next.q],
                update: MetadataUpdate::Latch(next),
            }
        }
        GateKind::Delay => {
            let mut line = gate.metadata.delay.clone().unwrap_or_default();
            let value = line.step(input(0));
            GateOutput {
                outputs: vec![value],
                update: MetadataUpdate::Delay(line),
            }
        }
        GateKind::BinaryCounter => {
            let meta = gate.metadata.counter.unwrap_or_default();
            let next = binary_counter(input(0), meta);
            GateOutput {
                outputs: counter_bits(next.value, gate.metadata.counter_bits()),
                update: MetadataUpdate::Counter(next),
            }
        }

        GateKind::Custom => return Err(NotPrimitive::Custom),
        GateKind::Unknown(name) => return Err(NotPrimitive::Unknown(name.clone())),
    };
    Ok(output)
}

pub fn and(inputs: &[bool]) -> bool {
    inputs.iter().all(|&x| x)
}

pub fn or(inputs: &[bool]) -> bool {
    inputs.iter().any(|&x| x)
}

/// Odd parity
pub fn xor(inputs: &[bool]) -> bool {
    inputs.iter().fold(false, |acc, &x| acc ^ x)
}

/// Data lines first, then `select_bits` selector lines (LSB first)
pub fn mux(inputs: &[bool], select_bits: u8) -> bool {
    let data_lines = 1usize << select_bits;
    let select = (0..select_bits as usize).fold(0usize, |sel, bit| {
        if inputs.get(data_lines + bit).copied().unwrap_or(false) {
            sel | (1 << bit)
        } else {
            sel
        }
    });
    inputs.get(select).copied().unwrap_or(false)
}

/// CLOCK level at `now`
///
/// The level is low for the first half period after the gate's own start
/// time, then alternates. A stopped clock, or one with an unusable
/// frequency, holds `held`. A running clock without a start time adopts
/// `now` as its phase origin.
pub fn clock(meta: &ClockMeta, held: bool, now: f64) -> GateOutput {
    let half_period = match meta.half_period_ms() {
        Some(half_period) if meta.is_running => half_period,
        _ => return GateOutput::single(held),
    };
    let mut next = *meta;
    let start = *next.start_time.get_or_insert(now);
    let elapsed = (now - start).max(0.0);
    let phase = (elapsed / half_period).floor() as u64;
    let update = if next == *meta {
        MetadataUpdate::None
    } else {
        MetadataUpdate::Clock(next)
    };
    GateOutput {
        outputs: vec![phase % 2 == 1],
        update,
    }
}

/// Rising-edge D flip-flop
pub fn d_flip_flop(d: bool, clk: bool, meta: FlipFlopMeta) -> FlipFlopMeta {
    let q = match ClockEdge::detect(meta.previous_clock, clk) {
        ClockEdge::Rising => d,
        _ => meta.q,
    };
    FlipFlopMeta {
        previous_clock: clk,
        q,
    }
}

/// SR latch; S=R=1 holds the last valid state
pub fn sr_latch(s: bool, r: bool, meta: LatchMeta) -> LatchMeta {
    let q = match (s, r) {
        (true, false) => true,
        (false, true) => false,
        _ => meta.q,
    };
    LatchMeta { q }
}

/// Increment on each rising edge, wrapping at the counter width
pub fn binary_counter(clk: bool, meta: CounterMeta) -> CounterMeta {
    let value = match ClockEdge::detect(meta.previous_clock, clk) {
        ClockEdge::Rising => meta.value.wrapping_add(1) & meta.mask(),
        _ => meta.value & meta.mask(),
    };
    CounterMeta {
        value,
        previous_clock: clk,
        ..meta
    }
}

/// Bit decomposition, LSB first
pub fn counter_bits(value: u64, bits: u8) -> Vec<bool> {
    (0..bits as u32).map(|bit| (value >> bit) & 1 != 0).collect()
}

// ============================================================================
// Tests
// ============================================================================
