//! Clock and timing driver
//!
//! [`ClockDriver`] owns a circuit snapshot and a logical clock. Each frame it
//! advances time, evaluates, and swaps the evaluated snapshot in. User edits
//! land between frames through the mutation helpers.

use crate::error::{ConfigError, EvalError, EvalResult};
use crate::hybrid::{Evaluation, Evaluator, Strategy};
use gatesim_model::{Circuit, CircuitError, GateId, GateKind};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEdge {
    None,
    Rising,
    Falling,
}

impl ClockEdge {
    pub fn detect(previous: bool, current: bool) -> Self {
        match (previous, current) {
            (false, true) => ClockEdge::Rising,
            (true, false) => ClockEdge::Falling,
            _ => ClockEdge::None,
        }
    }
}

/// Summary of one driven frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Logical time of the frame in milliseconds
    pub now: f64,
    pub strategy: Strategy,
    pub has_oscillation: bool,
    pub iterations: u32,
    pub unstable_gates: Vec<GateId>,
    /// Edges seen on each CLOCK gate since the previous frame
    pub clock_edges: IndexMap<GateId, ClockEdge>,
    pub faults: usize,
}

pub struct ClockDriver {
    evaluator: Evaluator,
    circuit: Circuit,
    now: f64,
    frame_ms: f64,
    frame: u64,
    last: Option<Evaluation>,
}

impl ClockDriver {
    /// Drive `circuit` in frames of `frame_ms` logical milliseconds
    pub fn new(circuit: Circuit, evaluator: Evaluator, frame_ms: f64) -> EvalResult<Self> {
        circuit.validate()?;
        if !(frame_ms.is_finite() && frame_ms > 0.0) {
            return Err(EvalError::Config(ConfigError::Invalid(format!(
                "frame interval must be positive, got {}",
                frame_ms
            ))));
        }
        Ok(Self {
            evaluator,
            circuit,
            now: 0.0,
            frame_ms,
            frame: 0,
            last: None,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last.as_ref()
    }

    /// Advance one frame and evaluate
    pub fn tick(&mut self) -> EvalResult<FrameReport> {
        self.now += self.frame_ms;
        self.frame += 1;
        self.refresh()
    }

    /// Tick `frames` times
    pub fn run(&mut self, frames: u64) -> EvalResult<Vec<FrameReport>> {
        (0..frames).map(|_| self.tick()).collect()
    }

    /// Evaluate at the current time without advancing it
    pub fn refresh(&mut self) -> EvalResult<FrameReport> {
        let evaluation = self.evaluator.evaluate(&self.circuit, self.now)?;

        let clock_edges: IndexMap<GateId, ClockEdge> = evaluation
            .circuit
            .gates
            .iter()
            .filter(|gate| gate.kind == GateKind::Clock)
            .map(|gate| {
                let previous = self
                    .circuit
                    .gate(gate.id.as_str())
                    .is_some_and(|old| old.output());
                (gate.id.clone(), ClockEdge::detect(previous, gate.output()))
            })
            .collect();

        let report = FrameReport {
            frame: self.frame,
            now: self.now,
            strategy: evaluation.strategy,
            has_oscillation: evaluation.has_oscillation,
            iterations: evaluation.iterations,
            unstable_gates: evaluation.unstable_gates.clone(),
            clock_edges,
            faults: evaluation.faults.len(),
        };
        debug!(
            "frame {} at {} ms: {} iterations, oscillation={}",
            report.frame, report.now, report.iterations, report.has_oscillation
        );

        self.circuit = evaluation.circuit.clone();
        self.last = Some(evaluation);
        Ok(report)
    }

    pub fn set_input(&mut self, id: &str, value: bool) -> Result<(), CircuitError> {
        self.circuit.set_input_value(id, value)
    }

    pub fn start_clock(&mut self, id: &str) -> Result<(), CircuitError> {
        self.circuit.set_clock_running(id, true, self.now)
    }

    pub fn stop_clock(&mut self, id: &str) -> Result<(), CircuitError> {
        self.circuit.set_clock_running(id, false, self.now)
    }

    /// Swap in a new snapshot (load, undo, redo); returns the old one
    pub fn replace_circuit(&mut self, circuit: Circuit) -> Result<Circuit, CircuitError> {
        circuit.validate()?;
        self.last = None;
        Ok(std::mem::replace(&mut self.circuit, circuit))
    }

    /// Edit the snapshot in place; the result must still validate
    pub fn edit<F>(&mut self, f: F) -> Result<(), CircuitError>
    where
        F: FnOnce(&mut Circuit) -> Result<(), CircuitError>,
    {
        let mut circuit = self.circuit.clone();
        f(&mut circuit)?;
        circuit.validate()?;
        self.circuit = circuit;
        Ok(())
    }
}
