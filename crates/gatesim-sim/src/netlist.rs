//! Evaluation workspace
//!
//! A private copy of the circuit snapshot plus the wire lookup tables the
//! evaluators need. Every evaluator works here and the caller only ever sees
//! the finished copy, so a snapshot handed to [`Evaluator::evaluate`] is never
//! observed half-updated.
//!
//! [`Evaluator::evaluate`]: crate::Evaluator::evaluate

use crate::error::{EvalResult, GateFault};
use crate::gate_eval::{evaluate_gate, NotPrimitive};
use crate::hybrid::{Evaluator, Scope};
use gatesim_model::{Circuit, CircuitError, Gate, GateId, GateMetadata, Wire};
use indexmap::IndexMap;
use tracing::warn;

/// Source of one input pin: (gate position, output index)
type Driver = Option<(usize, usize)>;

/// State a round of event-driven evaluation is compared on
pub(crate) type GateState = (Vec<bool>, GateMetadata);

pub(crate) struct Workspace<'e> {
    pub(crate) gates: Vec<Gate>,
    pub(crate) wires: Vec<Wire>,
    index: IndexMap<GateId, usize>,
    drivers: Vec<Vec<Driver>>,
    /// Gate has been evaluated in the current pass
    settled: Vec<bool>,
    pub(crate) faults: IndexMap<GateId, GateFault>,
    pub(crate) nested_oscillation: bool,
    now: f64,
    evaluator: &'e Evaluator,
    scope: &'e Scope,
}

impl<'e> Workspace<'e> {
    pub(crate) fn new(
        circuit: &Circuit,
        now: f64,
        evaluator: &'e Evaluator,
        scope: &'e Scope,
    ) -> EvalResult<Self> {
        // Nested definitions are checked when their gate is evaluated
        circuit.validate_wiring()?;
        let index = circuit.index()?;

        let mut gates = circuit.gates.clone();
        for gate in &mut gates {
            gate.normalize_signals();
        }

        let mut drivers: Vec<Vec<Driver>> = gates
            .iter()
            .map(|gate| vec![None; gate.inputs.len()])
            .collect();
        for wire in &circuit.wires {
            // Endpoints and pins were checked by validate()
            let (Some(&source), Some(&target)) =
                (index.get(&wire.from.gate_id), index.get(&wire.to.gate_id))
            else {
                continue;
            };
            if let (Some(output), Some(pin)) = (wire.from.output_index(), wire.to.input_index()) {
                if let Some(slot) = drivers[target].get_mut(pin) {
                    *slot = Some((source, output));
                }
            }
        }

        Ok(Self {
            settled: vec![true; gates.len()],
            gates,
            wires: circuit.wires.clone(),
            index,
            drivers,
            faults: IndexMap::new(),
            nested_oscillation: false,
            now,
            evaluator,
            scope,
        })
    }

    pub(crate) fn position(&self, id: &GateId) -> EvalResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CircuitError::GateNotFound(id.clone()).into())
    }

    pub(crate) fn positions(&self, ids: &[GateId]) -> EvalResult<Vec<usize>> {
        ids.iter().map(|id| self.position(id)).collect()
    }

    pub(crate) fn unsettle(&mut self, positions: &[usize]) {
        for &position in positions {
            self.settled[position] = false;
        }
    }

    /// Every gate feeding `position` has been evaluated in this pass
    pub(crate) fn sources_settled(&self, position: usize) -> bool {
        self.drivers[position]
            .iter()
            .flatten()
            .all(|&(source, _)| self.settled[source])
    }

    pub(crate) fn gate_id(&self, position: usize) -> &GateId {
        &self.gates[position].id
    }

    pub(crate) fn state(&self, positions: &[usize]) -> Vec<GateState> {
        positions
            .iter()
            .map(|&position| {
                let gate = &self.gates[position];
                (gate.outputs.clone(), gate.metadata.clone())
            })
            .collect()
    }

    /// Gather inputs, evaluate one gate and commit its outputs and metadata
    pub(crate) fn step(&mut self, position: usize) {
        let inputs: Vec<bool> = self.drivers[position]
            .iter()
            .map(|driver| match *driver {
                Some((source, output)) => self.gates[source].output_at(output),
                None => false,
            })
            .collect();

        match evaluate_gate(&self.gates[position], &inputs, self.now) {
            Ok(result) => {
                let gate = &mut self.gates[position];
                gate.outputs = result.outputs;
                result.update.apply(&mut gate.metadata);
            }
            Err(NotPrimitive::Custom) => self.step_custom(position, &inputs),
            Err(NotPrimitive::Unknown(name)) => {
                let gate = &mut self.gates[position];
                gate.outputs = vec![false; gate.output_arity()];
                self.record_fault(position, GateFault::UnknownKind { name });
            }
        }

        let gate = &mut self.gates[position];
        gate.inputs = inputs;
        gate.normalize_signals();
        self.settled[position] = true;
    }

    fn step_custom(&mut self, position: usize, inputs: &[bool]) {
        let evaluator = self.evaluator;
        let scope = self.scope;
        let Some(mut definition) = self.gates[position].metadata.custom.take() else {
            self.record_fault(
                position,
                GateFault::InvalidCustomGate {
                    reason: "no sub-circuit definition".to_string(),
                },
            );
            return;
        };

        match evaluator.evaluate_custom(&definition, inputs, self.now, scope) {
            Ok((outputs, nested)) => {
                // Surface the first inner fault on the enclosing gate
                if let Some((inner, fault)) = nested.faults.first() {
                    let reason = format!("gate '{}': {}", inner, fault);
                    self.record_fault(position, GateFault::InvalidCustomGate { reason });
                }
                self.gates[position].outputs = outputs;
                self.nested_oscillation |= nested.has_oscillation;
                definition.circuit = nested.circuit;
            }
            // Hold the previous outputs
            Err(reason) => self.record_fault(position, GateFault::InvalidCustomGate { reason }),
        }
        self.gates[position].metadata.custom = Some(definition);
    }

    fn record_fault(&mut self, position: usize, fault: GateFault) {
        let id = self.gates[position].id.clone();
        if !self.faults.contains_key(&id) {
            warn!("gate '{}': {}", id, fault);
            self.faults.insert(id, fault);
        }
    }

    /// Consume the workspace into the evaluated circuit
    pub(crate) fn finish(self) -> (Circuit, IndexMap<GateId, GateFault>, bool) {
        let mut circuit = Circuit {
            gates: self.gates,
            wires: self.wires,
        };
        circuit.refresh_wire_activity();
        (circuit, self.faults, self.nested_oscillation)
    }
}
