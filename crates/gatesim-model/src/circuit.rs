//! Circuits: the evaluation unit
//!
//! A circuit is a collection of gates (unique by id) and wires between them.
//! Structural invariants are enforced here, at mutation and load time, so the
//! evaluator can treat every snapshot it receives as well-formed:
//!
//! - every wire endpoint names a gate in the same circuit
//! - wires leave from output pins and enter on input pins within arity
//! - every input pin has at most one incoming wire
//!
//! Cycles are allowed.

use crate::error::{CircuitError, Result};
use crate::gate::{Gate, GateId, GateKind};
use crate::wire::{Endpoint, Wire, WireId};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Gates and the wires between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    #[serde(default)]
    pub gates: Vec<Gate>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the persistence format and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let mut circuit: Circuit = serde_json::from_str(json)?;
        for gate in &mut circuit.gates {
            gate.normalize_signals();
        }
        circuit.validate()?;
        Ok(circuit)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn gate(&self, id: &str) -> Option<&Gate> {
        self.gates.iter().find(|gate| gate.id.as_str() == id)
    }

    pub fn gate_mut(&mut self, id: &str) -> Option<&mut Gate> {
        self.gates.iter_mut().find(|gate| gate.id.as_str() == id)
    }

    pub fn wire(&self, id: &str) -> Option<&Wire> {
        self.wires.iter().find(|wire| wire.id.0 == id)
    }

    /// Map from gate id to position in `gates`
    pub fn index(&self) -> Result<IndexMap<GateId, usize>> {
        let mut index = IndexMap::with_capacity(self.gates.len());
        for (position, gate) in self.gates.iter().enumerate() {
            if index.insert(gate.id.clone(), position).is_some() {
                return Err(CircuitError::DuplicateGate(gate.id.clone()));
            }
        }
        Ok(index)
    }

    /// Check every structural invariant, including every nested CUSTOM
    /// definition
    pub fn validate(&self) -> Result<()> {
        self.validate_wiring()?;
        for gate in &self.gates {
            if let Some(definition) = &gate.metadata.custom {
                definition.validate()?;
            }
        }
        Ok(())
    }

    /// Check ids, wire endpoints and drivers of this level only
    pub fn validate_wiring(&self) -> Result<()> {
        let index = self.index()?;
        let mut wire_ids = IndexSet::with_capacity(self.wires.len());
        let mut driven: IndexMap<&Endpoint, &WireId> = IndexMap::with_capacity(self.wires.len());

        for wire in &self.wires {
            if !wire_ids.insert(&wire.id) {
                return Err(CircuitError::DuplicateWire(wire.id.clone()));
            }
            self.check_wire(&index, wire)?;
            if let Some(existing) = driven.insert(&wire.to, &wire.id) {
                return Err(CircuitError::PinAlreadyDriven {
                    gate: wire.to.gate_id.clone(),
                    pin: wire.to.pin,
                    existing: existing.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_wire(&self, index: &IndexMap<GateId, usize>, wire: &Wire) -> Result<()> {
        let source = self.lookup(index, wire, &wire.from.gate_id)?;
        match wire.from.output_index() {
            Some(output) if output < source.output_arity() => {}
            _ => {
                return Err(CircuitError::InvalidSourcePin {
                    wire: wire.id.clone(),
                    gate: source.id.clone(),
                    pin: wire.from.pin,
                })
            }
        }

        let target = self.lookup(index, wire, &wire.to.gate_id)?;
        match wire.to.input_index() {
            Some(input) if input < target.input_arity() => Ok(()),
            _ => Err(CircuitError::InvalidTargetPin {
                wire: wire.id.clone(),
                gate: target.id.clone(),
                pin: wire.to.pin,
            }),
        }
    }

    fn lookup<'a>(
        &'a self,
        index: &IndexMap<GateId, usize>,
        wire: &Wire,
        id: &GateId,
    ) -> Result<&'a Gate> {
        index
            .get(id)
            .map(|&position| &self.gates[position])
            .ok_or_else(|| CircuitError::UnknownGate {
                wire: wire.id.clone(),
                gate: id.clone(),
            })
    }

    /// Place a gate
    pub fn add_gate(&mut self, mut gate: Gate) -> Result<()> {
        if self.gate(gate.id.as_str()).is_some() {
            return Err(CircuitError::DuplicateGate(gate.id));
        }
        if let Some(definition) = &gate.metadata.custom {
            definition.validate()?;
        }
        gate.normalize_signals();
        self.gates.push(gate);
        Ok(())
    }

    /// Delete a gate and every wire attached to it
    pub fn remove_gate(&mut self, id: &str) -> Option<Gate> {
        let position = self.gates.iter().position(|gate| gate.id.as_str() == id)?;
        self.wires
            .retain(|wire| wire.from.gate_id.as_str() != id && wire.to.gate_id.as_str() != id);
        Some(self.gates.remove(position))
    }

    /// Connect an output pin to an input pin
    pub fn connect(&mut self, id: impl Into<WireId>, from: Endpoint, to: Endpoint) -> Result<()> {
        let wire = Wire::new(id, from, to);
        if self.wires.iter().any(|existing| existing.id == wire.id) {
            return Err(CircuitError::DuplicateWire(wire.id));
        }
        let index = self.index()?;
        self.check_wire(&index, &wire)?;
        if let Some(existing) = self.wires.iter().find(|existing| existing.to == wire.to) {
            return Err(CircuitError::PinAlreadyDriven {
                gate: wire.to.gate_id.clone(),
                pin: wire.to.pin,
                existing: existing.id.clone(),
            });
        }
        self.wires.push(wire);
        Ok(())
    }

    /// Shorthand for wiring output 0 of `from` into input `pin` of `to`
    pub fn wire_up(&mut self, id: impl Into<WireId>, from: &str, to: &str, pin: usize) -> Result<()> {
        self.connect(id, Endpoint::output(from, 0), Endpoint::input(to, pin))
    }

    pub fn disconnect(&mut self, id: &str) -> Option<Wire> {
        let position = self.wires.iter().position(|wire| wire.id.0 == id)?;
        Some(self.wires.remove(position))
    }

    /// Toggle an INPUT gate
    pub fn set_input_value(&mut self, id: &str, value: bool) -> Result<()> {
        let gate = self
            .gate_mut(id)
            .ok_or_else(|| CircuitError::GateNotFound(GateId::from(id)))?;
        if gate.kind != GateKind::Input {
            return Err(CircuitError::NotAnInput(gate.id.clone()));
        }
        gate.outputs = vec![value];
        Ok(())
    }

    /// Start or stop a CLOCK gate; starting resets its phase origin to `now`
    pub fn set_clock_running(&mut self, id: &str, running: bool, now: f64) -> Result<()> {
        let gate = self
            .gate_mut(id)
            .ok_or_else(|| CircuitError::GateNotFound(GateId::from(id)))?;
        if gate.kind != GateKind::Clock {
            return Err(CircuitError::NotAClock(gate.id.clone()));
        }
        let clock = gate.metadata.clock.get_or_insert_with(Default::default);
        if running && !clock.is_running {
            clock.start_time = Some(now);
        }
        clock.is_running = running;
        Ok(())
    }

    /// Recompute every wire's `is_active` from its source pin
    pub fn refresh_wire_activity(&mut self) {
        let positions: IndexMap<&GateId, usize> = self
            .gates
            .iter()
            .enumerate()
            .map(|(position, gate)| (&gate.id, position))
            .collect();
        for wire in &mut self.wires {
            wire.is_active = match (positions.get(&wire.from.gate_id), wire.from.output_index()) {
                (Some(&position), Some(output)) => self.gates[position].output_at(output),
                _ => false,
            };
        }
    }
}

/// Maps an external pin of a custom gate to an internal INPUT or OUTPUT gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinMapping {
    pub pin: usize,
    pub gate_id: GateId,
}

/// Sub-circuit behind a CUSTOM gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCircuit {
    /// Identity of the reusable definition, used to catch self-reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub circuit: Circuit,
    #[serde(default)]
    pub input_mappings: Vec<PinMapping>,
    #[serde(default)]
    pub output_mappings: Vec<PinMapping>,
}

impl CustomCircuit {
    /// Wrap `circuit`, exposing `inputs` and `outputs` as external pins in order
    pub fn new(circuit: Circuit, inputs: &[&str], outputs: &[&str]) -> Self {
        let mapping = |ids: &[&str]| -> Vec<PinMapping> {
            ids.iter()
                .enumerate()
                .map(|(pin, id)| PinMapping {
                    pin,
                    gate_id: GateId::from(*id),
                })
                .collect()
        };
        Self {
            definition_id: None,
            name: None,
            input_mappings: mapping(inputs),
            output_mappings: mapping(outputs),
            circuit,
        }
    }

    pub fn with_definition_id(mut self, id: impl Into<String>) -> Self {
        self.definition_id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Validate the internal circuit and both pin mappings
    pub fn validate(&self) -> Result<()> {
        self.circuit.validate()?;
        self.check_mappings(&self.input_mappings, GateKind::Input, "input")?;
        self.check_mappings(&self.output_mappings, GateKind::Output, "output")
    }

    fn check_mappings(&self, mappings: &[PinMapping], kind: GateKind, side: &str) -> Result<()> {
        let mut seen = vec![false; mappings.len()];
        for mapping in mappings {
            match seen.get_mut(mapping.pin) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(CircuitError::InvalidPinMapping(format!(
                        "{} pin {} is duplicated or out of range 0..{}",
                        side,
                        mapping.pin,
                        mappings.len()
                    )))
                }
            }
            match self.circuit.gate(mapping.gate_id.as_str()) {
                Some(gate) if gate.kind == kind => {}
                Some(gate) => {
                    return Err(CircuitError::InvalidPinMapping(format!(
                        "{} pin {} maps to '{}' which is {}, expected {}",
                        side, mapping.pin, gate.id, gate.kind, kind
                    )))
                }
                None => return Err(CircuitError::GateNotFound(mapping.gate_id.clone())),
            }
        }
        Ok(())
    }
}
