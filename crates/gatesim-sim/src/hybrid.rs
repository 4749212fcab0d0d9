//! Hybrid evaluator
//!
//! Runs the dependency analyzer and picks a strategy:
//!
//! - no cycles: one combinational pass in topological order
//! - cycles: the acyclic prefix combinationally, then the event-driven
//!   stages, which iterate each cycle to a fixed point and evaluate the
//!   gates downstream of it once
//!
//! Wire activity is recomputed from gate outputs as the last step of every
//! call. CUSTOM gates recurse into this same evaluator.

use crate::analyzer::{analyze, DependencyAnalysis};
use crate::combinational::run_in_order;
use crate::config::EvaluatorConfig;
use crate::error::{EvalResult, GateFault};
use crate::event_driven::{resolve_stages, settle_stages, CyclicOutcome};
use crate::netlist::Workspace;
use gatesim_model::{Circuit, CustomCircuit, GateId};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

/// How a circuit was evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No cycles
    Combinational,
    /// Every gate sits on or after a cycle
    EventDriven,
    /// Combinational passes around an event-driven core
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Combinational => "combinational",
            Strategy::EventDriven => "event-driven",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Result of one [`Evaluator::evaluate`] call
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The evaluated snapshot; wire activity is consistent with gate outputs
    pub circuit: Circuit,
    /// A cyclic subcircuit (possibly inside a CUSTOM gate) did not settle
    pub has_oscillation: bool,
    /// Order gates were first evaluated in
    pub evaluation_order: Vec<GateId>,
    pub strategy: Strategy,
    /// Event-driven rounds of the slowest cycle; 0 for a purely combinational
    /// circuit
    pub iterations: u32,
    pub cyclic_gates: BTreeSet<GateId>,
    /// Gates whose state still changed in the final round of an oscillation
    pub unstable_gates: Vec<GateId>,
    pub faults: IndexMap<GateId, GateFault>,
}

/// Position in the CUSTOM gate nesting
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    depth: usize,
    /// Definition ids of the enclosing CUSTOM gates, outermost first
    lineage: Vec<String>,
}

impl Scope {
    fn enter(&self, definition: &CustomCircuit, max_depth: usize) -> Result<Scope, String> {
        let depth = self.depth + 1;
        if depth > max_depth {
            return Err(format!("nesting exceeds the maximum depth of {}", max_depth));
        }
        let mut lineage = self.lineage.clone();
        if let Some(id) = &definition.definition_id {
            if lineage.contains(id) {
                return Err(format!("definition '{}' contains itself", id));
            }
            lineage.push(id.clone());
        }
        Ok(Scope { depth, lineage })
    }
}

/// Hybrid combinational/event-driven evaluator
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `circuit` at logical time `now` (milliseconds)
    ///
    /// The input snapshot is not modified. Structural corruption is the only
    /// error; per-gate problems are reported in [`Evaluation::faults`].
    pub fn evaluate(&self, circuit: &Circuit, now: f64) -> EvalResult<Evaluation> {
        self.evaluate_scoped(circuit, now, &Scope::default())
    }

    fn evaluate_scoped(&self, circuit: &Circuit, now: f64, scope: &Scope) -> EvalResult<Evaluation> {
        let mut ws = Workspace::new(circuit, now, self, scope)?;
        let analysis = analyze(&ws.gates, &ws.wires);

        let (strategy, evaluation_order, cyclic_gates, outcome) = match analysis {
            DependencyAnalysis::Acyclic { order } => {
                debug!("{} gates, no cycles: combinational", order.len());
                let positions = ws.positions(&order)?;
                run_in_order(&mut ws, &positions);
                (
                    Strategy::Combinational,
                    order,
                    BTreeSet::new(),
                    CyclicOutcome::default(),
                )
            }
            DependencyAnalysis::Cyclic(partition) => {
                let strategy = if partition.prefix.is_empty() && partition.downstream.is_empty() {
                    Strategy::EventDriven
                } else {
                    Strategy::Hybrid
                };
                debug!(
                    "{} cycles over {} gates ({} prefix, {} downstream): {}",
                    partition.cycles.len(),
                    partition.cyclic.len(),
                    partition.prefix.len(),
                    partition.downstream.len(),
                    strategy
                );

                let prefix = ws.positions(&partition.prefix)?;
                let stages = resolve_stages(&ws, &partition.stages)?;

                run_in_order(&mut ws, &prefix);
                let outcome = settle_stages(&mut ws, &stages, self.config.max_iterations);

                let mut order = partition.prefix;
                order.extend(partition.schedule);
                (strategy, order, partition.cyclic, outcome)
            }
        };

        let (circuit, faults, nested_oscillation) = ws.finish();
        if nested_oscillation {
            debug!("oscillation inside a custom gate");
        }
        Ok(Evaluation {
            circuit,
            has_oscillation: outcome.has_oscillation || nested_oscillation,
            evaluation_order,
            strategy,
            iterations: outcome.iterations,
            cyclic_gates,
            unstable_gates: outcome.unstable,
            faults,
        })
    }

    /// Evaluate a CUSTOM gate's sub-circuit against its external inputs
    ///
    /// Returns the external outputs (by pin) and the nested evaluation, or the
    /// reason the gate is invalid.
    pub(crate) fn evaluate_custom(
        &self,
        definition: &CustomCircuit,
        inputs: &[bool],
        now: f64,
        scope: &Scope,
    ) -> Result<(Vec<bool>, Evaluation), String> {
        let scope = scope.enter(definition, self.config.max_custom_depth)?;
        definition.validate().map_err(|e| e.to_string())?;

        let mut circuit = definition.circuit.clone();
        for mapping in &definition.input_mappings {
            let value = inputs.get(mapping.pin).copied().unwrap_or(false);
            circuit
                .set_input_value(mapping.gate_id.as_str(), value)
                .map_err(|e| e.to_string())?;
        }

        trace!("entering custom gate at depth {}", scope.depth);
        let nested = self
            .evaluate_scoped(&circuit, now, &scope)
            .map_err(|e| e.to_string())?;

        let mut outputs = vec![false; definition.output_mappings.len()];
        for mapping in &definition.output_mappings {
            let value = nested
                .circuit
                .gate(mapping.gate_id.as_str())
                .is_some_and(|gate| gate.output());
            if let Some(slot) = outputs.get_mut(mapping.pin) {
                *slot = value;
            }
        }
        Ok((outputs, nested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesim_model::{Gate, GateKind};

    fn not_chain() -> Circuit {
        let mut circuit = Circuit::new();
        circuit.add_gate(Gate::input("a", true)).unwrap();
        circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
        circuit.add_gate(Gate::new("y", GateKind::Output)).unwrap();
        circuit.wire_up("w1", "a", "n", 0).unwrap();
        circuit.wire_up("w2", "n", "y", 0).unwrap();
        circuit
    }

    #[test]
    fn test_combinational_strategy() {
        let evaluation = Evaluator::default().evaluate(&not_chain(), 0.0).unwrap();
        assert_eq!(evaluation.strategy, Strategy::Combinational);
        assert_eq!(evaluation.iterations, 0);
        assert!(!evaluation.has_oscillation);
        assert_eq!(
            evaluation.evaluation_order,
            vec![GateId::from("a"), GateId::from("n"), GateId::from("y")]
        );
    }

    #[test]
    fn test_input_snapshot_untouched() {
        let circuit = not_chain();
        let before = circuit.clone();
        let _ = Evaluator::default().evaluate(&circuit, 0.0).unwrap();
        assert_eq!(circuit, before);
    }

    #[test]
    fn test_event_driven_strategy_for_bare_ring() {
        let mut circuit = Circuit::new();
        circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
        circuit.wire_up("w", "n", "n", 0).unwrap();
        let evaluation = Evaluator::default().evaluate(&circuit, 0.0).unwrap();
        assert_eq!(evaluation.strategy, Strategy::EventDriven);
        assert!(evaluation.has_oscillation);
        assert_eq!(evaluation.iterations, 20);
        assert_eq!(evaluation.unstable_gates, vec![GateId::from("n")]);
    }

    #[test]
    fn test_unknown_kind_is_a_fault() {
        let mut circuit = not_chain();
        circuit
            .add_gate(Gate::new("t", GateKind::Unknown("TRISTATE".to_string())))
            .unwrap();
        let evaluation = Evaluator::default().evaluate(&circuit, 0.0).unwrap();
        assert_eq!(
            evaluation.faults.get("t"),
            Some(&GateFault::UnknownKind {
                name: "TRISTATE".to_string()
            })
        );
        assert!(!evaluation.circuit.gate("t").unwrap().output());
        assert!(!evaluation.circuit.gate("y").unwrap().output());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EvaluatorConfig::default().with_max_iterations(0);
        assert!(Evaluator::new(config).is_err());
    }

    #[test]
    fn test_scope_guards() {
        let definition = CustomCircuit::default().with_definition_id("adder");
        let root = Scope::default();
        let inner = root.enter(&definition, 4).unwrap();
        assert!(inner.enter(&definition, 4).is_err());
        assert!(root.enter(&definition, 0).is_err());
    }
}
