//! Event-driven evaluator
//!
//! Walks the stages after the acyclic prefix in condensation order. Each
//! cycle is iterated on its own: rounds re-evaluate its gates in id order,
//! each gate reading the most recently written outputs (Gauss-Seidel),
//! starting from the outputs the gates held after the previous call. A round
//! that leaves every output and every metadata section unchanged is a fixed
//! point; `max_iterations` rounds without one is an oscillation. Acyclic
//! gates between and after the cycles are evaluated once, when their source
//! cycles are done, so DELAY lines and CUSTOM gates there advance one step
//! per call.

use crate::analyzer::{CyclicPartition, Stage};
use crate::combinational::run_in_order;
use crate::error::EvalResult;
use crate::hybrid::{Evaluator, Scope};
use crate::netlist::Workspace;
use gatesim_model::{Circuit, GateId};
use tracing::{debug, trace};

/// Result of the fixed-point loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CyclicOutcome {
    pub has_oscillation: bool,
    /// Rounds run by the slowest cycle, including the one that confirmed
    /// convergence
    pub iterations: u32,
    /// Gates that changed in the last round of a cycle that did not settle
    pub unstable: Vec<GateId>,
}

impl CyclicOutcome {
    fn merge(&mut self, other: CyclicOutcome) {
        self.has_oscillation |= other.has_oscillation;
        self.iterations = self.iterations.max(other.iterations);
        self.unstable.extend(other.unstable);
    }
}

/// A [`Stage`] resolved to workspace positions
pub(crate) enum Steps {
    Once(usize),
    Iterate(Vec<usize>),
}

pub(crate) fn resolve_stages(ws: &Workspace<'_>, stages: &[Stage]) -> EvalResult<Vec<Steps>> {
    stages
        .iter()
        .map(|stage| match stage {
            Stage::Gate(id) => ws.position(id).map(Steps::Once),
            Stage::Cycle(members) => ws.positions(members).map(Steps::Iterate),
        })
        .collect()
}

/// Run every stage in order and combine the per-cycle outcomes
pub(crate) fn settle_stages(
    ws: &mut Workspace<'_>,
    stages: &[Steps],
    max_iterations: u32,
) -> CyclicOutcome {
    let mut outcome = CyclicOutcome::default();
    for stage in stages {
        match stage {
            Steps::Once(position) => run_in_order(ws, std::slice::from_ref(position)),
            Steps::Iterate(members) => {
                outcome.merge(iterate_to_fixed_point(ws, members, max_iterations))
            }
        }
    }
    outcome
}

fn iterate_to_fixed_point(
    ws: &mut Workspace<'_>,
    schedule: &[usize],
    max_iterations: u32,
) -> CyclicOutcome {
    let mut previous = ws.state(schedule);
    let mut changed = Vec::new();

    for round in 1..=max_iterations {
        for &position in schedule {
            ws.step(position);
        }
        let current = ws.state(schedule);
        changed = schedule
            .iter()
            .zip(previous.iter().zip(&current))
            .filter(|(_, (before, after))| before != after)
            .map(|(&position, _)| position)
            .collect();
        trace!("round {}: {} gates changed", round, changed.len());

        if changed.is_empty() {
            return CyclicOutcome {
                has_oscillation: false,
                iterations: round,
                unstable: Vec::new(),
            };
        }
        previous = current;
    }

    let unstable: Vec<GateId> = changed.iter().map(|&position| ws.gate_id(position).clone()).collect();
    debug!(
        "no fixed point after {} rounds; {} gates still changing",
        max_iterations,
        unstable.len()
    );
    CyclicOutcome {
        has_oscillation: true,
        iterations: max_iterations,
        unstable,
    }
}

impl Evaluator {
    /// Run only the event-driven stages of `partition`
    ///
    /// Gates outside the schedule keep their current outputs. The bound is
    /// the configured `max_iterations`, applied to each cycle.
    pub fn evaluate_cyclic(
        &self,
        circuit: &Circuit,
        partition: &CyclicPartition,
        now: f64,
    ) -> EvalResult<(Circuit, CyclicOutcome)> {
        let scope = Scope::default();
        let mut ws = Workspace::new(circuit, now, self, &scope)?;
        let stages = resolve_stages(&ws, &partition.stages)?;
        let outcome = settle_stages(&mut ws, &stages, self.config().max_iterations);
        let (circuit, _, _) = ws.finish();
        Ok((circuit, outcome))
    }
}
