//! Dependency analysis
//!
//! Builds the gate dependency graph (an edge A -> B for every wire from an
//! output of A to an input of B), finds its strongly connected components and
//! partitions the gates for the hybrid evaluator.
//!
//! Components are ordered along the condensation with Kahn's algorithm, always
//! releasing the ready component whose smallest gate id sorts first, so the
//! result is stable for a fixed graph regardless of the order gates and
//! wires were added in. The gates reachable from a cycle are further split
//! into [`Stage`]s along that order: each cycle is one stage, iterated to a
//! fixed point, and each acyclic gate after a cycle is a stage of its own,
//! evaluated exactly once.

use gatesim_model::{Gate, GateId, Wire};
use indexmap::IndexMap;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

static NO_CYCLES: BTreeSet<GateId> = BTreeSet::new();

/// Result of [`analyze`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyAnalysis {
    /// No cycles; `order` is a topological order over every gate
    Acyclic { order: Vec<GateId> },
    /// At least one cycle
    Cyclic(CyclicPartition),
}

/// One step of the event-driven schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// An acyclic gate after a cycle; evaluated once
    Gate(GateId),
    /// The gates of one cycle, sorted by id; iterated until they settle
    Cycle(Vec<GateId>),
}

impl Stage {
    pub fn gates(&self) -> &[GateId] {
        match self {
            Stage::Gate(id) => std::slice::from_ref(id),
            Stage::Cycle(members) => members,
        }
    }
}

/// Gate partition of a circuit containing cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicPartition {
    /// Acyclic gates not reachable from any cycle, in topological order
    pub prefix: Vec<GateId>,
    /// Every gate reachable from a cycle (cycle members included), in
    /// condensation order with ids sorted inside each cycle
    pub schedule: Vec<GateId>,
    /// Acyclic gates reachable from a cycle, in topological order
    pub downstream: Vec<GateId>,
    /// Gates that sit on a cycle
    pub cyclic: BTreeSet<GateId>,
    /// Each cycle's gates, sorted by id
    pub cycles: Vec<Vec<GateId>>,
    /// `schedule` split into cycles and single gates, in the same order
    pub stages: Vec<Stage>,
}

impl DependencyAnalysis {
    /// Topological order over the acyclic gates
    ///
    /// For a cyclic circuit this is the prefix followed by the downstream
    /// gates; cycle members are excluded.
    pub fn order(&self) -> Vec<GateId> {
        match self {
            DependencyAnalysis::Acyclic { order } => order.clone(),
            DependencyAnalysis::Cyclic(partition) => partition
                .prefix
                .iter()
                .chain(&partition.downstream)
                .cloned()
                .collect(),
        }
    }

    pub fn cyclic_gate_ids(&self) -> &BTreeSet<GateId> {
        match self {
            DependencyAnalysis::Acyclic { .. } => &NO_CYCLES,
            DependencyAnalysis::Cyclic(partition) => &partition.cyclic,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, DependencyAnalysis::Cyclic(_))
    }
}

/// Analyze the dependency structure of `gates` and `wires`
///
/// Wires naming gates that are not present are ignored; structural
/// validation is the model's job.
pub fn analyze(gates: &[Gate], wires: &[Wire]) -> DependencyAnalysis {
    let mut graph = DiGraph::<usize, ()>::with_capacity(gates.len(), wires.len());
    let mut nodes: IndexMap<&str, NodeIndex> = IndexMap::with_capacity(gates.len());
    for (position, gate) in gates.iter().enumerate() {
        let node = graph.add_node(position);
        nodes.insert(gate.id.as_str(), node);
    }

    for wire in wires {
        if let (Some(&source), Some(&target)) = (
            nodes.get(wire.from.gate_id.as_str()),
            nodes.get(wire.to.gate_id.as_str()),
        ) {
            graph.add_edge(source, target, ());
        }
    }

    let sccs = kosaraju_scc(&graph);
    let mut component_of = vec![0usize; graph.node_count()];
    for (component, members) in sccs.iter().enumerate() {
        for node in members {
            component_of[node.index()] = component;
        }
    }

    let is_cycle: Vec<bool> = sccs
        .iter()
        .map(|members| {
            members.len() > 1
                || members
                    .first()
                    .is_some_and(|&node| graph.contains_edge(node, node))
        })
        .collect();

    // Condensation edges; duplicates are counted consistently on both sides
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); sccs.len()];
    let mut in_degree = vec![0usize; sccs.len()];
    for edge in graph.raw_edges() {
        let from = component_of[edge.source().index()];
        let to = component_of[edge.target().index()];
        if from != to {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    let sorted_members: Vec<Vec<GateId>> = sccs
        .iter()
        .map(|members| {
            let mut ids: Vec<GateId> = members
                .iter()
                .map(|&node| gates[graph[node]].id.clone())
                .collect();
            ids.sort();
            ids
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<(&GateId, usize)>> = BinaryHeap::new();
    for (component, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            if let Some(key) = sorted_members[component].first() {
                ready.push(Reverse((key, component)));
            }
        }
    }

    let mut tainted = is_cycle.clone();
    let mut prefix = Vec::new();
    let mut schedule = Vec::new();
    let mut downstream = Vec::new();
    let mut cyclic = BTreeSet::new();
    let mut cycles = Vec::new();
    let mut stages = Vec::new();

    while let Some(Reverse((_, component))) = ready.pop() {
        let members = &sorted_members[component];
        if tainted[component] {
            schedule.extend(members.iter().cloned());
            if is_cycle[component] {
                cyclic.extend(members.iter().cloned());
                cycles.push(members.clone());
                stages.push(Stage::Cycle(members.clone()));
            } else {
                downstream.extend(members.iter().cloned());
                stages.extend(members.iter().cloned().map(Stage::Gate));
            }
        } else {
            prefix.extend(members.iter().cloned());
        }

        for &next in &successors[component] {
            if tainted[component] {
                tainted[next] = true;
            }
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                if let Some(key) = sorted_members[next].first() {
                    ready.push(Reverse((key, next)));
                }
            }
        }
    }

    if cycles.is_empty() {
        DependencyAnalysis::Acyclic { order: prefix }
    } else {
        DependencyAnalysis::Cyclic(CyclicPartition {
            prefix,
            schedule,
            downstream,
            cyclic,
            cycles,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatesim_model::{Circuit, GateKind};

    fn ids(names: &[&str]) -> Vec<GateId> {
        names.iter().map(|&name| GateId::from(name)).collect()
    }

    fn chain() -> Circuit {
        let mut circuit = Circuit::new();
        circuit.add_gate(Gate::new("y", GateKind::Output)).unwrap();
        circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
        circuit.add_gate(Gate::input("a", true)).unwrap();
        circuit.wire_up("w2", "n", "y", 0).unwrap();
        circuit.wire_up("w1", "a", "n", 0).unwrap();
        circuit
    }

    #[test]
    fn test_acyclic_topological_order() {
        let circuit = chain();
        let analysis = analyze(&circuit.gates, &circuit.wires);
        assert!(!analysis.is_cyclic());
        assert!(analysis.cyclic_gate_ids().is_empty());
        assert_eq!(analysis.order(), ids(&["a", "n", "y"]));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut circuit = Circuit::new();
        for id in ["c", "a", "b"] {
            circuit.add_gate(Gate::input(id, false)).unwrap();
        }
        circuit.add_gate(Gate::new("g", GateKind::And)).unwrap();
        circuit.wire_up("w1", "c", "g", 0).unwrap();
        circuit.wire_up("w2", "b", "g", 1).unwrap();
        let analysis = analyze(&circuit.gates, &circuit.wires);
        assert_eq!(analysis.order(), ids(&["a", "b", "c", "g"]));
    }

    #[test]
    fn test_order_is_stable_across_insertion_order() {
        let mut reversed = chain();
        reversed.gates.reverse();
        reversed.wires.reverse();
        assert_eq!(
            analyze(&chain().gates, &chain().wires),
            analyze(&reversed.gates, &reversed.wires)
        );
    }

    #[test]
    fn test_partition_around_latch() {
        // s, r -> cross-coupled NOR pair -> y
        let mut circuit = Circuit::new();
        circuit.add_gate(Gate::input("s", false)).unwrap();
        circuit.add_gate(Gate::input("r", false)).unwrap();
        circuit.add_gate(Gate::new("nor1", GateKind::Nor)).unwrap();
        circuit.add_gate(Gate::new("nor2", GateKind::Nor)).unwrap();
        circuit.add_gate(Gate::new("y", GateKind::Output)).unwrap();
        circuit.wire_up("w1", "r", "nor1", 0).unwrap();
        circuit.wire_up("w2", "s", "nor2", 0).unwrap();
        circuit.wire_up("w3", "nor2", "nor1", 1).unwrap();
        circuit.wire_up("w4", "nor1", "nor2", 1).unwrap();
        circuit.wire_up("w5", "nor1", "y", 0).unwrap();

        let analysis = analyze(&circuit.gates, &circuit.wires);
        let DependencyAnalysis::Cyclic(partition) = &analysis else {
            panic!("expected a cycle");
        };
        assert_eq!(partition.prefix, ids(&["r", "s"]));
        assert_eq!(partition.schedule, ids(&["nor1", "nor2", "y"]));
        assert_eq!(partition.downstream, ids(&["y"]));
        assert_eq!(partition.cycles, vec![ids(&["nor1", "nor2"])]);
        assert_eq!(
            partition.stages,
            vec![
                Stage::Cycle(ids(&["nor1", "nor2"])),
                Stage::Gate(GateId::from("y"))
            ]
        );
        assert_eq!(
            analysis.cyclic_gate_ids().iter().cloned().collect::<Vec<_>>(),
            ids(&["nor1", "nor2"])
        );
        assert_eq!(analysis.order(), ids(&["r", "s", "y"]));
    }

    #[test]
    fn test_self_loop_is_cyclic() {
        let mut circuit = Circuit::new();
        circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
        circuit.wire_up("w", "n", "n", 0).unwrap();
        let analysis = analyze(&circuit.gates, &circuit.wires);
        assert_eq!(
            analysis.cyclic_gate_ids().iter().cloned().collect::<Vec<_>>(),
            ids(&["n"])
        );
    }

    #[test]
    fn test_independent_cycles() {
        let mut circuit = Circuit::new();
        for id in ["b1", "b2", "a1", "a2"] {
            circuit.add_gate(Gate::new(id, GateKind::Not)).unwrap();
        }
        circuit.wire_up("w1", "a1", "a2", 0).unwrap();
        circuit.wire_up("w2", "a2", "a1", 0).unwrap();
        circuit.wire_up("w3", "b1", "b2", 0).unwrap();
        circuit.wire_up("w4", "b2", "b1", 0).unwrap();
        let DependencyAnalysis::Cyclic(partition) = analyze(&circuit.gates, &circuit.wires) else {
            panic!("expected cycles");
        };
        assert_eq!(partition.cycles, vec![ids(&["a1", "a2"]), ids(&["b1", "b2"])]);
        assert!(partition.prefix.is_empty());
        assert!(partition.downstream.is_empty());
    }

    #[test]
    fn test_gate_between_cycles_is_its_own_stage() {
        // ring a feeds x, x feeds ring b
        let mut circuit = Circuit::new();
        for id in ["a1", "a2", "b1", "b2"] {
            circuit.add_gate(Gate::new(id, GateKind::Or)).unwrap();
        }
        circuit.add_gate(Gate::new("x", GateKind::Not)).unwrap();
        circuit.wire_up("w1", "a1", "a2", 0).unwrap();
        circuit.wire_up("w2", "a2", "a1", 0).unwrap();
        circuit.wire_up("w3", "a2", "x", 0).unwrap();
        circuit.wire_up("w4", "x", "b1", 0).unwrap();
        circuit.wire_up("w5", "b1", "b2", 0).unwrap();
        circuit.wire_up("w6", "b2", "b1", 1).unwrap();
        let DependencyAnalysis::Cyclic(partition) = analyze(&circuit.gates, &circuit.wires) else {
            panic!("expected cycles");
        };
        assert_eq!(
            partition.stages,
            vec![
                Stage::Cycle(ids(&["a1", "a2"])),
                Stage::Gate(GateId::from("x")),
                Stage::Cycle(ids(&["b1", "b2"])),
            ]
        );
        let flattened: Vec<GateId> = partition
            .stages
            .iter()
            .flat_map(|stage| stage.gates().iter().cloned())
            .collect();
        assert_eq!(flattened, partition.schedule);
    }
}
