// End-to-end behavior of the hybrid evaluator on small circuits:
// truth tables, sequential elements, feedback and wire consistency.

use gatesim_model::{Circuit, CustomCircuit, Endpoint, Gate, GateKind};
use gatesim_sim::{Evaluation, Evaluator, EvaluatorConfig, Strategy};

fn evaluate(circuit: &Circuit) -> Evaluation {
    Evaluator::default().evaluate(circuit, 0.0).unwrap()
}

fn output(evaluation: &Evaluation, id: &str) -> bool {
    evaluation.circuit.gate(id).unwrap().output()
}

/// Every wire mirrors the pin it leaves from
fn assert_wires_consistent(circuit: &Circuit) {
    for wire in &circuit.wires {
        let source = circuit.gate(wire.from.gate_id.as_str()).unwrap();
        let index = wire.from.output_index().unwrap();
        assert_eq!(
            wire.is_active,
            source.output_at(index),
            "wire '{}' disagrees with its source",
            wire.id
        );
    }
}

fn two_input(kind: GateKind, a: bool, b: bool) -> Circuit {
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("a", a)).unwrap();
    circuit.add_gate(Gate::input("b", b)).unwrap();
    circuit.add_gate(Gate::new("g", kind)).unwrap();
    circuit.add_gate(Gate::new("y", GateKind::Output)).unwrap();
    circuit.wire_up("wa", "a", "g", 0).unwrap();
    circuit.wire_up("wb", "b", "g", 1).unwrap();
    circuit.wire_up("wy", "g", "y", 0).unwrap();
    circuit
}

/// S and R inputs into an SR-LATCH whose Q and Q̄ feed two outputs
fn latch_circuit() -> Circuit {
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("s", false)).unwrap();
    circuit.add_gate(Gate::input("r", false)).unwrap();
    circuit.add_gate(Gate::new("latch", GateKind::SrLatch)).unwrap();
    circuit.add_gate(Gate::new("q", GateKind::Output)).unwrap();
    circuit.add_gate(Gate::new("q_bar", GateKind::Output)).unwrap();
    circuit.wire_up("ws", "s", "latch", 0).unwrap();
    circuit.wire_up("wr", "r", "latch", 1).unwrap();
    circuit
        .connect("wq", Endpoint::output("latch", 0), Endpoint::input("q", 0))
        .unwrap();
    circuit
        .connect("wqb", Endpoint::output("latch", 1), Endpoint::input("q_bar", 0))
        .unwrap();
    circuit
}

/// Cross-coupled NOR latch built from primitives
fn nor_latch() -> Circuit {
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("s", false)).unwrap();
    circuit.add_gate(Gate::input("r", false)).unwrap();
    circuit.add_gate(Gate::new("nor_q", GateKind::Nor)).unwrap();
    circuit.add_gate(Gate::new("nor_qb", GateKind::Nor)).unwrap();
    circuit.add_gate(Gate::new("q", GateKind::Output)).unwrap();
    circuit.wire_up("w1", "r", "nor_q", 0).unwrap();
    circuit.wire_up("w2", "nor_qb", "nor_q", 1).unwrap();
    circuit.wire_up("w3", "s", "nor_qb", 0).unwrap();
    circuit.wire_up("w4", "nor_q", "nor_qb", 1).unwrap();
    circuit.wire_up("w5", "nor_q", "q", 0).unwrap();
    circuit
}

fn ring_oscillator(with_delay: bool) -> Circuit {
    let mut circuit = Circuit::new();
    for id in ["n1", "n2", "n3"] {
        circuit.add_gate(Gate::new(id, GateKind::Not)).unwrap();
    }
    circuit.wire_up("w1", "n1", "n2", 0).unwrap();
    circuit.wire_up("w2", "n2", "n3", 0).unwrap();
    if with_delay {
        circuit.add_gate(Gate::delay("d", 1)).unwrap();
        circuit.wire_up("w3", "n3", "d", 0).unwrap();
        circuit.wire_up("w4", "d", "n1", 0).unwrap();
    } else {
        circuit.wire_up("w3", "n3", "n1", 0).unwrap();
    }
    circuit
}

#[test]
fn test_truth_tables_through_evaluator() {
    let cases: [(GateKind, fn(bool, bool) -> bool); 6] = [
        (GateKind::And, |a, b| a && b),
        (GateKind::Or, |a, b| a || b),
        (GateKind::Xor, |a, b| a != b),
        (GateKind::Nand, |a, b| !(a && b)),
        (GateKind::Nor, |a, b| !(a || b)),
        (GateKind::Xnor, |a, b| a == b),
    ];
    for (kind, expected) in cases {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let evaluation = evaluate(&two_input(kind.clone(), a, b));
            assert_eq!(output(&evaluation, "y"), expected(a, b), "{} {} {}", kind, a, b);
            assert_wires_consistent(&evaluation.circuit);
        }
    }
}

#[test]
fn test_input_not_output() {
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("a", true)).unwrap();
    circuit.add_gate(Gate::new("n", GateKind::Not)).unwrap();
    circuit.add_gate(Gate::new("y", GateKind::Output)).unwrap();
    circuit.wire_up("w1", "a", "n", 0).unwrap();
    circuit.wire_up("w2", "n", "y", 0).unwrap();

    let evaluation = evaluate(&circuit);
    let y = evaluation.circuit.gate("y").unwrap();
    assert_eq!(y.inputs, vec![false]);
    assert!(evaluation.circuit.wire("w1").unwrap().is_active);
    assert!(!evaluation.circuit.wire("w2").unwrap().is_active);
}

#[test]
fn test_and_follows_input_toggles() {
    let mut circuit = two_input(GateKind::And, true, true);
    let evaluator = Evaluator::default();

    let mut evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(output(&evaluation, "y"));

    circuit = evaluation.circuit;
    circuit.set_input_value("a", false).unwrap();
    evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(!output(&evaluation, "y"));

    circuit = evaluation.circuit;
    circuit.set_input_value("a", true).unwrap();
    evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(output(&evaluation, "y"));

    circuit = evaluation.circuit;
    circuit.set_input_value("b", false).unwrap();
    evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(!output(&evaluation, "y"));
}

#[test]
fn test_acyclic_evaluation_is_deterministic() {
    let circuit = two_input(GateKind::Xor, true, false);
    let first = evaluate(&circuit);
    let second = evaluate(&circuit);
    assert_eq!(first, second);
}

#[test]
fn test_sr_latch_set_hold_reset_hold() {
    let evaluator = Evaluator::default();
    let mut circuit = latch_circuit();
    let steps = [
        ((true, false), true),
        ((false, false), true),
        ((false, true), false),
        ((false, false), false),
    ];
    for ((s, r), q) in steps {
        circuit.set_input_value("s", s).unwrap();
        circuit.set_input_value("r", r).unwrap();
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert_eq!(output(&evaluation, "q"), q, "S={} R={}", s, r);
        assert_eq!(output(&evaluation, "q_bar"), !q);
        assert_wires_consistent(&evaluation.circuit);
        circuit = evaluation.circuit;
    }
}

#[test]
fn test_nor_latch_holds_through_feedback() {
    let evaluator = Evaluator::default();
    let mut circuit = nor_latch();
    let steps = [
        ((true, false), true),
        ((false, false), true),
        ((false, true), false),
        ((false, false), false),
    ];
    for ((s, r), q) in steps {
        circuit.set_input_value("s", s).unwrap();
        circuit.set_input_value("r", r).unwrap();
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert_eq!(evaluation.strategy, Strategy::Hybrid);
        assert!(!evaluation.has_oscillation);
        assert_eq!(output(&evaluation, "q"), q, "S={} R={}", s, r);
        assert_wires_consistent(&evaluation.circuit);
        circuit = evaluation.circuit;
    }
}

#[test]
fn test_d_flip_flop_captures_on_rising_edge_only() {
    let evaluator = Evaluator::default();
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("d", true)).unwrap();
    circuit.add_gate(Gate::input("clk", false)).unwrap();
    circuit.add_gate(Gate::new("ff", GateKind::DFlipFlop)).unwrap();
    circuit.add_gate(Gate::new("q", GateKind::Output)).unwrap();
    circuit.wire_up("wd", "d", "ff", 0).unwrap();
    circuit.wire_up("wc", "clk", "ff", 1).unwrap();
    circuit.wire_up("wq", "ff", "q", 0).unwrap();

    // (clk, expected Q)
    let steps = [
        (false, false),
        (false, false),
        (true, true),
        (true, true),
        (false, true),
    ];
    for (clk, q) in steps {
        circuit.set_input_value("clk", clk).unwrap();
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert_eq!(output(&evaluation, "q"), q, "clk={}", clk);
        circuit = evaluation.circuit;
    }

    // D drops while the clock is high: Q holds until the next rising edge
    circuit.set_input_value("clk", true).unwrap();
    circuit = evaluator.evaluate(&circuit, 0.0).unwrap().circuit;
    circuit.set_input_value("d", false).unwrap();
    let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(output(&evaluation, "q"));
    circuit = evaluation.circuit;

    circuit.set_input_value("clk", false).unwrap();
    circuit = evaluator.evaluate(&circuit, 0.0).unwrap().circuit;
    assert!(circuit.gate("q").unwrap().output());
    circuit.set_input_value("clk", true).unwrap();
    let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
    assert!(!output(&evaluation, "q"));
}

#[test]
fn test_ring_oscillator_with_delay_is_detected() {
    let evaluator = Evaluator::default();
    let mut circuit = ring_oscillator(true);
    for _ in 0..5 {
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert!(evaluation.has_oscillation);
        assert_eq!(evaluation.strategy, Strategy::EventDriven);
        assert!(evaluation.iterations <= evaluator.config().max_iterations);
        assert!(!evaluation.unstable_gates.is_empty());
        assert_eq!(evaluation.cyclic_gates.len(), 4);
        assert_wires_consistent(&evaluation.circuit);
        circuit = evaluation.circuit;
    }
}

#[test]
fn test_bare_not_ring_terminates() {
    let evaluator = Evaluator::new(EvaluatorConfig::default().with_max_iterations(1000)).unwrap();
    let evaluation = evaluator.evaluate(&ring_oscillator(false), 0.0).unwrap();
    assert!(evaluation.has_oscillation);
    assert_eq!(evaluation.iterations, 1000);
    assert_wires_consistent(&evaluation.circuit);
}

#[test]
fn test_downstream_of_cycle_sees_final_values() {
    let mut circuit = nor_latch();
    circuit.add_gate(Gate::new("inv", GateKind::Not)).unwrap();
    circuit.add_gate(Gate::new("q_bar", GateKind::Output)).unwrap();
    circuit.wire_up("w6", "nor_q", "inv", 0).unwrap();
    circuit.wire_up("w7", "inv", "q_bar", 0).unwrap();
    circuit.set_input_value("s", true).unwrap();

    let evaluation = evaluate(&circuit);
    assert!(output(&evaluation, "q"));
    assert!(!output(&evaluation, "inv"));
    assert!(!output(&evaluation, "q_bar"));
    assert_wires_consistent(&evaluation.circuit);
}

/// Set NOR latch whose Q feeds a DELAY line of `depth`
fn latch_into_delay(depth: usize) -> Circuit {
    let mut circuit = nor_latch();
    circuit.add_gate(Gate::delay("d", depth)).unwrap();
    circuit.wire_up("w6", "nor_q", "d", 0).unwrap();
    circuit.set_input_value("s", true).unwrap();
    circuit
}

#[test]
fn test_delay_after_cycle_shifts_once_per_call() {
    let evaluator = Evaluator::default();
    let mut circuit = latch_into_delay(3);
    let mut levels = Vec::new();
    for _ in 0..5 {
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert!(!evaluation.has_oscillation);
        assert!(evaluation.unstable_gates.is_empty());
        assert!(output(&evaluation, "q"));
        levels.push(output(&evaluation, "d"));
        circuit = evaluation.circuit;
    }
    assert_eq!(levels, vec![false, false, false, true, true]);
}

#[test]
fn test_deep_delay_after_settled_cycle_is_not_oscillation() {
    let evaluator = Evaluator::default();
    let mut circuit = latch_into_delay(30);
    for _ in 0..3 {
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert!(!evaluation.has_oscillation);
        assert!(evaluation.unstable_gates.is_empty());
        assert!(evaluation.iterations <= 2);
        assert!(!output(&evaluation, "d"));
        circuit = evaluation.circuit;
    }
}

#[test]
fn test_custom_delay_after_cycle_shifts_once_per_call() {
    let mut inner = Circuit::new();
    inner.add_gate(Gate::input("in", false)).unwrap();
    inner.add_gate(Gate::delay("line", 3)).unwrap();
    inner.add_gate(Gate::new("out", GateKind::Output)).unwrap();
    inner.wire_up("i1", "in", "line", 0).unwrap();
    inner.wire_up("i2", "line", "out", 0).unwrap();
    let definition = CustomCircuit::new(inner, &["in"], &["out"]).with_definition_id("delay-3");

    let mut circuit = nor_latch();
    circuit.add_gate(Gate::custom("late", definition)).unwrap();
    circuit.wire_up("w6", "nor_q", "late", 0).unwrap();
    circuit.set_input_value("s", true).unwrap();

    let evaluator = Evaluator::default();
    let mut levels = Vec::new();
    for _ in 0..4 {
        let evaluation = evaluator.evaluate(&circuit, 0.0).unwrap();
        assert!(!evaluation.has_oscillation);
        assert!(evaluation.faults.is_empty());
        levels.push(output(&evaluation, "late"));
        circuit = evaluation.circuit;
    }
    assert_eq!(levels, vec![false, false, false, true]);
}

#[test]
fn test_gate_between_cycles_feeds_settled_value() {
    // latch Q̄ -> NOT -> OR with its output fed back, a second cycle
    let mut circuit = nor_latch();
    circuit.add_gate(Gate::new("inv", GateKind::Not)).unwrap();
    circuit.add_gate(Gate::new("hold", GateKind::Or)).unwrap();
    circuit.wire_up("w6", "nor_qb", "inv", 0).unwrap();
    circuit.wire_up("w7", "inv", "hold", 0).unwrap();
    circuit.wire_up("w8", "hold", "hold", 1).unwrap();
    circuit.set_input_value("s", true).unwrap();

    let evaluation = evaluate(&circuit);
    assert!(!evaluation.has_oscillation);
    assert_eq!(evaluation.cyclic_gates.len(), 3);
    assert!(output(&evaluation, "inv"));
    assert!(output(&evaluation, "hold"));
    assert_wires_consistent(&evaluation.circuit);
}

#[test]
fn test_repeat_evaluation_is_idempotent() {
    let evaluator = Evaluator::default();
    let mut circuit = nor_latch();
    circuit.add_gate(Gate::clock("clk", 2.0)).unwrap();
    circuit.add_gate(Gate::new("led", GateKind::Output)).unwrap();
    circuit.wire_up("w6", "clk", "led", 0).unwrap();
    circuit.set_input_value("s", true).unwrap();

    let first = evaluator.evaluate(&circuit, 300.0).unwrap();
    let second = evaluator.evaluate(&first.circuit, 300.0).unwrap();
    let third = evaluator.evaluate(&second.circuit, 300.0).unwrap();
    assert_eq!(first.circuit, second.circuit);
    assert_eq!(second, third);
}

#[test]
fn test_counter_driven_by_clock() {
    let evaluator = Evaluator::default();
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::clock("clk", 1.0)).unwrap();
    circuit.add_gate(Gate::counter("count", 2)).unwrap();
    circuit.wire_up("w", "clk", "count", 0).unwrap();

    // Rising edges at 500 ms and 1500 ms
    let mut values = Vec::new();
    for now in [0.0, 250.0, 500.0, 750.0, 1000.0, 1250.0, 1500.0] {
        let evaluation = evaluator.evaluate(&circuit, now).unwrap();
        let counter = evaluation.circuit.gate("count").unwrap();
        values.push(counter.metadata.counter.unwrap().value);
        circuit = evaluation.circuit;
    }
    assert_eq!(values, vec![0, 0, 1, 1, 1, 1, 2]);
    let bits = &circuit.gate("count").unwrap().outputs;
    assert_eq!(bits, &vec![false, true]);
}

#[test]
fn test_mux_selects_data_line() {
    let mut circuit = Circuit::new();
    circuit.add_gate(Gate::input("d0", false)).unwrap();
    circuit.add_gate(Gate::input("d1", true)).unwrap();
    circuit.add_gate(Gate::input("sel", false)).unwrap();
    circuit.add_gate(Gate::new("mux", GateKind::Mux)).unwrap();
    circuit.wire_up("w0", "d0", "mux", 0).unwrap();
    circuit.wire_up("w1", "d1", "mux", 1).unwrap();
    circuit.wire_up("ws", "sel", "mux", 2).unwrap();

    assert!(!output(&evaluate(&circuit), "mux"));
    circuit.set_input_value("sel", true).unwrap();
    assert!(output(&evaluate(&circuit), "mux"));
}
