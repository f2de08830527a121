//! End-to-end tests for the alignment interpreter.
//!
//! Alignments are built the way a planner would hand them over (JSON or the
//! builder API) and run against a real foundry with async callables.

use operant_core::foundry::{Contract, Foundry, Processor, Switcher};
use operant_core::interpreter::Operator;
use operant_core::medium::{JsonLinesMedium, NodeRef, Step};
use operant_core::model::{
    record, Alignment, Egress, Ingress, Order, Param, Process, Record, Switch, Value, VirtualType,
};
use operant_core::{Fault, FaultKind, OperateConfig};
use proptest::prelude::*;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn count_of(input: &Record) -> i64 {
    input
        .get("count")
        .and_then(|p| p.value.as_integer())
        .unwrap_or_default()
}

fn counting_foundry() -> Foundry {
    let zero = Processor::builder()
        .name("zero")
        .description("starts a counter")
        .input_contract(Contract::new())
        .output("count", VirtualType::integer("counter"))
        .handler(|_| async move { Ok(record([("count", 0i64)])) })
        .build()
        .expect("zero should build");

    let increment = Processor::builder()
        .name("increment")
        .input("count", VirtualType::integer("counter"))
        .output("count", VirtualType::integer("counter plus one"))
        .handler(|input: Record| async move { Ok(record([("count", count_of(&input) + 1)])) })
        .build()
        .expect("increment should build");

    let below_three = Switcher::builder()
        .name("below_three")
        .input("count", VirtualType::integer("counter"))
        .output_when_true_contract(Contract::new())
        .output_when_false("count", VirtualType::integer("final counter"))
        .handler(|input: Record| async move { Ok((count_of(&input) < 3, input)) })
        .build()
        .expect("below_three should build");

    let spin = Switcher::builder()
        .name("spin")
        .input_contract(Contract::new())
        .output_when_true_contract(Contract::new())
        .output_when_false_contract(Contract::new())
        .handler(|_| async move { Ok((true, Record::new())) })
        .build()
        .expect("spin should build");

    Foundry::register(vec![zero, increment], vec![below_three, spin]).expect("foundry should register")
}

fn retry_loop() -> Alignment {
    Alignment::default()
        .then(Ingress::new("prompt", "init"))
        .then(Process::new("init", "zero", "bump").output("count", "counter"))
        .then(
            Process::new("bump", "increment", "check")
                .input("count", "counter")
                .output("count", "counter"),
        )
        .then(
            Switch::new("check", "below_three", "bump", "done")
                .input("count", "counter")
                .output_when_false("count", "final"),
        )
        .then(Egress::new("done").field("attempts", "final"))
}

fn self_loop() -> Alignment {
    Alignment::default()
        .then(Ingress::new("prompt", "spin"))
        .then(Switch::new("spin", "spin", "spin", "done"))
        .then(Egress::new("done"))
}

// ---------------------------------------------------------------------------
// Test 1: a switch-driven cycle terminates on its own
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_retry_loop_terminates() {
    let foundry = counting_foundry();
    let report = Operator::new(&foundry)
        .run(&retry_loop(), Order::new("go"))
        .await;

    let output = report.outcome.as_ref().expect("loop should finish");
    assert_eq!(output.get("attempts"), Some(&Value::Integer(3)));
    assert_eq!(report.steps, 9);
    assert_eq!(
        report
            .visited
            .iter()
            .filter(|n| **n == NodeRef::Process("bump".to_string()))
            .count(),
        3
    );
}

// ---------------------------------------------------------------------------
// Test 2: alignments arrive as JSON from a planner
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_alignment_from_planner_json() {
    let json = r#"{
        "operations": [
            {"kind": "ingress", "promptAddr": "prompt", "next": "init"},
            {"kind": "process", "name": "init", "apparatus": "zero",
             "outputs": {"count": "n"}, "next": "bump"},
            {"kind": "process", "name": "bump", "apparatus": "increment",
             "inputs": {"count": "n"}, "outputs": {"count": "n"}, "next": "done"},
            {"kind": "egress", "name": "done", "result": {"value": "n", "prompt": "prompt"}}
        ]
    }"#;

    let alignment = Alignment::from_json(json).expect("planner JSON should parse");
    let foundry = counting_foundry();
    let output = Operator::new(&foundry)
        .operate(&alignment, Order::new("count once"))
        .await
        .expect("run should succeed");

    assert_eq!(output.get("value"), Some(&Value::Integer(1)));
    assert_eq!(output.get("prompt"), Some(&Value::from("count once")));
}

// ---------------------------------------------------------------------------
// Test 3: malformed JSON and broken graphs never reach the interpreter
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_invalid_alignments_rejected() {
    let fault = Alignment::from_json("{\"operations\": 7}").expect_err("should not parse");
    assert_eq!(fault.kind(), FaultKind::Structural);

    let dangling = Alignment::default()
        .then(Ingress::new("prompt", "init"))
        .then(Process::new("init", "zero", "nowhere"))
        .then(Egress::new("done"));

    let foundry = counting_foundry();
    let report = Operator::new(&foundry).run(&dangling, Order::new("x")).await;

    assert!(matches!(report.outcome, Err(Fault::Structural(_))));
    assert!(report.env.is_empty());
}

// ---------------------------------------------------------------------------
// Test 4: the JSON lines medium writes a replayable trace
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_json_lines_trace_to_file() {
    let file = tempfile::NamedTempFile::new().expect("should create temp file");
    let writer = file.reopen().expect("should reopen temp file");

    let foundry = counting_foundry();
    Operator::new(&foundry)
        .with_medium(Arc::new(JsonLinesMedium::new(writer)))
        .operate(&retry_loop(), Order::new("trace me"))
        .await
        .expect("run should succeed");

    let reader = BufReader::new(file.reopen().expect("should reopen temp file"));
    let steps: Vec<Step> = reader
        .lines()
        .map(|line| serde_json::from_str(&line.expect("line should read")).expect("step JSON"))
        .collect();

    assert_eq!(steps.len(), 9);
    assert_eq!(steps[0].node, NodeRef::Ingress);
    assert_eq!(steps[8].node, NodeRef::Egress("done".to_string()));
    assert_eq!(steps[7].branch, Some(false));
    assert_eq!(
        steps[2].outputs.get("count").map(|p: &Param| p.value.clone()),
        Some(Value::Integer(1))
    );
}

// ---------------------------------------------------------------------------
// Test 5: limits loaded from a config file apply to the run
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_config_file_limits_run() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("operant.toml");
    std::fs::write(&path, "max_steps = 5\n").expect("should write config");

    let config = OperateConfig::from_file(&path).expect("config should load");
    let foundry = counting_foundry();
    let fault = Operator::new(&foundry)
        .with_config(config)
        .operate(&retry_loop(), Order::new("go"))
        .await
        .expect_err("five steps are not enough");

    assert!(matches!(fault, Fault::StepLimitExceeded { limit: 5, .. }));
}

// ---------------------------------------------------------------------------
// Property: every run of a cycle stops exactly one step past the ceiling
// ---------------------------------------------------------------------------
proptest! {
    #[test]
    fn prop_step_ceiling_bounds_cycles(max_steps in 1u64..64) {
        let foundry = counting_foundry();
        let alignment = self_loop();
        let operator = Operator::new(&foundry)
            .with_config(OperateConfig::new().with_max_steps(max_steps));

        let report = tokio_test::block_on(operator.run(&alignment, Order::new("spin")));

        prop_assert_eq!(report.steps, max_steps);
        prop_assert_eq!(report.visited.len() as u64, max_steps);
        prop_assert!(
            matches!(report.outcome, Err(Fault::StepLimitExceeded { limit, .. }) if limit == max_steps),
            "unexpected outcome: {:?}",
            report.outcome
        );
    }
}
