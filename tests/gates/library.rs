use contract_gate::core::contracts::Severity;
use contract_gate::core::gates::{
    self, GateChecker, GateKind, PHASE_EXPORT, PHASE_INGESTION, checksum_chain, gap_parity,
    mapping_completeness,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn ledger(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn checksum_chain_passes_on_identical_maps() {
    let expected = ledger(&[("a.json", "sha256:01"), ("b.json", "sha256:02")]);
    let r = checksum_chain("checksum-chain", "EXP-1", &expected, &expected.clone());
    assert!(r.passed);
    assert_eq!(r.phase, PHASE_INGESTION);
    assert_eq!(r.severity, Severity::Blocking);
}

#[test]
fn checksum_chain_names_the_changed_key() {
    let expected = ledger(&[("a.json", "sha256:01"), ("b.json", "sha256:02")]);
    let mut actual = expected.clone();
    actual.insert("b.json".into(), "sha256:ff".into());
    let r = checksum_chain("checksum-chain", "EXP-1", &expected, &actual);
    assert!(!r.passed);
    assert!(r.reason.contains("b.json"));
    assert!(!r.reason.contains("a.json"));
}

#[test]
fn checksum_chain_reports_missing_keys_and_ignores_extras() {
    let expected = ledger(&[("a.json", "sha256:01")]);
    let actual = ledger(&[("z.json", "sha256:09")]);
    let r = checksum_chain("checksum-chain", "EXP-1", &expected, &actual);
    assert!(!r.passed);
    assert!(r.reason.contains("missing from actual: a.json"));

    let extra_only = ledger(&[("a.json", "sha256:01"), ("z.json", "sha256:09")]);
    assert!(checksum_chain("checksum-chain", "EXP-1", &expected, &extra_only).passed);
}

#[test]
fn mapping_completeness_lists_unmapped_ids() {
    let mapping: BTreeMap<String, Vec<String>> =
        [("A-1".to_string(), vec!["T-1".to_string()])].into();
    let r = mapping_completeness("mapping", "EXP-1", &set(&["A-1", "A-2", "A-3"]), &mapping);
    assert!(!r.passed);
    assert!(r.reason.contains("A-2, A-3"));
    assert!(
        mapping_completeness("mapping", "EXP-1", &set(&["A-1"]), &mapping).passed
    );
}

#[test]
fn large_mismatch_sets_name_every_key() {
    let files: Vec<String> = (0..15).map(|i| format!("f{:02}.json", i)).collect();
    let expected: BTreeMap<String, String> = files
        .iter()
        .map(|f| (f.clone(), "sha256:01".to_string()))
        .collect();
    let actual: BTreeMap<String, String> = files
        .iter()
        .map(|f| (f.clone(), "sha256:ff".to_string()))
        .collect();
    let r = checksum_chain("checksum-chain", "EXP-1", &expected, &actual);
    assert!(!r.passed);
    for f in &files {
        assert!(r.reason.contains(f.as_str()), "{}", r.reason);
        assert!(r.next_action.contains(f.as_str()));
    }
    assert!(!r.reason.contains("total)"));
}

#[test]
fn large_unmapped_sets_name_every_id() {
    let ids: BTreeSet<String> = (0..20).map(|i| format!("A-{:03}", i)).collect();
    let mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let r = mapping_completeness("mapping", "EXP-1", &ids, &mapping);
    assert!(!r.passed);
    assert!(r.reason.starts_with("20 of 20 artifact(s) unmapped"));
    for id in &ids {
        assert!(r.reason.contains(id.as_str()), "{}", r.reason);
    }
}

#[test]
fn large_gap_differences_name_every_feature() {
    let gaps: BTreeSet<String> = (0..14).map(|i| format!("F-{:03}", i)).collect();
    let r = gap_parity("gap-parity", "EXP-1", &gaps, &BTreeSet::new());
    assert!(!r.passed);
    for id in &gaps {
        assert!(r.reason.contains(id.as_str()));
    }
}

#[test]
fn gap_parity_equal_sets_pass() {
    let r = gap_parity("gap-parity", "EXP-1", &set(&["a", "b", "c"]), &set(&["a", "b", "c"]));
    assert!(r.passed);
    assert_eq!(r.phase, PHASE_EXPORT);
}

#[test]
fn gap_parity_names_dropped_gap() {
    let r = gap_parity("gap-parity", "EXP-1", &set(&["a", "b", "c"]), &set(&["a", "b"]));
    assert!(!r.passed);
    assert!(r.reason.contains("dropped (gap without feature): c"));
    assert!(!r.reason.contains("extra"));
}

#[test]
fn gap_parity_reports_both_directions() {
    let r = gap_parity("gap-parity", "EXP-1", &set(&["a", "b"]), &set(&["b", "x"]));
    assert!(!r.passed);
    assert!(r.reason.contains("dropped (gap without feature): a"));
    assert!(r.reason.contains("extra (feature without gap): x"));
}

#[test]
fn checker_accumulates_in_order_and_filters_blocking() {
    let mut checker = GateChecker::new("run-1");
    checker.record(gap_parity("g1", "T", &set(&["a"]), &set(&["a"])));
    checker.record(gates::design_calibration("design", "T", 0.9, 0.1, 0.05));
    checker.record(gap_parity("g2", "T", &set(&["a"]), &set(&[])));
    checker.record(gap_parity("g3", "T", &set(&[]), &set(&["b"])));

    assert_eq!(checker.len(), 4);
    assert!(checker.has_blocking_failure());
    let blocking: Vec<&str> = checker
        .blocking_failures()
        .iter()
        .map(|r| r.gate_id.as_str())
        .collect();
    assert_eq!(blocking, vec!["g2", "g3"]);
    assert_eq!(checker.first_blocking_failure().unwrap().gate_id, "g2");
    assert_eq!(checker.warnings().len(), 1);
    let order: Vec<&str> = checker.results().iter().map(|r| r.gate_id.as_str()).collect();
    assert_eq!(order, vec!["g1", "design", "g2", "g3"]);
}

#[test]
fn warnings_alone_are_not_blocking() {
    let mut checker = GateChecker::new("run-2");
    checker.record(gates::design_calibration("design", "T", 0.9, 0.1, 0.05));
    assert!(!checker.has_blocking_failure());
    assert!(checker.blocking_failures().is_empty());
}

#[test]
fn checkers_are_independent_per_run() {
    let mut a = GateChecker::new("run-a");
    let b = GateChecker::new("run-b");
    a.record(gap_parity("g", "T", &set(&["a"]), &set(&[])));
    assert!(a.has_blocking_failure());
    assert!(!b.has_blocking_failure());
    assert_eq!(b.run_id(), "run-b");
}

#[test]
fn evaluate_payload_decodes_each_gate_kind() {
    let checksum = gates::evaluate_payload(
        GateKind::Checksum,
        "cc",
        "T",
        &json!({"expected": {"a": "sha256:1"}, "actual": {"a": "sha256:2"}}),
    )
    .unwrap();
    assert!(!checksum.passed);

    let mapping = gates::evaluate_payload(
        GateKind::Mapping,
        "mc",
        "T",
        &json!({"artifact_ids": ["A-1"], "task_mapping": {"A-1": ["T-1"]}}),
    )
    .unwrap();
    assert!(mapping.passed);

    let gap = gates::evaluate_payload(
        GateKind::Gap,
        "gp",
        "T",
        &json!({"gap_ids": ["a", "b", "c"], "feature_ids": ["a", "b"]}),
    )
    .unwrap();
    assert!(gap.reason.contains("c"));
}

#[test]
fn gate_results_validate_as_contracts() {
    use contract_gate::core::contracts::Contract;
    let r = gap_parity("gap-parity", "EXP-1", &set(&["a"]), &set(&["b"]));
    assert!(r.violations().unwrap().is_empty());
}
