use contract_gate::core::config::GatesConfig;
use contract_gate::plugins::diagnose::{
    DiagnosticInputs, EXECUTION_FILE, GATE_OUTPUT_CHECKSUMS, GATE_OUTPUT_CONTAINMENT,
    GATE_PLAN_EXPORT_IDENTITY, GATE_PLAN_GAP_PARITY, GATE_TEST_OUTCOME, Layer, PLAN_FILE,
    SkipCause, diagnose, render_text,
};
use contract_gate::plugins::pilot::PilotParams;
use contract_gate::plugins::pilot_fixture::PilotScenario;
use contract_gate::plugins::pipeline::GATE_PROVENANCE_CONSISTENCY;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    export: std::path::PathBuf,
    ingestion: std::path::PathBuf,
    artisan: std::path::PathBuf,
}

impl Fixture {
    fn new(params: &PilotParams) -> Self {
        let root = TempDir::new().expect("tmpdir");
        let export = root.path().join("export");
        let ingestion = root.path().join("plan");
        let artisan = root.path().join("artisan");
        let scenario = PilotScenario::build(params).expect("scenario");
        scenario
            .write_export(&export, &GatesConfig::default().pipeline)
            .expect("export");
        scenario.write_ingestion(&ingestion).expect("ingestion");
        scenario.write_artisan(&artisan).expect("artisan");
        Self {
            _root: root,
            export,
            ingestion,
            artisan,
        }
    }

    fn all(&self) -> DiagnosticInputs<'_> {
        DiagnosticInputs {
            export_dir: &self.export,
            ingestion_dir: Some(self.ingestion.as_path()),
            artisan_dir: Some(self.artisan.as_path()),
        }
    }
}

#[test]
fn clean_pipeline_answers_all_three_questions() {
    let fx = Fixture::new(&PilotParams::default());
    let result = diagnose(fx.all(), &GatesConfig::default());

    assert!(result.all_passed, "{}", render_text(&result));
    assert_eq!(result.start_here, None);
    assert_eq!(result.questions.len(), 3);
    assert!(result.questions.iter().all(|q| q.passed && !q.skipped));
    assert!(!result.gate_results.is_empty());
    assert!(render_text(&result).contains("All evaluated layers passed."));
}

#[test]
fn export_failure_skips_downstream_layers() {
    let fx = Fixture::new(&PilotParams {
        source_checksum: Some("sha256:STALE".into()),
        ..PilotParams::default()
    });
    let result = diagnose(fx.all(), &GatesConfig::default());

    assert!(!result.all_passed);
    assert_eq!(result.start_here, Some(Layer::Export));
    let q1 = result.question(Layer::Export).unwrap();
    assert!(q1.is_failure());
    assert_eq!(q1.failed_gate.as_deref(), Some(GATE_PROVENANCE_CONSISTENCY));
    for layer in [Layer::Ingestion, Layer::Execution] {
        let q = result.question(layer).unwrap();
        assert!(q.skipped);
        assert!(!q.passed);
        assert_eq!(q.skip_cause, Some(SkipCause::UpstreamFailed));
    }
}

#[test]
fn unsupplied_layers_are_skipped_not_failed() {
    let fx = Fixture::new(&PilotParams::default());
    let result = diagnose(
        DiagnosticInputs {
            export_dir: &fx.export,
            ingestion_dir: None,
            artisan_dir: None,
        },
        &GatesConfig::default(),
    );

    assert!(result.all_passed);
    assert_eq!(result.start_here, None);
    let q2 = result.question(Layer::Ingestion).unwrap();
    assert!(q2.skipped);
    assert_eq!(q2.skip_cause, Some(SkipCause::InputNotSupplied));
    assert!(!q2.is_failure());
}

#[test]
fn dropped_feature_is_an_ingestion_problem() {
    let fx = Fixture::new(&PilotParams {
        drop_feature: Some("F-003".into()),
        ..PilotParams::default()
    });
    let result = diagnose(fx.all(), &GatesConfig::default());

    assert_eq!(result.start_here, Some(Layer::Ingestion));
    let q2 = result.question(Layer::Ingestion).unwrap();
    assert_eq!(q2.failed_gate.as_deref(), Some(GATE_PLAN_GAP_PARITY));
    assert!(q2.reason.as_deref().unwrap().contains("F-003"));
    assert_eq!(
        result.question(Layer::Execution).unwrap().skip_cause,
        Some(SkipCause::UpstreamFailed)
    );
    assert!(render_text(&result).contains("Start here: ingestion layer"));
}

#[test]
fn plan_for_another_export_fails_identity() {
    let fx = Fixture::new(&PilotParams::default());
    let plan_path = fx.ingestion.join(PLAN_FILE);
    let mut plan: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    plan["export_id"] = serde_json::json!("EXP-OTHER");
    fs::write(&plan_path, serde_json::to_vec_pretty(&plan).unwrap()).unwrap();

    let result = diagnose(fx.all(), &GatesConfig::default());
    let q2 = result.question(Layer::Ingestion).unwrap();
    assert_eq!(q2.failed_gate.as_deref(), Some(GATE_PLAN_EXPORT_IDENTITY));
}

#[test]
fn failing_tests_are_an_execution_problem() {
    let fx = Fixture::new(&PilotParams {
        test_failures: 2,
        ..PilotParams::default()
    });
    let result = diagnose(fx.all(), &GatesConfig::default());

    assert_eq!(result.start_here, Some(Layer::Execution));
    let q3 = result.question(Layer::Execution).unwrap();
    assert_eq!(q3.failed_gate.as_deref(), Some(GATE_TEST_OUTCOME));
    assert!(result.question(Layer::Ingestion).unwrap().passed);
}

#[test]
fn edited_output_fails_output_checksums() {
    let fx = Fixture::new(&PilotParams::default());
    fs::write(
        fx.artisan.join("src/boundary/enforce.rs"),
        "// hand edited\n",
    )
    .unwrap();

    let result = diagnose(fx.all(), &GatesConfig::default());
    let q3 = result.question(Layer::Execution).unwrap();
    assert_eq!(q3.failed_gate.as_deref(), Some(GATE_OUTPUT_CHECKSUMS));
    assert!(q3.reason.as_deref().unwrap().contains("src/boundary/enforce.rs"));
}

/// Points the first recorded output at `relocate(original)`, keeping its hash.
fn relocate_first_output(fx: &Fixture, relocate: impl Fn(&str) -> String) -> String {
    let record_path = fx.artisan.join(EXECUTION_FILE);
    let bytes = fs::read(&record_path).unwrap();
    let mut record: Value = serde_json::from_slice(&bytes).unwrap();
    let original = record["outputs"][0]["path"].as_str().unwrap().to_string();
    let moved = relocate(&original);
    record["outputs"][0]["path"] = Value::String(moved.clone());
    let pretty = serde_json::to_vec_pretty(&record).unwrap();
    fs::write(&record_path, pretty).unwrap();
    moved
}

#[test]
fn absolute_output_path_fails_containment() {
    let fx = Fixture::new(&PilotParams::default());
    let outside = fx._root.path().join("outside.rs");
    let moved = relocate_first_output(&fx, |original| {
        fs::copy(fx.artisan.join(original), &outside).unwrap();
        outside.to_string_lossy().to_string()
    });

    let result = diagnose(fx.all(), &GatesConfig::default());
    assert_eq!(result.start_here, Some(Layer::Execution));
    let q3 = result.question(Layer::Execution).unwrap();
    assert!(q3.is_failure());
    assert_eq!(q3.failed_gate.as_deref(), Some(GATE_OUTPUT_CONTAINMENT));
    assert!(q3.reason.as_deref().unwrap().contains(&moved));
}

#[test]
fn parent_relative_output_path_fails_containment() {
    let fx = Fixture::new(&PilotParams::default());
    relocate_first_output(&fx, |original| {
        let target = fx._root.path().join("outside.rs");
        fs::copy(fx.artisan.join(original), target).unwrap();
        "../outside.rs".to_string()
    });

    let result = diagnose(fx.all(), &GatesConfig::default());
    let q3 = result.question(Layer::Execution).unwrap();
    assert_eq!(q3.failed_gate.as_deref(), Some(GATE_OUTPUT_CONTAINMENT));
    assert!(q3.reason.as_deref().unwrap().contains("../outside.rs"));
}

#[test]
fn missing_plan_file_fails_ingestion() {
    let fx = Fixture::new(&PilotParams::default());
    fs::remove_file(fx.ingestion.join(PLAN_FILE)).unwrap();

    let result = diagnose(fx.all(), &GatesConfig::default());
    let q2 = result.question(Layer::Ingestion).unwrap();
    assert!(q2.is_failure());
    assert_eq!(q2.failed_gate, None);
    assert!(q2.reason.as_deref().unwrap().contains("plan.json not found"));
    assert!(q2.next_action.is_some());
}
