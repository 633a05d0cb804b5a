use contract_gate::core::config::GatesConfig;
use contract_gate::core::schemas::ContractKind;
use contract_gate::core::validate;
use contract_gate::plugins::pilot::{PilotParams, run_pilot};
use contract_gate::plugins::pilot_fixture::PilotScenario;
use contract_gate::plugins::pipeline::check_pipeline;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn bench_check_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_pipeline");
    group.measurement_time(Duration::from_secs(10));

    let config = GatesConfig::default();
    for (label, params) in [
        ("healthy", PilotParams::default()),
        (
            "stale_source",
            PilotParams {
                source_checksum: Some("sha256:STALE".into()),
                ..PilotParams::default()
            },
        ),
    ] {
        let temp_dir = TempDir::new().unwrap();
        PilotScenario::build(&params)
            .unwrap()
            .write_export(temp_dir.path(), &config.pipeline)
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(label), &temp_dir, |b, dir| {
            b.iter(|| black_box(check_pipeline(dir.path(), &config).unwrap()));
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let valid = json!({
        "schema_version": "v1",
        "gate_id": "checksum-chain",
        "task_id": "T-001",
        "phase": "export",
        "passed": true,
        "severity": "blocking",
        "reason": "all 3 recorded checksum(s) match",
        "next_action": "none",
        "checked_at": "0Z"
    });
    group.bench_function("gate_result_valid", |b| {
        b.iter(|| black_box(validate::validate(ContractKind::GateResult, &valid)));
    });

    let broken = json!({"schema_version": "v2", "extra": 1, "passed": "yes"});
    group.bench_function("gate_result_broken", |b| {
        b.iter(|| black_box(validate::validate(ContractKind::GateResult, &broken)));
    });

    group.finish();
}

fn bench_pilot(c: &mut Criterion) {
    let config = GatesConfig::default();
    c.bench_function("pilot_full_trace", |b| {
        b.iter(|| black_box(run_pilot(&PilotParams::default(), &config.pilot).unwrap()));
    });
}

criterion_group!(benches, bench_check_pipeline, bench_validate, bench_pilot);
criterion_main!(benches);
