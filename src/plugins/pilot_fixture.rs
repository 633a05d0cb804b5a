//! Deterministic scenario the pilot runs against.
//!
//! The same scenario can be written to disk as an export directory, a plan
//! ingestion directory and an artisan directory, with the pilot's injected
//! faults carried into the documents, so `check-pipeline` and `diagnose`
//! observe the same defects the trace does.

use crate::core::checksum;
use crate::core::config::{
    ARTIFACTS_FILE, CHECKSUMS_FILE, EXPORT_CONTRACT_FILE, PipelineConfig, TASK_MAPPING_FILE,
};
use crate::core::contracts::{ArtifactIntent, ArtifactType, Contract, SchemaVersion};
use crate::core::error::ContractGateError;
use crate::core::payload;
use crate::plugins::diagnose::{
    EXECUTION_FILE, ExecutionRecord, IngestionPlan, PLAN_FILE, PlannedTask, ProducedOutput,
    TestOutcome,
};
use crate::plugins::pilot::PilotParams;
use crate::plugins::pipeline::{
    ArtifactsDocument, ChecksumLedger, DesignCalibration, ExportContract, FeatureEntry, GapEntry,
    ProvenanceDocument, TaskMappingDocument,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const PILOT_EXPORT_ID: &str = "EXP-PILOT-001";
pub const PILOT_PLAN_ID: &str = "PLAN-PILOT-001";
pub const PILOT_GENERATOR: &str = "contract-gate pilot";
pub const PILOT_TESTS_PASSED: u64 = 24;

struct FixtureArtifact {
    artifact_id: &'static str,
    artifact_type: ArtifactType,
    target_path: &'static str,
}

struct FixtureFeature {
    feature_id: &'static str,
    title: &'static str,
    artifacts: &'static [FixtureArtifact],
}

const FEATURES: &[FixtureFeature] = &[
    FixtureFeature {
        feature_id: "F-001",
        title: "Closed contract validation",
        artifacts: &[
            FixtureArtifact {
                artifact_id: "A-001",
                artifact_type: ArtifactType::Module,
                target_path: "src/contracts/validate.rs",
            },
            FixtureArtifact {
                artifact_id: "A-002",
                artifact_type: ArtifactType::Test,
                target_path: "src/contracts/validate_tests.rs",
            },
        ],
    },
    FixtureFeature {
        feature_id: "F-002",
        title: "Boundary enforcement",
        artifacts: &[FixtureArtifact {
            artifact_id: "A-003",
            artifact_type: ArtifactType::Module,
            target_path: "src/boundary/enforce.rs",
        }],
    },
    FixtureFeature {
        feature_id: "F-003",
        title: "Checksum chain gate",
        artifacts: &[FixtureArtifact {
            artifact_id: "A-004",
            artifact_type: ArtifactType::Module,
            target_path: "src/gates/checksum_chain.rs",
        }],
    },
    FixtureFeature {
        feature_id: "F-004",
        title: "Ordered diagnostic",
        artifacts: &[FixtureArtifact {
            artifact_id: "A-005",
            artifact_type: ArtifactType::Module,
            target_path: "src/diagnose/layers.rs",
        }],
    },
];

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub artifact_id: String,
    pub path: String,
    pub content: String,
}

impl GeneratedOutput {
    pub fn checksum(&self) -> String {
        checksum::sha256_hex(self.content.as_bytes())
    }
}

#[derive(Debug, Clone)]
pub struct PilotScenario {
    pub manifest: serde_json::Value,
    /// Hash of the manifest as captured at S1.
    pub baseline_checksum: String,
    /// Source hash the export observes; differs from the baseline when tampered.
    pub observed_checksum: String,
    pub export: ExportContract,
    pub artifacts: Vec<ArtifactIntent>,
    pub task_mapping: TaskMappingDocument,
    pub plan: IngestionPlan,
    pub outputs: Vec<GeneratedOutput>,
    pub tests: TestOutcome,
    pub calibration: DesignCalibration,
}

impl PilotScenario {
    pub fn build(params: &PilotParams) -> Result<Self, ContractGateError> {
        let mut gaps: Vec<GapEntry> = FEATURES
            .iter()
            .map(|f| GapEntry {
                gap_id: f.feature_id.to_string(),
                title: f.title.to_string(),
            })
            .collect();
        // A dropped feature is always one the manifest declared.
        if let Some(dropped) = &params.drop_feature {
            if !gaps.iter().any(|g| &g.gap_id == dropped) {
                gaps.push(GapEntry {
                    gap_id: dropped.clone(),
                    title: format!("Declared feature {}", dropped),
                });
            }
        }

        let manifest = json!({
            "manifest_id": "MAN-PILOT",
            "gaps": gaps,
        });
        let baseline_checksum = checksum::sha256_hex(&checksum::canonical_json_bytes(&manifest)?);
        let observed_checksum = params
            .source_checksum
            .clone()
            .unwrap_or_else(|| baseline_checksum.clone());

        let features: Vec<FeatureEntry> = gaps
            .iter()
            .map(|g| FeatureEntry {
                feature_id: g.gap_id.clone(),
                title: g.title.clone(),
            })
            .collect();

        let mut artifacts = Vec::new();
        let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut tasks = Vec::new();
        let mut outputs = Vec::new();
        for (index, gap) in gaps.iter().enumerate() {
            let task_id = format!("T-{:03}", index + 1);
            let fixture = FEATURES.iter().find(|f| f.feature_id == gap.gap_id);
            let fixture_artifacts = fixture.map(|f| f.artifacts).unwrap_or(&[]);
            for a in fixture_artifacts {
                artifacts.push(ArtifactIntent {
                    schema_version: SchemaVersion::V1,
                    artifact_id: a.artifact_id.to_string(),
                    artifact_type: a.artifact_type,
                    feature_id: gap.gap_id.clone(),
                    target_path: a.target_path.to_string(),
                    source_refs: vec![format!("manifest#{}", gap.gap_id)],
                    rationale: None,
                });
                mapping
                    .entry(a.artifact_id.to_string())
                    .or_default()
                    .push(task_id.clone());
                outputs.push(GeneratedOutput {
                    artifact_id: a.artifact_id.to_string(),
                    path: a.target_path.to_string(),
                    content: format!("// {}: {}\npub fn run() {{}}\n", a.artifact_id, gap.title),
                });
            }
            let feature_ids = if params.drop_feature.as_deref() == Some(gap.gap_id.as_str()) {
                Vec::new()
            } else {
                vec![gap.gap_id.clone()]
            };
            tasks.push(PlannedTask {
                task_id,
                feature_ids,
                artifact_ids: fixture_artifacts
                    .iter()
                    .map(|a| a.artifact_id.to_string())
                    .collect(),
            });
        }

        let export = ExportContract {
            schema_version: SchemaVersion::V1,
            export_id: PILOT_EXPORT_ID.to_string(),
            source_checksum: observed_checksum.clone(),
            gaps,
            features,
        };
        let task_mapping = TaskMappingDocument {
            schema_version: SchemaVersion::V1,
            mapping,
        };

        let mut scenario = PilotScenario {
            manifest,
            baseline_checksum,
            observed_checksum,
            export,
            artifacts,
            task_mapping,
            plan: IngestionPlan {
                schema_version: SchemaVersion::V1,
                plan_id: PILOT_PLAN_ID.to_string(),
                export_id: PILOT_EXPORT_ID.to_string(),
                source_checksums: BTreeMap::new(),
                tasks,
            },
            outputs,
            tests: TestOutcome {
                passed: PILOT_TESTS_PASSED,
                failed: params.test_failures,
            },
            calibration: DesignCalibration {
                schema_version: SchemaVersion::V1,
                baseline_score: 0.82,
                current_score: 0.80,
                tolerance: 0.05,
            },
        };
        scenario.plan.source_checksums = scenario.export_ledger()?;
        Ok(scenario)
    }

    pub fn gap_ids(&self) -> BTreeSet<String> {
        self.export.gaps.iter().map(|g| g.gap_id.clone()).collect()
    }

    pub fn export_feature_ids(&self) -> BTreeSet<String> {
        self.export.features.iter().map(|f| f.feature_id.clone()).collect()
    }

    pub fn artifact_ids(&self) -> BTreeSet<String> {
        self.artifacts.iter().map(|a| a.artifact_id.clone()).collect()
    }

    /// Export documents covered by the checksum ledger, as written to disk.
    fn ledger_documents(&self) -> Result<Vec<(&'static str, Vec<u8>)>, ContractGateError> {
        let artifacts = ArtifactsDocument {
            schema_version: SchemaVersion::V1,
            artifacts: self
                .artifacts
                .iter()
                .map(|a| a.to_payload())
                .collect::<Result<_, _>>()?,
        };
        Ok(vec![
            (EXPORT_CONTRACT_FILE, payload::render_json_bytes(&self.export)?),
            (ARTIFACTS_FILE, payload::render_json_bytes(&artifacts)?),
            (TASK_MAPPING_FILE, payload::render_json_bytes(&self.task_mapping)?),
        ])
    }

    /// Relative path -> hash for the ledger-covered export documents.
    pub fn export_ledger(&self) -> Result<BTreeMap<String, String>, ContractGateError> {
        Ok(self
            .ledger_documents()?
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), checksum::sha256_hex(&bytes)))
            .collect())
    }

    /// Output path -> hash of the generated content.
    pub fn package_ledger(&self) -> BTreeMap<String, String> {
        self.outputs
            .iter()
            .map(|o| (o.path.clone(), o.checksum()))
            .collect()
    }

    pub fn write_export(
        &self,
        dir: &Path,
        config: &PipelineConfig,
    ) -> Result<(), ContractGateError> {
        let mut files = BTreeMap::new();
        for (name, bytes) in self.ledger_documents()? {
            payload::write_bytes(&dir.join(name), &bytes)?;
            files.insert(name.to_string(), checksum::sha256_hex(&bytes));
        }
        payload::write_json_file(
            &dir.join(&config.provenance_file),
            &ProvenanceDocument {
                schema_version: SchemaVersion::V1,
                source_checksum: self.baseline_checksum.clone(),
                generator: PILOT_GENERATOR.to_string(),
                inputs: files.clone(),
            },
        )?;
        payload::write_json_file(&dir.join(&config.design_calibration_file), &self.calibration)?;
        payload::write_json_file(
            &dir.join(CHECKSUMS_FILE),
            &ChecksumLedger {
                schema_version: SchemaVersion::V1,
                algorithm: "sha256".to_string(),
                files,
            },
        )?;
        tracing::info!(dir = %dir.display(), "wrote pilot export fixture");
        Ok(())
    }

    pub fn write_ingestion(&self, dir: &Path) -> Result<(), ContractGateError> {
        payload::write_json_file(&dir.join(PLAN_FILE), &self.plan)?;
        tracing::info!(dir = %dir.display(), "wrote pilot ingestion fixture");
        Ok(())
    }

    pub fn write_artisan(&self, dir: &Path) -> Result<(), ContractGateError> {
        for output in &self.outputs {
            payload::write_bytes(&dir.join(&output.path), output.content.as_bytes())?;
        }
        let record = ExecutionRecord {
            schema_version: SchemaVersion::V1,
            plan_id: self.plan.plan_id.clone(),
            outputs: self
                .outputs
                .iter()
                .map(|o| ProducedOutput {
                    artifact_id: o.artifact_id.clone(),
                    path: o.path.clone(),
                    checksum: o.checksum(),
                })
                .collect(),
            tests: self.tests,
        };
        payload::write_json_file(&dir.join(EXECUTION_FILE), &record)?;
        tracing::info!(dir = %dir.display(), "wrote pilot artisan fixture");
        Ok(())
    }
}
