use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ArtifactType, EvidenceLevel, OutputFormat, ProfileId, Sku};
use crate::wizard::{OutputOptions, WizardState};

use super::id::placeholder_sha256;
use super::manifest::RunManifest;
use super::status::RunStatus;

const KIB: u64 = 1024;

/// Error payload attached to a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RunError {
    /// Fixed payload for the simulated failure outcome.
    pub fn simulated_failure() -> Self {
        Self {
            code: "ERR-RUN-FAILED".to_string(),
            message: "An error occurred during processing.".to_string(),
            details: Some("Mock API: simulated failure (20% rate)".to_string()),
        }
    }
}

/// Descriptor of a generated output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactType,
    pub filename: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Artifact {
    fn new(kind: ArtifactType, filename: String, size_bytes: u64, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            filename,
            sha256: placeholder_sha256(),
            size_bytes: Some(size_bytes),
            created_at: Some(now),
        }
    }
}

/// Artifact list produced when a run succeeds.
///
/// The PDF pack and the manifest are always present; DOCX and PPTX follow the
/// selected formats and the evidence CSV follows the standard evidence level.
pub fn synthesize_artifacts(
    run_id: &str,
    output: &OutputOptions,
    now: DateTime<Utc>,
) -> Vec<Artifact> {
    let mut artifacts = vec![
        Artifact::new(
            ArtifactType::PackPdf,
            format!("Pack_{run_id}.pdf"),
            500 * KIB,
            now,
        ),
        Artifact::new(
            ArtifactType::RunManifestJson,
            format!("Run_Manifest_{run_id}.json"),
            50 * KIB,
            now,
        ),
    ];

    if output.includes(OutputFormat::Docx) {
        artifacts.push(Artifact::new(
            ArtifactType::PackDocx,
            format!("Pack_{run_id}.docx"),
            600 * KIB,
            now,
        ));
    }
    if output.includes(OutputFormat::Pptx) {
        artifacts.push(Artifact::new(
            ArtifactType::PackPptx,
            format!("Pack_{run_id}.pptx"),
            800 * KIB,
            now,
        ));
    }
    if output.evidence_level == EvidenceLevel::Standard {
        artifacts.push(Artifact::new(
            ArtifactType::EvidenceCsv,
            format!("Evidence_{run_id}.csv"),
            100 * KIB,
            now,
        ));
    }

    artifacts
}

/// List entry for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub sku: Sku,
    pub profile_id: ProfileId,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub run_name: String,
}

/// One invocation of the decision-pack workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sku: Sku,
    pub profile_id: ProfileId,
    pub run_name: String,
    pub status: RunStatus,
    pub inputs: WizardState,
    pub manifest: RunManifest,
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl Run {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            sku: self.sku,
            profile_id: self.profile_id,
            status: self.status,
            created_at: self.created_at,
            run_name: self.run_name.clone(),
        }
    }

    /// Milliseconds elapsed between creation and `now`.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_milliseconds()
    }

    /// Copy safe to persist: source file entries are dropped, their metadata
    /// survives in the manifest.
    pub fn persistable(&self) -> Self {
        let mut run = self.clone();
        run.inputs.sources.files.clear();
        run
    }
}

/// Note kept about a failed run so its inputs and error can be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardKnowledge {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub inputs: WizardState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Stamped by the store on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl DiscardKnowledge {
    pub fn from_run(run: &Run, note: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            run_id: run.run_id.clone(),
            error: run.error.clone(),
            inputs: run.inputs.clone(),
            created_at: now,
            note,
            saved_at: None,
        }
    }
}
