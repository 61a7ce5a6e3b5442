//! Run manifest: the audit document describing a run's inputs, configuration
//! and gate decisions. Its JSON shape is the one exported to users verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{EvidenceLevel, ProfileId, Sku};
use crate::wizard::WizardState;

use super::id::placeholder_sha256;
use super::model::Artifact;

pub const RULESET_VERSION: &str = "v0.2.1";

pub const SECURE_MODE_WARNING: &str = "Secure Mode enabled: URL collection disabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecureModeKind {
    Cloud,
    Airgap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureModeInfo {
    pub enabled: bool,
    pub mode: SecureModeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlInput {
    pub canonical: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestInputs {
    pub files: Vec<FileInput>,
    pub urls: Vec<UrlInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    Fast,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_evidence: u32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gates {
    pub mode: GateMode,
    pub thresholds: GateThresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOutputs {
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateResult {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub gate_id: String,
    pub result: GateResult,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub decisions: Vec<GateDecision>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub sku: Sku,
    pub profile_id: ProfileId,
    pub ruleset_version: String,
    pub secure_mode: SecureModeInfo,
    pub inputs: ManifestInputs,
    pub gates: Gates,
    pub outputs: ManifestOutputs,
    pub audit: Audit,
}

impl RunManifest {
    /// Build the manifest for a run about to be created from `inputs`.
    ///
    /// Output artifacts stay empty until the run succeeds.
    pub fn build(
        inputs: &WizardState,
        sku: Sku,
        profile_id: ProfileId,
        run_id: &str,
        created_at: DateTime<Utc>,
        max_url_count: usize,
    ) -> Self {
        let files = inputs
            .sources
            .files
            .iter()
            .map(|file| FileInput {
                filename: file.name.clone(),
                size_bytes: file.size_bytes,
                sha256: placeholder_sha256(),
            })
            .collect();
        let urls = inputs
            .sources
            .urls
            .iter()
            .map(|url| UrlInput {
                canonical: url.clone(),
                scraped_at: Some(created_at),
            })
            .collect();

        let fast = profile_id == ProfileId::P1;
        let gates = Gates {
            mode: if fast { GateMode::Fast } else { GateMode::Standard },
            thresholds: GateThresholds {
                min_evidence: match inputs.output.evidence_level {
                    EvidenceLevel::Minimal => 1,
                    EvidenceLevel::Standard => 2,
                },
                max_tokens: if fast { 50_000 } else { 100_000 },
            },
        };

        let decisions = vec![
            GateDecision {
                gate_id: "GATE_FILE_SIZE".to_string(),
                result: GateResult::Pass,
                reason: "All files are within the size limit".to_string(),
            },
            GateDecision {
                gate_id: "GATE_URL_COUNT".to_string(),
                result: GateResult::Pass,
                reason: format!(
                    "URL count: {}/{max_url_count}",
                    inputs.sources.urls.len()
                ),
            },
        ];
        let warnings = if inputs.secure_mode {
            vec![SECURE_MODE_WARNING.to_string()]
        } else {
            Vec::new()
        };

        Self {
            run_id: run_id.to_string(),
            created_at,
            sku,
            profile_id,
            ruleset_version: RULESET_VERSION.to_string(),
            secure_mode: SecureModeInfo {
                enabled: inputs.secure_mode,
                mode: if inputs.secure_mode {
                    SecureModeKind::Airgap
                } else {
                    SecureModeKind::Cloud
                },
            },
            inputs: ManifestInputs { files, urls },
            gates,
            outputs: ManifestOutputs::default(),
            audit: Audit {
                decisions,
                warnings,
            },
        }
    }

    /// Pretty-printed JSON, as downloaded or copied by users.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
