//! Product catalog: SKUs, profiles and the output options a run can request.
//!
//! Every enum serializes to the exact wire string used in stored runs and
//! manifests (`DP_GRANT`, `P2`, `PACK_PDF`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DpackError, ErrorCode};

/// Product variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sku {
    #[serde(rename = "DP_GRANT")]
    Grant,
    #[serde(rename = "DP_RFP")]
    Rfp,
}

impl Sku {
    pub const ALL: [Sku; 2] = [Sku::Grant, Sku::Rfp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sku::Grant => "DP_GRANT",
            Sku::Rfp => "DP_RFP",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sku::Grant => "DP-Grant",
            Sku::Rfp => "DP-RFP",
        }
    }
}

/// User experience tier controlling which optional features are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileId {
    P1,
    P2,
    P3,
}

impl ProfileId {
    pub const ALL: [ProfileId; 3] = [ProfileId::P1, ProfileId::P2, ProfileId::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileId::P1 => "P1",
            ProfileId::P2 => "P2",
            ProfileId::P3 => "P3",
        }
    }

    /// Progressive-disclosure feature set for this profile.
    pub fn features(&self) -> ProfileFeatures {
        match self {
            ProfileId::P1 => ProfileFeatures {
                secure_mode: false,
                quick_pass: false,
                switching_slots: 0,
                advanced_gates: false,
            },
            ProfileId::P2 => ProfileFeatures {
                secure_mode: true,
                quick_pass: false,
                switching_slots: 3,
                advanced_gates: true,
            },
            ProfileId::P3 => ProfileFeatures {
                secure_mode: true,
                quick_pass: true,
                switching_slots: 5,
                advanced_gates: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileFeatures {
    pub secure_mode: bool,
    pub quick_pass: bool,
    pub switching_slots: u8,
    pub advanced_gates: bool,
}

/// Secure mode is only offered for RFP packs on profiles that expose it.
pub fn secure_mode_available(sku: Option<Sku>, profile: Option<ProfileId>) -> bool {
    matches!(sku, Some(Sku::Rfp)) && profile.is_some_and(|p| p.features().secure_mode)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Pdf,
    Docx,
    Pptx,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "PDF",
            OutputFormat::Docx => "DOCX",
            OutputFormat::Pptx => "PPTX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    Minimal,
    #[default]
    Standard,
}

impl EvidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLevel::Minimal => "minimal",
            EvidenceLevel::Standard => "standard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    PackPdf,
    PackDocx,
    PackPptx,
    EvidenceCsv,
    DiscardLogCsv,
    RunManifestJson,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::PackPdf => "PACK_PDF",
            ArtifactType::PackDocx => "PACK_DOCX",
            ArtifactType::PackPptx => "PACK_PPTX",
            ArtifactType::EvidenceCsv => "EVIDENCE_CSV",
            ArtifactType::DiscardLogCsv => "DISCARD_LOG_CSV",
            ArtifactType::RunManifestJson => "RUN_MANIFEST_JSON",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })+
    };
}

display_as_str!(Sku, ProfileId, OutputFormat, EvidenceLevel, ArtifactType);

fn format_error(kind: &str, value: &str) -> DpackError {
    DpackError::validation_with(
        ErrorCode::ValidationFormat,
        format!("unknown {kind}: {value}"),
    )
}

impl FromStr for Sku {
    type Err = DpackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "DP_GRANT" | "GRANT" => Ok(Sku::Grant),
            "DP_RFP" | "RFP" => Ok(Sku::Rfp),
            _ => Err(format_error("SKU", s)),
        }
    }
}

impl FromStr for ProfileId {
    type Err = DpackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P1" => Ok(ProfileId::P1),
            "P2" => Ok(ProfileId::P2),
            "P3" => Ok(ProfileId::P3),
            _ => Err(format_error("profile", s)),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DpackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PDF" => Ok(OutputFormat::Pdf),
            "DOCX" => Ok(OutputFormat::Docx),
            "PPTX" => Ok(OutputFormat::Pptx),
            _ => Err(format_error("output format", s)),
        }
    }
}

impl FromStr for EvidenceLevel {
    type Err = DpackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(EvidenceLevel::Minimal),
            "standard" => Ok(EvidenceLevel::Standard),
            _ => Err(format_error("evidence level", s)),
        }
    }
}
