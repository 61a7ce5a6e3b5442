use serde::{Deserialize, Serialize};

use crate::catalog::{EvidenceLevel, OutputFormat, ProfileId, Sku};

/// Index of the last wizard step (review & submit).
pub const LAST_STEP: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantContext {
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpContext {
    pub agency: String,
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<GrantContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfp: Option<RfpContext>,
}

/// Metadata of a local source file. Contents are never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub files: Vec<SourceFile>,
    pub urls: Vec<String>,
}

impl Sources {
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub formats: Vec<OutputFormat>,
    pub evidence_level: EvidenceLevel,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Pdf],
            evidence_level: EvidenceLevel::Standard,
        }
    }
}

impl OutputOptions {
    pub fn includes(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// In-memory form state of the five-step wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub current_step: u8,
    pub sku: Option<Sku>,
    pub profile_id: Option<ProfileId>,
    pub secure_mode: bool,
    pub run_name: String,
    pub context: WizardContext,
    pub sources: Sources,
    pub output: OutputOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    SetSku(Sku),
    SetProfile(ProfileId),
    SetSecureMode(bool),
    SetRunName(String),
    SetGrantContext(GrantContext),
    SetRfpContext(RfpContext),
    AddFile(SourceFile),
    RemoveFile(usize),
    AddUrl(String),
    RemoveUrl(usize),
    SetOutputFormats(Vec<OutputFormat>),
    SetEvidenceLevel(EvidenceLevel),
    NextStep,
    PrevStep,
    Reset,
}

impl WizardState {
    /// Apply one action and return the next state.
    ///
    /// Each action replaces one slice of the state. The only cross-field
    /// effect is that enabling secure mode clears the URL list.
    pub fn reduce(self, action: WizardAction) -> Self {
        let mut state = self;
        match action {
            WizardAction::SetSku(sku) => state.sku = Some(sku),
            WizardAction::SetProfile(profile) => state.profile_id = Some(profile),
            WizardAction::SetSecureMode(enabled) => {
                state.secure_mode = enabled;
                if enabled {
                    state.sources.urls.clear();
                }
            }
            WizardAction::SetRunName(name) => state.run_name = name,
            WizardAction::SetGrantContext(grant) => state.context.grant = Some(grant),
            WizardAction::SetRfpContext(rfp) => state.context.rfp = Some(rfp),
            WizardAction::AddFile(file) => state.sources.files.push(file),
            WizardAction::RemoveFile(index) => {
                if index < state.sources.files.len() {
                    state.sources.files.remove(index);
                }
            }
            WizardAction::AddUrl(url) => state.sources.urls.push(url),
            WizardAction::RemoveUrl(index) => {
                if index < state.sources.urls.len() {
                    state.sources.urls.remove(index);
                }
            }
            WizardAction::SetOutputFormats(formats) => state.output.formats = formats,
            WizardAction::SetEvidenceLevel(level) => state.output.evidence_level = level,
            WizardAction::NextStep => {
                state.current_step = state.current_step.saturating_add(1).min(LAST_STEP);
            }
            WizardAction::PrevStep => {
                state.current_step = state.current_step.saturating_sub(1);
            }
            WizardAction::Reset => state = WizardState::default(),
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> SourceFile {
        SourceFile {
            name: name.into(),
            size_bytes: size,
        }
    }

    #[test]
    fn initial_state_defaults() {
        let state = WizardState::default();
        assert_eq!(state.current_step, 0);
        assert!(state.sku.is_none());
        assert!(state.profile_id.is_none());
        assert!(!state.secure_mode);
        assert_eq!(state.output.formats, vec![OutputFormat::Pdf]);
        assert_eq!(state.output.evidence_level, EvidenceLevel::Standard);
    }

    #[test]
    fn steps_are_clamped() {
        let mut state = WizardState::default().reduce(WizardAction::PrevStep);
        assert_eq!(state.current_step, 0);
        for _ in 0..10 {
            state = state.reduce(WizardAction::NextStep);
        }
        assert_eq!(state.current_step, LAST_STEP);
        state = state.reduce(WizardAction::PrevStep);
        assert_eq!(state.current_step, 3);
    }

    #[test]
    fn enabling_secure_mode_clears_urls() {
        let state = WizardState::default()
            .reduce(WizardAction::AddUrl("https://a.example/rfp".into()))
            .reduce(WizardAction::AddUrl("https://b.example/spec".into()))
            .reduce(WizardAction::AddFile(file("scope.pdf", 10)))
            .reduce(WizardAction::SetSecureMode(true));
        assert!(state.secure_mode);
        assert!(state.sources.urls.is_empty());
        assert_eq!(state.sources.files.len(), 1);
    }

    #[test]
    fn disabling_secure_mode_keeps_sources() {
        let state = WizardState::default()
            .reduce(WizardAction::AddFile(file("a.pdf", 1)))
            .reduce(WizardAction::SetSecureMode(false));
        assert!(!state.secure_mode);
        assert_eq!(state.sources.files.len(), 1);
    }

    #[test]
    fn remove_by_index_and_ignore_out_of_range() {
        let state = WizardState::default()
            .reduce(WizardAction::AddFile(file("a.pdf", 1)))
            .reduce(WizardAction::AddFile(file("b.pdf", 2)))
            .reduce(WizardAction::AddUrl("https://x.example".into()))
            .reduce(WizardAction::RemoveFile(0))
            .reduce(WizardAction::RemoveFile(7))
            .reduce(WizardAction::RemoveUrl(3));
        assert_eq!(state.sources.files, vec![file("b.pdf", 2)]);
        assert_eq!(state.sources.urls.len(), 1);

        let state = state.reduce(WizardAction::RemoveUrl(0));
        assert!(state.sources.urls.is_empty());
    }

    #[test]
    fn context_slices_are_independent() {
        let state = WizardState::default()
            .reduce(WizardAction::SetGrantContext(GrantContext {
                project_name: "Smart farm".into(),
                announcement_url: None,
            }))
            .reduce(WizardAction::SetRfpContext(RfpContext {
                agency: "Ministry".into(),
                scope: "Disaster response".into(),
            }));
        assert_eq!(state.context.grant.unwrap().project_name, "Smart farm");
        assert_eq!(state.context.rfp.unwrap().agency, "Ministry");
    }

    #[test]
    fn reset_returns_initial_state() {
        let state = WizardState::default()
            .reduce(WizardAction::SetSku(Sku::Rfp))
            .reduce(WizardAction::SetRunName("x".into()))
            .reduce(WizardAction::NextStep)
            .reduce(WizardAction::Reset);
        assert_eq!(state, WizardState::default());
    }

    #[test]
    fn output_slice_updates() {
        let state = WizardState::default()
            .reduce(WizardAction::SetOutputFormats(vec![
                OutputFormat::Pdf,
                OutputFormat::Pptx,
            ]))
            .reduce(WizardAction::SetEvidenceLevel(EvidenceLevel::Minimal));
        assert!(state.output.includes(OutputFormat::Pptx));
        assert!(!state.output.includes(OutputFormat::Docx));
        assert_eq!(state.output.evidence_level, EvidenceLevel::Minimal);
    }

    #[test]
    fn total_file_size_sums_metadata() {
        let state = WizardState::default()
            .reduce(WizardAction::AddFile(file("a", 100)))
            .reduce(WizardAction::AddFile(file("b", 250)));
        assert_eq!(state.sources.total_file_size(), 350);
    }
}
