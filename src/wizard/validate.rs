//! Client-side checks: per-step navigation guards and source limits.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalog::Sku;
use crate::error::{DpackError, ErrorCode};

use super::state::{SourceFile, WizardState};

const MIB: u64 = 1024 * 1024;

/// Upload and URL limits applied while filling the sources step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_url_count: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_file_size: 50 * MIB,
            max_total_size: 150 * MIB,
            max_url_count: 30,
        }
    }
}

/// Check that `file` may be added to the current sources.
pub fn validate_file(
    state: &WizardState,
    file: &SourceFile,
    limits: &InputLimits,
) -> Result<(), DpackError> {
    if file.size_bytes > limits.max_file_size {
        return Err(DpackError::validation_with(
            ErrorCode::UploadTooLarge,
            format!(
                "{}: file exceeds {}MB",
                file.name,
                limits.max_file_size / MIB
            ),
        ));
    }

    let total = state.sources.total_file_size() + file.size_bytes;
    if total > limits.max_total_size {
        return Err(DpackError::validation_with(
            ErrorCode::UploadTotalExceeded,
            format!("total file size exceeds {}MB", limits.max_total_size / MIB),
        ));
    }

    Ok(())
}

/// Check that `raw` is an absolute URL that may be added, returning it trimmed.
pub fn validate_url(
    state: &WizardState,
    raw: &str,
    limits: &InputLimits,
) -> Result<String, DpackError> {
    if state.secure_mode {
        return Err(DpackError::validation_with(
            ErrorCode::ValidationRange,
            "URL sources are disabled in secure mode",
        ));
    }

    let candidate = raw.trim();
    if Url::parse(candidate).is_err() {
        return Err(DpackError::validation_with(
            ErrorCode::UrlInvalid,
            format!("not a valid URL: {candidate}"),
        ));
    }

    if state.sources.urls.len() >= limits.max_url_count {
        return Err(DpackError::validation_with(
            ErrorCode::UrlLimitExceeded,
            format!("at most {} URLs may be added", limits.max_url_count),
        ));
    }

    Ok(candidate.to_string())
}

fn required(what: &str) -> DpackError {
    DpackError::validation_with(ErrorCode::ValidationRequired, format!("{what} is required"))
}

/// Guard for leaving the current step with `NextStep`.
pub fn check_step(state: &WizardState) -> Result<(), DpackError> {
    match state.current_step {
        0 => {
            if state.sku.is_none() {
                return Err(required("SKU"));
            }
            if state.profile_id.is_none() {
                return Err(required("profile"));
            }
            Ok(())
        }
        1 => match state.sku {
            Some(Sku::Grant) => {
                let named = state
                    .context
                    .grant
                    .as_ref()
                    .is_some_and(|g| !g.project_name.trim().is_empty());
                if named { Ok(()) } else { Err(required("project name")) }
            }
            Some(Sku::Rfp) => match &state.context.rfp {
                Some(rfp) if rfp.agency.trim().is_empty() => Err(required("agency")),
                Some(rfp) if rfp.scope.trim().is_empty() => Err(required("scope")),
                Some(_) => Ok(()),
                None => Err(required("agency")),
            },
            None => Err(required("SKU")),
        },
        2 => {
            if state.sources.files.is_empty() && state.sources.urls.is_empty() {
                Err(required("at least one file or URL"))
            } else {
                Ok(())
            }
        }
        3 => {
            if state.output.formats.is_empty() {
                Err(required("at least one output format"))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

/// Guard for the final submit on the review step.
pub fn check_submit(state: &WizardState, disclosure_agreed: bool) -> Result<(), DpackError> {
    if state.run_name.trim().is_empty() {
        return Err(required("run name"));
    }
    if !disclosure_agreed {
        return Err(required("AI disclosure acknowledgement"));
    }
    Ok(())
}
