use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::run::RunStatus;

/// Locked error-code table shared by validation, the run API and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR-UPLOAD-002")]
    UploadTooLarge,
    #[serde(rename = "ERR-UPLOAD-003")]
    UploadTotalExceeded,
    #[serde(rename = "ERR-URL-001")]
    UrlInvalid,
    #[serde(rename = "ERR-URL-002")]
    UrlLimitExceeded,
    #[serde(rename = "ERR-VAL-001")]
    ValidationRequired,
    #[serde(rename = "ERR-VAL-002")]
    ValidationFormat,
    #[serde(rename = "ERR-VAL-003")]
    ValidationRange,
    #[serde(rename = "ERR-RUN-002")]
    RunNotFound,
    #[serde(rename = "ERR-RUN-003")]
    RunInvalidState,
    #[serde(rename = "ERR-SYS-001")]
    SystemUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UploadTooLarge => "ERR-UPLOAD-002",
            ErrorCode::UploadTotalExceeded => "ERR-UPLOAD-003",
            ErrorCode::UrlInvalid => "ERR-URL-001",
            ErrorCode::UrlLimitExceeded => "ERR-URL-002",
            ErrorCode::ValidationRequired => "ERR-VAL-001",
            ErrorCode::ValidationFormat => "ERR-VAL-002",
            ErrorCode::ValidationRange => "ERR-VAL-003",
            ErrorCode::RunNotFound => "ERR-RUN-002",
            ErrorCode::RunInvalidState => "ERR-RUN-003",
            ErrorCode::SystemUnavailable => "ERR-SYS-001",
        }
    }

    /// Fixed user-facing message for the code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::UploadTooLarge => "The file exceeds the size limit.",
            ErrorCode::UploadTotalExceeded => "The total file size exceeds the limit.",
            ErrorCode::UrlInvalid => "The URL format is invalid.",
            ErrorCode::UrlLimitExceeded => "Too many URLs.",
            ErrorCode::ValidationRequired => "A required field is missing.",
            ErrorCode::ValidationFormat => "The input format is invalid.",
            ErrorCode::ValidationRange => "The input value is out of range.",
            ErrorCode::RunNotFound => "Run not found.",
            ErrorCode::RunInvalidState => "The run is not in a valid state for this action.",
            ErrorCode::SystemUnavailable => "The system is unavailable.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DpackError {
    /// A client-side check rejected user input.
    #[error("[{code}] {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("[ERR-RUN-002] Run not found: {0}")]
    RunNotFound(String),

    #[error("[ERR-RUN-003] Run {run_id} is {status}, expected {expected}")]
    InvalidState {
        run_id: String,
        status: RunStatus,
        expected: RunStatus,
    },

    #[error("[ERR-SYS-001] {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DpackError {
    /// Validation error with a message specific to the offending input.
    pub fn validation_with(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            DpackError::Validation { code, .. } => Some(*code),
            DpackError::RunNotFound(_) => Some(ErrorCode::RunNotFound),
            DpackError::InvalidState { .. } => Some(ErrorCode::RunInvalidState),
            DpackError::Unavailable(_) => Some(ErrorCode::SystemUnavailable),
            DpackError::Io(_) | DpackError::Json(_) | DpackError::Toml(_) => None,
        }
    }

    /// The error text without its code prefix.
    pub fn detail(&self) -> String {
        match self {
            DpackError::Validation { message, .. } => message.clone(),
            DpackError::RunNotFound(run_id) => format!("run {run_id}"),
            DpackError::InvalidState {
                run_id,
                status,
                expected,
            } => format!("run {run_id} is {status}, expected {expected}"),
            DpackError::Unavailable(message) => message.clone(),
            DpackError::Io(_) | DpackError::Json(_) | DpackError::Toml(_) => self.to_string(),
        }
    }
}

/// User-facing text for an error that reached the command line.
///
/// Coded errors lead with `[CODE] <fixed message>` and add the specific
/// detail on a second line when it says something more.
pub fn describe(err: &anyhow::Error) -> String {
    let coded = err
        .chain()
        .filter_map(|e| e.downcast_ref::<DpackError>())
        .find_map(|e| e.code().map(|code| (code, e)));
    match coded {
        Some((code, e)) => {
            let detail = e.detail();
            if detail == code.message() {
                format!("[{code}] {}", code.message())
            } else {
                format!("[{code}] {}\n  {detail}", code.message())
            }
        }
        None => format!("{err:#}"),
    }
}
