//! Configuration loaded from `dpack.toml`.
//!
//! [`AppConfig`] holds every tunable. Fields missing from the file fall back
//! to defaults, and `DPACK_*` environment variables take precedence over the
//! file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;

use crate::error::{DpackError, ErrorCode};
use crate::wizard::InputLimits;

pub const CONFIG_FILE: &str = "dpack.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Interval between status polls while watching a run.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Largest single source file accepted, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Largest combined size of all source files, in bytes.
    #[serde(default = "default_max_total_size")]
    pub max_total_size: u64,

    #[serde(default = "default_max_url_count")]
    pub max_url_count: usize,

    /// Serve runs from the local mock backend. There is no other backend.
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,

    /// Directory holding the run store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

// 50 MiB.
fn default_max_file_size() -> u64 {
    52_428_800
}

// 150 MiB.
fn default_max_total_size() -> u64 {
    157_286_400
}

fn default_max_url_count() -> usize {
    30
}

fn default_mock_mode() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".dpack")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_file_size: default_max_file_size(),
            max_total_size: default_max_total_size(),
            max_url_count: default_max_url_count(),
            mock_mode: default_mock_mode(),
            data_dir: default_data_dir(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, DpackError> {
    raw.trim().parse().map_err(|_| {
        DpackError::validation_with(
            ErrorCode::ValidationFormat,
            format!("{key}: invalid value {raw:?}"),
        )
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, DpackError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DpackError::validation_with(
            ErrorCode::ValidationFormat,
            format!("{key}: expected a boolean, got {raw:?}"),
        )),
    }
}

impl AppConfig {
    /// Load `dpack.toml` from the current directory, then apply environment
    /// overrides. Uses defaults if the file does not exist.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(Path::new(CONFIG_FILE))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&contents).map_err(DpackError::from)?)
    }

    /// Override fields from `DPACK_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), DpackError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("DPACK_POLL_INTERVAL") {
            self.poll_interval_ms = parse_var("DPACK_POLL_INTERVAL", &v)?;
        }
        if let Some(v) = var("DPACK_MAX_FILE_SIZE") {
            self.max_file_size = parse_var("DPACK_MAX_FILE_SIZE", &v)?;
        }
        if let Some(v) = var("DPACK_MAX_TOTAL_SIZE") {
            self.max_total_size = parse_var("DPACK_MAX_TOTAL_SIZE", &v)?;
        }
        if let Some(v) = var("DPACK_MAX_URL_COUNT") {
            self.max_url_count = parse_var("DPACK_MAX_URL_COUNT", &v)?;
        }
        if let Some(v) = var("DPACK_MOCK_MODE") {
            self.mock_mode = parse_bool("DPACK_MOCK_MODE", &v)?;
        }
        if let Some(v) = var("DPACK_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DpackError> {
        if self.poll_interval_ms == 0 {
            return Err(DpackError::validation_with(
                ErrorCode::ValidationRange,
                "poll_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> InputLimits {
        InputLimits {
            max_file_size: self.max_file_size,
            max_total_size: self.max_total_size,
            max_url_count: self.max_url_count,
        }
    }
}
