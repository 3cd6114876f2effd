//! Runtime configuration.
//!
//! Values are layered, later layers win:
//!
//! 1. [`ReshapeConfig::default`] - the original four setups, 2 skipped rows
//! 2. JSON config file (`--config`), any subset of fields
//! 3. Environment (`LAYERCV_*`, `.env` loaded by the CLI via dotenvy)
//! 4. CLI flags
//!
//! | Variable               | Field          | Format                    |
//! |------------------------|----------------|---------------------------|
//! | `LAYERCV_SETUPS`       | `setups`       | comma-separated labels    |
//! | `LAYERCV_SKIP_ROWS`    | `skip_rows`    | unsigned integer          |
//! | `LAYERCV_HAS_HEADER`   | `has_header`   | `true`/`false`/`1`/`0`    |
//! | `LAYERCV_LIBRARY_PATH` | `library_path` | path                      |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{default_setups, SetupLabel};
use crate::parser::ParseOptions;

pub const ENV_SETUPS: &str = "LAYERCV_SETUPS";
pub const ENV_SKIP_ROWS: &str = "LAYERCV_SKIP_ROWS";
pub const ENV_HAS_HEADER: &str = "LAYERCV_HAS_HEADER";
pub const ENV_LIBRARY_PATH: &str = "LAYERCV_LIBRARY_PATH";

/// Default location of the chemical library CSV.
pub const DEFAULT_LIBRARY_PATH: &str = "data/chemical_library.csv";

/// Configuration shared by the CLI and the HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshapeConfig {
    /// Setup labels in column-pair order.
    pub setups: Vec<SetupLabel>,
    /// Leading header/metadata rows to skip.
    pub skip_rows: usize,
    /// Whether a column-name row follows the skipped rows.
    pub has_header: bool,
    /// Delimiter for text input (auto-detect if not specified).
    pub delimiter: Option<char>,
    /// Chemical library CSV location.
    pub library_path: PathBuf,
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        Self {
            setups: default_setups(),
            skip_rows: 2,
            has_header: true,
            delimiter: None,
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
        }
    }
}

impl ReshapeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Load a JSON config file, then apply the process environment.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        Self::from_file_with(path, |key| std::env::var(key).ok())
    }

    /// Load a JSON config file, then apply overrides read through `lookup`.
    pub fn from_file_with<F>(path: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.with_overrides(lookup)
    }

    /// Apply `LAYERCV_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SETUPS) {
            self.setups = parse_setups(&raw);
        }
        if let Some(raw) = lookup(ENV_SKIP_ROWS) {
            self.skip_rows = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SKIP_ROWS.to_string(),
                message: format!("'{}' is not a row count", raw),
            })?;
        }
        if let Some(raw) = lookup(ENV_HAS_HEADER) {
            self.has_header = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_HAS_HEADER.to_string(),
                message: format!("'{}' is not a boolean", raw),
            })?;
        }
        if let Some(raw) = lookup(ENV_LIBRARY_PATH) {
            self.library_path = PathBuf::from(raw);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.setups.is_empty() {
            return Err(ConfigError::NoSetups);
        }
        if let Some(d) = self.delimiter {
            if !d.is_ascii() {
                return Err(ConfigError::InvalidValue {
                    key: "delimiter".to_string(),
                    message: format!("'{}' is not an ASCII character", d),
                });
            }
        }
        Ok(())
    }

    /// Parser options derived from this config.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            skip_rows: self.skip_rows,
            has_header: self.has_header,
            delimiter: self.delimiter,
            format: None,
        }
    }
}

/// Split a comma-separated label list, dropping blanks.
pub fn parse_setups(raw: &str) -> Vec<SetupLabel> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SetupLabel::from)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
