//! Repository runtime configuration.
//!
//! # Responsibility
//! - Hold the tunables shared by list, export and import paths.
//! - Parse and validate configuration supplied by the hosting service.
//!
//! # Invariants
//! - `1 <= default_page_size <= max_page_size`.
//! - `tag_delimiter` never collides with CSV structural characters.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 100;
const EXPORT_BATCH_SIZE: u32 = 100;
const TAG_DELIMITER: char = ';';

/// Tunables for one repository instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Page size applied when the caller omits a limit or passes zero.
    pub default_page_size: u32,
    /// Server-enforced upper bound; larger requests are clamped.
    pub max_page_size: u32,
    /// Page size used by internal repeated fetches (export, domain queries).
    pub export_batch_size: u32,
    /// Separator for multi-value fields inside one CSV cell.
    pub tag_delimiter: char,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            export_batch_size: EXPORT_BATCH_SIZE,
            tag_delimiter: TAG_DELIMITER,
        }
    }
}

impl RepoConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed JSON or unknown keys.
    /// - `ConfigError::Invalid` when a value breaks an invariant.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "default_page_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::Invalid {
                key: "max_page_size",
                message: format!(
                    "must be >= default_page_size ({})",
                    self.default_page_size
                ),
            });
        }
        if self.export_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "export_batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if matches!(self.tag_delimiter, ',' | '"' | '\n' | '\r') || self.tag_delimiter.is_whitespace()
        {
            return Err(ConfigError::Invalid {
                key: "tag_delimiter",
                message: format!(
                    "`{}` collides with CSV syntax",
                    self.tag_delimiter.escape_debug()
                ),
            });
        }
        Ok(())
    }

    /// Normalizes a requested page size according to the list contract.
    pub fn normalize_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_page_size,
            Some(value) if value > self.max_page_size => self.max_page_size,
            Some(value) => value,
        }
    }

    /// Effective batch size for internal repeated fetches.
    pub fn fetch_batch_size(&self) -> u32 {
        self.export_batch_size.min(self.max_page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "invalid repository config: {message}"),
            Self::Invalid { key, message } => {
                write!(f, "invalid repository config `{key}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {}
