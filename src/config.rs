//! Per-handle policy configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Historical capacity of descriptor strings, in wide code units
///
/// Limits the returned text; the native buffer holds one more unit for the NUL.
pub const DEFAULT_MAX_STRING_LEN: usize = 2014;

/// Largest accepted `max_string_len`, in wide code units
pub const MAX_STRING_LEN_LIMIT: usize = 65_535;

/// Errors loading a [`HandleConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("max_string_len {0} out of range (1..={limit})", limit = MAX_STRING_LEN_LIMIT)]
    StringLenOutOfRange(usize),
}

/// What a descriptor string accessor does when the native call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringErrorPolicy {
    /// Return an empty string; the strings are cosmetic and must not abort callers
    #[default]
    Empty,
    /// Return an I/O error like every other operation
    Raise,
}

/// How `get_feature_report` talks to the native layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureReportMode {
    /// Use the native get-feature-report call; `-1` is failure, otherwise a byte count
    #[default]
    Dedicated,
    /// Reproduce the legacy binding: read an input report and treat any
    /// nonzero result as failure
    LegacyRead,
}

/// Policy knobs for a [`DeviceHandle`](crate::DeviceHandle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    pub string_errors: StringErrorPolicy,
    pub feature_report: FeatureReportMode,
    /// Longest descriptor string returned, in wide code units
    pub max_string_len: usize,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            string_errors: StringErrorPolicy::default(),
            feature_report: FeatureReportMode::default(),
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

impl HandleConfig {
    /// Parse a config from TOML; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values a hand-written config could get wrong
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_string_len == 0 || self.max_string_len > MAX_STRING_LEN_LIMIT {
            return Err(ConfigError::StringLenOutOfRange(self.max_string_len));
        }
        Ok(())
    }

    /// Descriptor string length actually used, capped at [`MAX_STRING_LEN_LIMIT`]
    pub fn string_len(&self) -> usize {
        self.max_string_len.min(MAX_STRING_LEN_LIMIT)
    }

    pub fn with_string_errors(mut self, policy: StringErrorPolicy) -> Self {
        self.string_errors = policy;
        self
    }

    pub fn with_feature_report(mut self, mode: FeatureReportMode) -> Self {
        self.feature_report = mode;
        self
    }

    pub fn with_max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }
}
