//! Reader configuration, loaded from an optional TOML file.

use crate::error::ConfigError;
use crate::extractor::ExtractOptions;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::position::DEFAULT_PACE;
use crate::reader::DEFAULT_MAX_DOCUMENT_BYTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub playback: PlaybackConfig,
    pub extraction: ExtractionConfig,
    pub history: HistoryConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tokens per minute used until the reader picks another pace.
    pub default_pace: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_pace: DEFAULT_PACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_document_bytes: u64,
    /// Fraction of units allowed to fail before a document is rejected.
    /// Unset means failed units are always skipped.
    pub max_skipped_ratio: Option<f64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_skipped_ratio: None,
        }
    }
}

impl ExtractionConfig {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            max_skipped_ratio: self.max_skipped_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Tokens shown on each side of the current one when unit boundaries
    /// are unknown.
    pub half_window: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { half_window: 60 }
    }
}

impl ReaderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
