use crate::reader::DocumentKind;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure of one extraction run. Per-unit decode failures never
/// surface as this type; they are skipped inside the extractor.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("content does not look like a {expected} document")]
    KindMismatch { expected: DocumentKind },

    #[error("document is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("failed to open {kind} container: {message}")]
    Open { kind: DocumentKind, message: String },

    #[error("{skipped} of {total} units failed to decode")]
    TooManySkipped { skipped: usize, total: usize },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access stored value `{key}`")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create state directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
