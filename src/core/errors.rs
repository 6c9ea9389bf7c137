//! ACOL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AcError>;

/// Top-level error type for the asset collector.
#[derive(Debug, Error)]
pub enum AcError {
    #[error("[ACOL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ACOL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ACOL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ACOL-2001] malformed image metadata in {path}: {details}")]
    MetadataParse { path: PathBuf, details: String },

    #[error("[ACOL-2002] cannot read image content {path}: {source}")]
    ContentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ACOL-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ACOL-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ACOL-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ACOL-1001",
            Self::MissingConfig { .. } => "ACOL-1002",
            Self::ConfigParse { .. } => "ACOL-1003",
            Self::MetadataParse { .. } => "ACOL-2001",
            Self::ContentRead { .. } => "ACOL-2002",
            Self::Serialization { .. } => "ACOL-2101",
            Self::Io { .. } => "ACOL-3002",
            Self::Runtime { .. } => "ACOL-3900",
        }
    }

    /// Whether retrying on a later poll cycle might resolve the failure.
    ///
    /// Metadata and content failures count as retryable: the producing
    /// training process may still be writing the files.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MetadataParse { .. }
                | Self::ContentRead { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a failed image read.
    #[must_use]
    pub fn content_read(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::ContentRead {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a malformed sidecar file.
    #[must_use]
    pub fn metadata_parse(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::MetadataParse {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for AcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
