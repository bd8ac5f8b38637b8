//! BDU-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BduError>;

/// Top-level error type for backup_du.
#[derive(Debug, Error)]
pub enum BduError {
    #[error("[BDU-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BDU-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BDU-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BDU-1101] cannot parse size {input:?}: {details}")]
    UnitParse { input: String, details: String },

    #[error("[BDU-1201] format sequence %{letter} is not implemented")]
    FormatUnimplemented { letter: char },

    #[error("[BDU-1202] unrecognized format sequence {sequence:?} in template")]
    FormatUnrecognized { sequence: String },

    #[error("[BDU-2001] cannot decode {encoded:?}: {details}")]
    Decode { encoded: String, details: String },

    #[error("[BDU-2002] digest {encoded:?} has non-zero padding bits (decoded {hex})")]
    DigestPadding { encoded: String, hex: String },

    #[error("[BDU-3001] record source failure in {context}: {details}")]
    RecordSource {
        context: &'static str,
        details: String,
    },

    #[error("[BDU-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BDU-3003] failed to write report output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("[BDU-3101] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[BDU-3201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl BduError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BDU-1001",
            Self::MissingConfig { .. } => "BDU-1002",
            Self::ConfigParse { .. } => "BDU-1003",
            Self::UnitParse { .. } => "BDU-1101",
            Self::FormatUnimplemented { .. } => "BDU-1201",
            Self::FormatUnrecognized { .. } => "BDU-1202",
            Self::Decode { .. } => "BDU-2001",
            Self::DigestPadding { .. } => "BDU-2002",
            Self::RecordSource { .. } => "BDU-3001",
            Self::Io { .. } => "BDU-3002",
            Self::Output { .. } => "BDU-3003",
            Self::Sql { .. } => "BDU-3101",
            Self::Serialization { .. } => "BDU-3201",
        }
    }

    /// Whether the failure comes from what the user asked for (flags, config,
    /// templates) rather than from the catalog data or the environment.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::UnitParse { .. }
                | Self::FormatUnimplemented { .. }
                | Self::FormatUnrecognized { .. }
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

    /// Convenience constructor for decode failures.
    #[must_use]
    pub fn decode(encoded: &str, details: impl Into<String>) -> Self {
        Self::Decode {
            encoded: encoded.to_string(),
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for BduError {
    fn from(source: std::io::Error) -> Self {
        Self::Output { source }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BduError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for BduError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BduError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
