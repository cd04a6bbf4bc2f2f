//! Error types for ChurnGuard

use crate::validation::Violation;
use std::fmt;
use std::path::PathBuf;

/// Result type alias using ChurnGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by artifact failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for ChurnGuard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session construction, configuration loading or resource budget errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Model directory or metadata marker absent
    #[error("model artifact missing: {what} not found at {}", .path.display())]
    ArtifactMissing {
        what: MissingArtifact,
        path: PathBuf,
    },

    /// Model artifact present but unreadable
    #[error("failed to load model artifact at {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// One or more record fields out of their domain
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    /// Row construction, transform or result extraction errors
    #[error("inference error: {0}")]
    Inference(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which part of a model artifact was not found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingArtifact {
    /// The model directory itself
    ModelDirectory,
    /// The `metadata` marker inside the model directory
    MetadataMarker,
}

impl fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelDirectory => write!(f, "model directory"),
            Self::MetadataMarker => write!(f, "metadata marker"),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a missing-artifact error
    pub fn artifact_missing(what: MissingArtifact, path: impl Into<PathBuf>) -> Self {
        Self::ArtifactMissing {
            what,
            path: path.into(),
        }
    }

    /// Wrap an artifact deserialization failure, keeping its cause
    pub fn artifact(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Artifact {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether this error should halt the serving process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::ArtifactMissing { .. } | Self::Artifact { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Field;
    use std::error::Error as _;

    #[test]
    fn test_artifact_missing_names_sub_path() {
        let err = Error::artifact_missing(MissingArtifact::MetadataMarker, "/models/m/metadata");
        let msg = err.to_string();
        assert!(msg.contains("metadata marker"));
        assert!(msg.contains("/models/m/metadata"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_artifact_preserves_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated header");
        let err = Error::artifact("/models/m", cause);
        let source = err.source().expect("source kept");
        assert_eq!(source.to_string(), "truncated header");
    }

    #[test]
    fn test_validation_lists_every_violation() {
        let err = Error::Validation(vec![
            Violation::new(Field::Age, "Age must be between 18 and 100"),
            Violation::new(Field::Balance, "Balance must be >= 0"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Age"));
        assert!(msg.contains("Balance"));
        assert!(!err.is_fatal());
    }
}
