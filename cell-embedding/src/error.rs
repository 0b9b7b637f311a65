//! Error types for cell-embedding

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, loading or querying cell embeddings
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Invalid or missing configuration option
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown embedding strategy name
    #[error("[{0}] is not a valid embedding type")]
    InvalidEmbeddingType(String),

    /// Recognized but unsupported feature
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Load requested but nothing was persisted for the attribute
    #[error("No persisted embedding for attribute '{attribute}' at {}", .path.display())]
    MissingArtifact { attribute: String, path: PathBuf },

    /// Persisted files exist but disagree with each other
    #[error("Corrupt embedding artifact for attribute '{attribute}': {reason}")]
    CorruptArtifact { attribute: String, reason: String },

    /// Value absent from an attribute's index
    #[error("Value '{value}' not found in embedding of attribute '{attribute}'")]
    Lookup { attribute: String, value: String },

    /// Attribute was never trained or loaded
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Word model training failed
    #[error("Training error for attribute '{attribute}': {reason}")]
    Training { attribute: String, reason: String },

    /// Model cannot produce a vector for the word
    #[error("Unknown word: {0}")]
    UnknownWord(String),

    /// Invalid path or path component
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// One or more attribute pipelines failed during a single `train` call
    #[error("Embedding failed for attributes {failed:?}: {source}")]
    AttributeFailures {
        failed: Vec<String>,
        #[source]
        source: Box<EmbeddingError>,
    },

    /// Serialization error (bincode)
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a training error for an attribute
    pub fn training(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Training {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create a lookup error
    pub fn lookup(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Lookup {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a corrupt artifact error
    pub fn corrupt(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptArtifact {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a not implemented error
    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }
}

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_names_attribute_and_value() {
        let err = EmbeddingError::lookup("city", "Springfield");
        assert_eq!(
            err.to_string(),
            "Value 'Springfield' not found in embedding of attribute 'city'"
        );
    }

    #[test]
    fn test_invalid_embedding_type_display() {
        let err = EmbeddingError::InvalidEmbeddingType("glove".to_string());
        assert_eq!(err.to_string(), "[glove] is not a valid embedding type");
    }

    #[test]
    fn test_missing_artifact_display() {
        let err = EmbeddingError::MissingArtifact {
            attribute: "name".to_string(),
            path: PathBuf::from("/data/namevec.bin"),
        };
        assert!(err.to_string().contains("/data/namevec.bin"));
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_attribute_failures_keeps_source() {
        let err = EmbeddingError::AttributeFailures {
            failed: vec!["a".to_string(), "b".to_string()],
            source: Box::new(EmbeddingError::training("a", "empty corpus")),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Training error for attribute 'a': empty corpus")
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EmbeddingError = io_err.into();
        assert!(matches!(err, EmbeddingError::Io(_)));
    }
}
