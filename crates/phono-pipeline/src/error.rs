//! Error types for the catalog pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to an external metadata provider.
///
/// Provider errors never abort the pipeline. Clients retry transient
/// failures and then degrade to an empty result; this type exists so the
/// retry layer can distinguish what is worth retrying.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An HTTP request to an external provider failed.
    #[error("HTTP error from {provider}: {message}")]
    Http { provider: String, message: String },

    /// The provider returned a rate-limit response.
    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    /// A response from a provider could not be parsed.
    #[error("parse error from {provider}: {message}")]
    Parse { provider: String, message: String },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl ProviderError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::RateLimited { .. } => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Parse { .. } => false,
        }
    }
}

/// Convenience alias for provider call results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Fatal pipeline errors.
///
/// Everything here aborts the run before or during a phase. Per-entity
/// failures are not represented: they are logged, counted, and the entity
/// degrades or is dropped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured music directory does not exist or is not a directory.
    #[error("music directory not found: {0}")]
    MusicDirNotFound(PathBuf),

    /// The scan produced no audio files at all.
    #[error("no audio files found under {0}")]
    NoAudioFiles(PathBuf),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O failure outside per-entity work (catalog write, cache write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog or cache document could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error propagated from the core domain layer.
    #[error(transparent)]
    Core(#[from] phono_core::Error),

    /// A spawned task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_is_transient() {
        let err = ProviderError::Http {
            provider: "TheAudioDB".to_string(),
            message: "502 Bad Gateway".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_error_is_not_transient() {
        let err = ProviderError::Parse {
            provider: "MusicBrainz".to_string(),
            message: "unexpected shape".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::NoAudioFiles(PathBuf::from("/music"));
        assert_eq!(err.to_string(), "no audio files found under /music");
    }
}
