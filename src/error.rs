//! Error taxonomy for the report pipeline.
//!
//! Each stage has its own error type so the orchestrator can decide what is
//! fatal. Score parsing never produces an error; unparseable completions
//! degrade to the configured fallback score instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single HTTP exchange with one of the hosted APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API response contained no completion choices")]
    EmptyChoices,
}

/// Configuration could not be assembled. Raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not set and key file {path} was not found")]
    MissingKey { var: &'static str, path: PathBuf },

    #[error("key file {0} is empty")]
    EmptyKey(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The search API could not be queried, even after retrying.
#[derive(Debug, Error)]
#[error("news search failed after {attempts} attempt(s): {source}")]
pub struct FetchError {
    pub attempts: usize,
    #[source]
    pub source: ApiError,
}

/// The completion API could not score one article, even after retrying.
#[derive(Debug, Error)]
#[error("scoring \"{title}\" failed after {attempts} attempt(s): {source}")]
pub struct AnalysisError {
    pub title: String,
    pub attempts: usize,
    #[source]
    pub source: ApiError,
}

/// The report could not be rendered or written.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template is missing the {0} placeholder")]
    Placeholder(&'static str),

    #[error("output directory {path} is not writable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Anything that stops a run from producing its report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message_names_attempts() {
        let err = FetchError {
            attempts: 3,
            source: ApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn test_pipeline_error_is_transparent() {
        let err: PipelineError = ConfigError::Invalid("page_size must be 1..=100".into()).into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: page_size must be 1..=100"
        );
    }
}
