/*!
 * Error types for the dataset translator.
 *
 * Each layer gets its own error enum built with thiserror. Cell-level
 * backend failures are recorded in the results and never abort a run;
 * the remaining errors are fatal and surface through `PipelineError`.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Timeout,
    AuthError,
    MalformedResponse,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
            Self::MalformedResponse => "malformed_response",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate_limited" => Ok(Self::RateLimited),
            "timeout" => Ok(Self::Timeout),
            "auth_error" => Ok(Self::AuthError),
            "malformed_response" => Ok(Self::MalformedResponse),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid failure kind: {}", s)),
        }
    }
}

/// Errors that can occur when calling a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The service rejected the request because of its own rate limit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The request did not complete within the timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Credentials were missing or rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The service answered but the body could not be used
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else; `transient` failures are worth retrying
    #[error("API request failed: {message}")]
    Unknown {
        message: String,
        transient: bool,
    },
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Auth(_) => FailureKind::AuthError,
            Self::MalformedResponse(_) => FailureKind::MalformedResponse,
            Self::Unknown { .. } => FailureKind::Unknown,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Timeout(_) => true,
            Self::Unknown { transient, .. } => *transient,
            Self::Auth(_) | Self::MalformedResponse(_) => false,
        }
    }
}

/// Errors in the configuration, detected before any work starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A setting has an unusable value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The config file could not be read or written
    #[error("Config file error ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the config schema
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur when loading or writing a dataset
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The source does not exist or is not supported
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// The source exists but could not be decoded
    #[error("Dataset format error: {0}")]
    Format(String),

    /// Underlying IO failure
    #[error("Dataset IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the checkpoint store
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The persistent store failed
    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    /// The checkpoint was written for a different dataset
    #[error("Checkpoint does not match the dataset (expected fingerprint {expected}, found {found})")]
    Mismatch { expected: String, found: String },
}

impl From<anyhow::Error> for CheckpointError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

/// Fatal errors of a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Writing the output table or statistics failed
    #[error("Output error: {0}")]
    Output(String),
}
