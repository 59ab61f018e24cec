//! Error types for the library layer.

use std::fmt;
use std::time::Duration;

/// Failures of the HTML → script → field map pipeline.
///
/// None of these are transient: they mean the page changed shape or the
/// input is bad, so callers should not retry.
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("script not found for variable `{name}`")]
    ScriptNotFound { name: String },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("script evaluation exceeded {0:?}")]
    Timeout(Duration),
    #[error("invalid serialized result: {0}")]
    InvalidResult(String),
    #[error("unexpected nested value for key `{key}`")]
    UnexpectedValue { key: String },
}

/// Errors produced by the library facade, wrapping session errors
/// and adding extraction and input validation failures.
#[derive(Debug)]
pub enum BheError {
    /// Login, session or document download failed.
    Auth(sii_api::AuthError),
    /// A report page could not be turned into data.
    Extraction(ExtractionError),
    /// User-provided input failed validation.
    InvalidInput(String),
}

impl fmt::Display for BheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "Authentication or service error: {}", e),
            Self::Extraction(e) => write!(f, "Extraction error: {}", e),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for BheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Auth(e) => Some(e),
            Self::Extraction(e) => Some(e),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<sii_api::AuthError> for BheError {
    fn from(e: sii_api::AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<ExtractionError> for BheError {
    fn from(e: ExtractionError) -> Self {
        Self::Extraction(e)
    }
}
