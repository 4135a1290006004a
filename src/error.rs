//! Error types for the analysis pipeline.
//!
//! Pre-flight and listing failures abort a run. Per-file failures
//! (`ContentDecode`, `ProviderTransport`, `ProviderResponse`) are skipped by
//! the analyzer. `InvalidReport` is fatal: it means aggregation itself produced a
//! report that breaks its invariants.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    /// Repository reference could not be parsed into owner and repo
    #[error("Invalid repository locator: {0}")]
    InvalidLocator(String),

    /// Listing or content request against the repository host failed
    #[error("Source fetch failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    SourceFetch { status: Option<u16>, message: String },

    /// File content was not valid base64 or not UTF-8 text
    #[error("Could not decode {path}: {reason}")]
    ContentDecode { path: String, reason: String },

    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Model backend could not be reached or answered with a non-success status
    #[error("Provider request failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    ProviderTransport { status: Option<u16>, message: String },

    /// Model backend answered, but the answer is not a valid assessment
    #[error("Invalid provider response: {0}")]
    ProviderResponse(String),

    /// Aggregated report breaks a report invariant
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    #[error("No file in {0} could be analyzed")]
    NoAnalyzableFiles(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AnalyzerError {
    pub fn source_fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        AnalyzerError::SourceFetch {
            status,
            message: message.into(),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        AnalyzerError::ProviderTransport {
            status,
            message: message.into(),
        }
    }

    /// Only transport failures that may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalyzerError::ProviderTransport { status: None, .. } => true,
            AnalyzerError::ProviderTransport {
                status: Some(status),
                ..
            } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::Serialization(err.to_string())
    }
}

/// An assessment or report breaks one of its invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("file path must not be empty")]
    EmptyPath,

    #[error("{field} must be within [0, 100], got {value}")]
    ScoreOutOfRange { field: &'static str, value: f64 },

    #[error("line_count must be greater than zero")]
    NoLines,

    #[error("reasoning must contain at least {min} characters of evidence")]
    ReasoningTooShort { min: usize },

    #[error("total score {total} is more than {tolerance} below min(cyclomatic, architectural) = {floor}")]
    IncoherentTotal {
        total: f64,
        floor: f64,
        tolerance: f64,
    },

    #[error("report contains no analyzed files")]
    EmptyReport,

    #[error("top file {0} not found in analyzed files")]
    UnknownTopFile(String),
}

impl ValidationError {
    /// True for violations of report invariants rather than of one file's assessment.
    pub fn is_report_level(&self) -> bool {
        matches!(
            self,
            ValidationError::EmptyReport
                | ValidationError::UnknownTopFile(_)
                | ValidationError::ScoreOutOfRange { field: "score", .. }
        )
    }
}

impl From<ValidationError> for AnalyzerError {
    fn from(err: ValidationError) -> Self {
        if err.is_report_level() {
            AnalyzerError::InvalidReport(err.to_string())
        } else {
            AnalyzerError::ProviderResponse(err.to_string())
        }
    }
}

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;
