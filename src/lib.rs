//! Rate the complexity of a GitHub repository's source files with an LLM.
//!
//! [`github::GitHubClient`] lists and fetches files, a [`provider::ComplexityProvider`]
//! scores each one, and [`analysis::RepositoryAnalyzer`] aggregates the results into a
//! [`models::ComplexityReport`].

pub mod analysis;
pub mod anthropic;
pub mod config;
pub mod error;
pub mod github;
pub mod markdown;
pub mod models;
pub mod openai;
pub mod provider;
pub mod tokens;
pub mod utils;

pub use analysis::{AnalyzerOptions, RepositoryAnalyzer};
pub use error::{AnalyzerError, ValidationError};
pub use models::{ComplexityReport, FileComplexity, ScorePolicy};
