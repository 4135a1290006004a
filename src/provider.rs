//! Complexity provider contract and backend selection.
//!
//! A provider turns one source file into a validated [`FileComplexity`]. Backends
//! differ only in transport; the rubric and the response handling live here.

use crate::anthropic::AnthropicProvider;
use crate::error::AnalyzerError;
use crate::models::{FileComplexity, ScorePolicy};
use crate::openai::OpenAiProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

#[async_trait]
pub trait ComplexityProvider: Send + Sync {
    /// Backend name, e.g. `openai`.
    fn name(&self) -> &str;

    /// Model id requests are sent to.
    fn model(&self) -> &str;

    /// Assess one file.
    ///
    /// Transport and auth failures are [`AnalyzerError::ProviderTransport`]; an
    /// answer that does not parse or breaks an invariant is
    /// [`AnalyzerError::ProviderResponse`]. Nothing is retried here.
    async fn analyze_file(
        &self,
        file_content: &str,
        file_path: &str,
    ) -> Result<FileComplexity, AnalyzerError>;
}

pub const SYSTEM_PROMPT: &str = "You are an expert software architect analyzing code complexity.

Evaluate the code file across three dimensions, each scored from 0 to 100:

1. Cyclomatic complexity: control flow based on decision points.
   Count if/else, loops, switch/match statements. Nesting increases the score sharply.

2. Architectural complexity: design pattern sophistication.
   Identify patterns such as Factory, Strategy, Observer, Decorator.
   Assess abstraction layers and dependency injection.

3. Algorithmic complexity: algorithm sophistication.
   Analyze time and space complexity and identify advanced algorithms
   (graph traversal, dynamic programming, ...).

Compute total_score as the weighted average: 30% cyclomatic, 40% architectural, 30% algorithmic.
Cite line numbers and code constructs in your reasoning and list every design pattern detected.";

pub const FORMAT_INSTRUCTIONS: &str = "Respond with a single JSON object and nothing else, no markdown fences:
{
  \"total_score\": number 0-100,
  \"cyclomatic_score\": number 0-100,
  \"architectural_score\": number 0-100,
  \"algorithmic_score\": number 0-100,
  \"line_count\": integer > 0,
  \"function_count\": integer >= 0,
  \"class_count\": integer >= 0,
  \"patterns_detected\": [\"pattern names\"],
  \"reasoning\": \"evidence-based explanation\"
}";

/// Build the user message for one file.
pub fn user_prompt(file_path: &str, file_content: &str) -> String {
    format!(
        "File: {}\n\nContent:\n{}\n\n{}",
        file_path, file_content, FORMAT_INSTRUCTIONS
    )
}

/// Assessment as returned by a backend. The path is optional because the
/// analyzer already knows which file it asked about.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    #[serde(default)]
    file_path: Option<String>,
    total_score: f64,
    #[serde(alias = "cyclomatic_complexity")]
    cyclomatic_score: f64,
    #[serde(alias = "architectural_complexity")]
    architectural_score: f64,
    #[serde(alias = "algorithmic_complexity")]
    algorithmic_score: f64,
    line_count: u64,
    #[serde(default)]
    function_count: u64,
    #[serde(default)]
    class_count: u64,
    #[serde(default, alias = "design_patterns")]
    patterns_detected: Vec<String>,
    reasoning: String,
}

/// Parse a backend's text answer into a validated assessment for `file_path`.
pub fn parse_assessment(
    content: &str,
    file_path: &str,
    policy: &ScorePolicy,
) -> Result<FileComplexity, AnalyzerError> {
    let clean = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = clean
        .find('{')
        .ok_or_else(|| AnalyzerError::ProviderResponse("no JSON object in response".to_string()))?;
    let end = clean
        .rfind('}')
        .ok_or_else(|| AnalyzerError::ProviderResponse("no closing brace in response".to_string()))?;
    if end < start {
        return Err(AnalyzerError::ProviderResponse(
            "no JSON object in response".to_string(),
        ));
    }

    let raw: RawAssessment = serde_json::from_str(&clean[start..=end])
        .map_err(|e| AnalyzerError::ProviderResponse(format!("schema mismatch: {}", e)))?;
    if let Some(reported) = raw.file_path.as_deref() {
        if reported != file_path {
            debug!("Backend reported path {} for {}", reported, file_path);
        }
    }

    let file = FileComplexity {
        file_path: file_path.to_string(),
        total_score: raw.total_score,
        cyclomatic_score: raw.cyclomatic_score,
        architectural_score: raw.architectural_score,
        algorithmic_score: raw.algorithmic_score,
        line_count: raw.line_count,
        function_count: raw.function_count,
        class_count: raw.class_count,
        patterns_detected: raw.patterns_detected,
        reasoning: raw.reasoning,
    };
    file.validate(policy)?;
    Ok(file)
}

/// Credentials and endpoint for one backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Supported backends.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    OpenAi(ProviderSettings),
    Anthropic(ProviderSettings),
}

impl ProviderKind {
    pub const NAMES: [&'static str; 2] = ["openai", "anthropic"];

    /// Select a backend by name. Unknown names fail before any request is made.
    pub fn from_name(name: &str, settings: ProviderSettings) -> Result<Self, AnalyzerError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi(settings)),
            "anthropic" => Ok(ProviderKind::Anthropic(settings)),
            _ => Err(AnalyzerError::UnknownProvider(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi(_) => "openai",
            ProviderKind::Anthropic(_) => "anthropic",
        }
    }

    pub fn settings(&self) -> &ProviderSettings {
        match self {
            ProviderKind::OpenAi(settings) | ProviderKind::Anthropic(settings) => settings,
        }
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_env(name: &str) -> Option<&'static str> {
        match name {
            "openai" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            _ => None,
        }
    }

    pub fn into_provider(self, policy: ScorePolicy) -> Box<dyn ComplexityProvider> {
        match self {
            ProviderKind::OpenAi(settings) => Box::new(OpenAiProvider::new(settings, policy)),
            ProviderKind::Anthropic(settings) => {
                Box::new(AnthropicProvider::new(settings, policy))
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
