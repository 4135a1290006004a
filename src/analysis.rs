//! Repository-level orchestration: fetch, analyze file by file, aggregate.

use crate::error::AnalyzerError;
use crate::github::{RepositorySource, SourceFile};
use crate::models::{ComplexityReport, FileComplexity};
use crate::provider::ComplexityProvider;
use crate::tokens::{TokenBudget, DEFAULT_BUFFER};
use crate::utils::{retry, RETRY_DELAY_MS};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_FILES: usize = 50;

pub fn default_exclude_patterns() -> Vec<String> {
    vec!["tests/*".to_string(), "*.md".to_string(), "*.txt".to_string()]
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    pub max_files: usize,
    pub exclude_patterns: Vec<String>,
    /// Provider attempts per file; 1 means no retry.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Tokens reserved for the prompt when budgeting file content.
    pub token_buffer: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            exclude_patterns: default_exclude_patterns(),
            max_attempts: 1,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            token_buffer: DEFAULT_BUFFER,
        }
    }
}

/// Stages of one run, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Analyzing,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Analyzing => "analyzing",
            Stage::Aggregating => "aggregating",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Mean of total scores and the first file with the highest total.
///
/// Returns `None` for an empty slice.
pub fn aggregate(files: &[FileComplexity]) -> Option<(f64, &FileComplexity)> {
    let first = files.first()?;
    let top = files.iter().skip(1).fold(first, |best, f| {
        if f.total_score > best.total_score {
            f
        } else {
            best
        }
    });
    let mean = files.iter().map(|f| f.total_score).sum::<f64>() / files.len() as f64;
    Some((mean, top))
}

pub struct RepositoryAnalyzer<S> {
    source: S,
    provider: Box<dyn ComplexityProvider>,
    budget: TokenBudget,
    options: AnalyzerOptions,
}

impl<S: RepositorySource> RepositoryAnalyzer<S> {
    pub fn new(
        source: S,
        provider: Box<dyn ComplexityProvider>,
        options: AnalyzerOptions,
    ) -> Result<Self, AnalyzerError> {
        let budget = TokenBudget::new(provider.model())?;
        Ok(Self {
            source,
            provider,
            budget,
            options,
        })
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Run the whole pipeline for one repository.
    ///
    /// Fetch failures abort the run. Files that fail analysis are logged and
    /// left out; if none succeed the run fails with `NoAnalyzableFiles`.
    pub async fn analyze(&mut self, locator: &str) -> Result<ComplexityReport, AnalyzerError> {
        info!("Starting analysis of {} [{}]", locator, Stage::Fetching);
        let files = match self
            .source
            .fetch_files(locator, self.options.max_files, &self.options.exclude_patterns)
            .await
        {
            Ok(files) => files,
            Err(e) => {
                error!("Analysis of {} {}: {}", locator, Stage::Failed, e);
                return Err(e);
            }
        };

        info!("Analyzing {} files [{}]", files.len(), Stage::Analyzing);
        let mut analyzed: Vec<FileComplexity> = Vec::with_capacity(files.len());
        for file in &files {
            match self.analyze_one(file).await {
                Ok(complexity) => {
                    info!("✓ {}: {:.1}/100", file.path, complexity.total_score);
                    analyzed.push(complexity);
                }
                Err(e) => warn!("✗ Failed to analyze {}: {}", file.path, e),
            }
        }

        debug!("Aggregating {} results [{}]", analyzed.len(), Stage::Aggregating);
        let (score, top_file) = match aggregate(&analyzed) {
            Some((score, top)) => (score, top.file_path.clone()),
            None => {
                error!("No analyzable files in {}", locator);
                return Err(AnalyzerError::NoAnalyzableFiles(locator.to_string()));
            }
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("total_files".to_string(), json!(files.len()));
        metadata.insert("analyzed_count".to_string(), json!(analyzed.len()));
        metadata.insert(
            "failed_count".to_string(),
            json!(files.len() - analyzed.len()),
        );
        metadata.insert(
            "excluded_patterns".to_string(),
            json!(self.options.exclude_patterns),
        );
        metadata.insert("provider".to_string(), json!(self.provider.name()));
        metadata.insert("model".to_string(), json!(self.provider.model()));
        metadata.insert("input_tokens".to_string(), json!(self.budget.input_tokens()));
        metadata.insert("output_tokens".to_string(), json!(self.budget.output_tokens()));
        metadata.insert(
            "estimated_cost_usd".to_string(),
            json!(self.budget.total_cost()),
        );

        let report = ComplexityReport::new(locator, analyzed, top_file, score, metadata, Utc::now())
            .map_err(|e| {
                error!("Analysis of {} {}: {}", locator, Stage::Failed, e);
                AnalyzerError::InvalidReport(e.to_string())
            })?;
        info!(
            "Analysis of {} {}: score {:.2}, top file {}",
            locator,
            Stage::Done,
            report.score(),
            report.top_file()
        );
        Ok(report)
    }

    async fn analyze_one(&mut self, file: &SourceFile) -> Result<FileComplexity, AnalyzerError> {
        let content = self
            .budget
            .truncate_to_limit(&file.content, None, self.options.token_buffer);
        let provider = self.provider.as_ref();
        let text: &str = &content;
        let path = file.path.as_str();
        let complexity = retry(self.options.max_attempts, self.options.retry_delay, move || {
            provider.analyze_file(text, path)
        })
        .await?;

        let input_tokens = self.budget.count_tokens(text) as u64;
        let output_tokens = self
            .budget
            .count_tokens(&serde_json::to_string(&complexity)?) as u64;
        self.budget.track_usage(input_tokens, output_tokens);
        Ok(complexity)
    }
}
