use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum trimmed length of a file's reasoning text.
pub const MIN_REASONING_LEN: usize = 10;

/// Default distance the total score may fall below min(cyclomatic, architectural).
pub const DEFAULT_TOTAL_TOLERANCE: f64 = 20.0;

/// Acceptance rules applied to a backend's assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePolicy {
    pub total_tolerance: f64,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            total_tolerance: DEFAULT_TOTAL_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComplexity {
    pub file_path: String,

    pub total_score: f64,

    #[serde(alias = "cyclomatic_complexity")]
    pub cyclomatic_score: f64,

    #[serde(alias = "architectural_complexity")]
    pub architectural_score: f64,

    #[serde(alias = "algorithmic_complexity")]
    pub algorithmic_score: f64,

    pub line_count: u64,

    pub function_count: u64,

    pub class_count: u64,

    #[serde(default, alias = "design_patterns")]
    pub patterns_detected: Vec<String>,

    pub reasoning: String,
}

impl FileComplexity {
    /// Check every field constraint and the total-score sanity bound.
    pub fn validate(&self, policy: &ScorePolicy) -> Result<(), ValidationError> {
        if self.file_path.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        for (field, value) in [
            ("total_score", self.total_score),
            ("cyclomatic_score", self.cyclomatic_score),
            ("architectural_score", self.architectural_score),
            ("algorithmic_score", self.algorithmic_score),
        ] {
            check_score(field, value)?;
        }
        if self.line_count == 0 {
            return Err(ValidationError::NoLines);
        }
        if self.reasoning.trim().chars().count() < MIN_REASONING_LEN {
            return Err(ValidationError::ReasoningTooShort {
                min: MIN_REASONING_LEN,
            });
        }
        let floor = self.cyclomatic_score.min(self.architectural_score);
        if self.total_score < floor - policy.total_tolerance {
            return Err(ValidationError::IncoherentTotal {
                total: self.total_score,
                floor,
                tolerance: policy.total_tolerance,
            });
        }
        Ok(())
    }
}

fn check_score(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ScoreOutOfRange { field, value })
    }
}

/// Repository-level result of one analysis run.
///
/// Built once through [`ComplexityReport::new`]; fields are read through accessors so
/// the top-file invariant cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReportRecord")]
pub struct ComplexityReport {
    repository_url: String,
    analyzed_files: Vec<FileComplexity>,
    top_file: String,
    score: f64,
    metadata: BTreeMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
}

/// Serialized shape of a report; goes through [`ComplexityReport::new`] on load.
#[derive(Deserialize)]
struct ReportRecord {
    repository_url: String,
    analyzed_files: Vec<FileComplexity>,
    top_file: String,
    score: f64,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ReportRecord> for ComplexityReport {
    type Error = ValidationError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        ComplexityReport::new(
            record.repository_url,
            record.analyzed_files,
            record.top_file,
            record.score,
            record.metadata,
            record.timestamp,
        )
    }
}

impl ComplexityReport {
    pub fn new(
        repository_url: impl Into<String>,
        analyzed_files: Vec<FileComplexity>,
        top_file: impl Into<String>,
        score: f64,
        metadata: BTreeMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let report = Self {
            repository_url: repository_url.into(),
            analyzed_files,
            top_file: top_file.into(),
            score,
            metadata,
            timestamp,
        };
        report.validate()?;
        Ok(report)
    }

    /// Check the report invariants: at least one file, score in range, known top file.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.analyzed_files.is_empty() {
            return Err(ValidationError::EmptyReport);
        }
        check_score("score", self.score)?;
        if !self
            .analyzed_files
            .iter()
            .any(|f| f.file_path == self.top_file)
        {
            return Err(ValidationError::UnknownTopFile(self.top_file.clone()));
        }
        Ok(())
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn analyzed_files(&self) -> &[FileComplexity] {
        &self.analyzed_files
    }

    pub fn top_file(&self) -> &str {
        &self.top_file
    }

    /// The assessment of the top file.
    pub fn top(&self) -> Option<&FileComplexity> {
        self.analyzed_files
            .iter()
            .find(|f| f.file_path == self.top_file)
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Files with a total score at or above `threshold`, most complex first.
    pub fn files_above(&self, threshold: f64) -> Vec<&FileComplexity> {
        let mut files: Vec<&FileComplexity> = self
            .analyzed_files
            .iter()
            .filter(|f| f.total_score >= threshold)
            .collect();
        files.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        files
    }

    /// How often each design pattern was detected, most frequent first.
    ///
    /// Patterns with equal counts keep the order in which they were first seen.
    pub fn pattern_distribution(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for pattern in self
            .analyzed_files
            .iter()
            .flat_map(|f| f.patterns_detected.iter())
        {
            match counts.iter_mut().find(|(name, _)| name == pattern) {
                Some((_, count)) => *count += 1,
                None => counts.push((pattern.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}
