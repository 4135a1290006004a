use async_trait::async_trait;
use repo_complexity::analysis::{AnalyzerOptions, RepositoryAnalyzer};
use repo_complexity::error::AnalyzerError;
use repo_complexity::github::{RepositorySource, SourceFile};
use repo_complexity::models::{ComplexityReport, FileComplexity};
use repo_complexity::provider::ComplexityProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Source that serves a fixed file list, or a fixed error.
struct StaticSource {
    files: Result<Vec<SourceFile>, AnalyzerError>,
    seen: Arc<Mutex<Vec<(usize, Vec<String>)>>>,
}

impl StaticSource {
    fn with_files(paths: &[&str]) -> Self {
        Self {
            files: Ok(paths
                .iter()
                .map(|p| SourceFile {
                    path: p.to_string(),
                    content: format!("# {}\nprint('hi')\n", p),
                })
                .collect()),
            seen: Arc::default(),
        }
    }

    fn failing(err: AnalyzerError) -> Self {
        Self {
            files: Err(err),
            seen: Arc::default(),
        }
    }
}

#[async_trait]
impl RepositorySource for StaticSource {
    async fn fetch_files(
        &self,
        _locator: &str,
        max_files: usize,
        exclude_patterns: &[String],
    ) -> Result<Vec<SourceFile>, AnalyzerError> {
        self.seen
            .lock()
            .unwrap()
            .push((max_files, exclude_patterns.to_vec()));
        self.files.clone()
    }
}

/// Provider that returns a preset score per path; unknown paths fail.
struct ScriptedProvider {
    scores: HashMap<String, f64>,
    calls: Arc<AtomicUsize>,
    failure: AnalyzerError,
}

impl ScriptedProvider {
    fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(p, s)| (p.to_string(), *s)).collect(),
            calls: Arc::default(),
            failure: AnalyzerError::ProviderResponse("schema mismatch".to_string()),
        }
    }
}

#[async_trait]
impl ComplexityProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "gpt-4"
    }

    async fn analyze_file(
        &self,
        _file_content: &str,
        file_path: &str,
    ) -> Result<FileComplexity, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = *self.scores.get(file_path).ok_or_else(|| self.failure.clone())?;
        Ok(FileComplexity {
            file_path: file_path.to_string(),
            total_score: score,
            cyclomatic_score: score,
            architectural_score: score,
            algorithmic_score: score,
            line_count: 2,
            function_count: 0,
            class_count: 0,
            patterns_detected: vec!["Facade".to_string()],
            reasoning: "Single print statement at line 2".to_string(),
        })
    }
}

async fn run(
    source: StaticSource,
    provider: ScriptedProvider,
    options: AnalyzerOptions,
) -> Result<ComplexityReport, AnalyzerError> {
    let mut analyzer = RepositoryAnalyzer::new(source, Box::new(provider), options).unwrap();
    analyzer.analyze("https://github.com/owner/repo").await
}

#[tokio::test]
async fn test_mean_and_top_file() {
    let source = StaticSource::with_files(&["src/a.py", "src/b.py"]);
    let provider = ScriptedProvider::new(&[("src/a.py", 30.0), ("src/b.py", 70.0)]);

    let report = run(source, provider, AnalyzerOptions::default()).await.unwrap();
    assert_eq!(report.score(), 50.0);
    assert_eq!(report.top_file(), "src/b.py");
    assert_eq!(report.repository_url(), "https://github.com/owner/repo");
    let paths: Vec<&str> = report
        .analyzed_files()
        .iter()
        .map(|f| f.file_path.as_str())
        .collect();
    assert_eq!(paths, vec!["src/a.py", "src/b.py"]);
}

#[tokio::test]
async fn test_failed_files_are_skipped() {
    let source = StaticSource::with_files(&["a.py", "broken.py", "c.py"]);
    let provider = ScriptedProvider::new(&[("a.py", 20.0), ("c.py", 40.0)]);
    let calls = provider.calls.clone();

    let report = run(source, provider, AnalyzerOptions::default()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.analyzed_files().len(), 2);
    assert_eq!(report.score(), 30.0);
    assert_eq!(report.metadata()["total_files"], serde_json::json!(3));
    assert_eq!(report.metadata()["analyzed_count"], serde_json::json!(2));
    assert_eq!(report.metadata()["failed_count"], serde_json::json!(1));
    assert_eq!(report.metadata()["provider"], serde_json::json!("scripted"));
    assert!(report.metadata()["input_tokens"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_all_files_fail() {
    let source = StaticSource::with_files(&["x.py", "y.py"]);
    let provider = ScriptedProvider::new(&[]);

    let err = run(source, provider, AnalyzerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::NoAnalyzableFiles(_)));
}

#[tokio::test]
async fn test_empty_listing_is_fatal() {
    let err = run(
        StaticSource::with_files(&[]),
        ScriptedProvider::new(&[]),
        AnalyzerOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AnalyzerError::NoAnalyzableFiles(_)));
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_analysis() {
    let source = StaticSource::failing(AnalyzerError::source_fetch(Some(404), "not found"));
    let provider = ScriptedProvider::new(&[("a.py", 10.0)]);
    let calls = provider.calls.clone();

    let err = run(source, provider, AnalyzerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::SourceFetch { status: Some(404), .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_options_reach_the_source() {
    let source = StaticSource::with_files(&["a.py"]);
    let seen = source.seen.clone();
    let options = AnalyzerOptions {
        max_files: 7,
        exclude_patterns: vec!["vendor/*".to_string()],
        ..AnalyzerOptions::default()
    };

    let report = run(source, ScriptedProvider::new(&[("a.py", 12.0)]), options)
        .await
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(7usize, vec!["vendor/*".to_string()])]
    );
    assert_eq!(
        report.metadata()["excluded_patterns"],
        serde_json::json!(["vendor/*"])
    );
}

#[tokio::test]
async fn test_report_round_trips_through_json() {
    let source = StaticSource::with_files(&["a.py", "b.py", "c.py"]);
    let provider = ScriptedProvider::new(&[("a.py", 33.3), ("b.py", 66.6), ("c.py", 66.6)]);

    let report = run(source, provider, AnalyzerOptions::default()).await.unwrap();
    assert_eq!(report.top_file(), "b.py");

    let json = serde_json::to_string(&report).unwrap();
    let restored: ComplexityReport = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, report);
    assert_eq!(restored.pattern_distribution(), vec![("Facade".to_string(), 3)]);
}

#[tokio::test]
async fn test_out_of_range_aggregate_is_an_invalid_report() {
    // the scripted provider skips per-file validation, so a 150 reaches aggregation
    let source = StaticSource::with_files(&["a.py", "b.py"]);
    let provider = ScriptedProvider::new(&[("a.py", 150.0), ("b.py", 150.0)]);

    let err = run(source, provider, AnalyzerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidReport(_)));
}
