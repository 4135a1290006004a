use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use repo_complexity::analysis::{AnalyzerOptions, RepositoryAnalyzer};
use repo_complexity::config::{self, Config};
use repo_complexity::github::GitHubClient;
use repo_complexity::markdown;
use repo_complexity::models::{ComplexityReport, ScorePolicy};
use repo_complexity::provider::{ProviderKind, ProviderSettings};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Rate the complexity of a GitHub repository's source files with an LLM",
    args_conflicts_with_subcommands = true
)]
struct Args {
    /// GitHub repository URL, e.g. https://github.com/owner/repo
    repository_url: Option<String>,
    /// LLM provider: openai or anthropic
    #[arg(long)]
    provider: Option<String>,
    /// Model name (defaults to the provider's default model)
    #[arg(long)]
    model: Option<String>,
    /// API key for the provider (defaults to OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
    /// Base URL of the provider API
    #[arg(long)]
    api_base_url: Option<String>,
    /// Maximum number of files to analyze
    #[arg(long)]
    max_files: Option<usize>,
    /// Glob pattern of files to skip (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,
    /// Output file (JSON if it ends with .json, Markdown otherwise)
    #[arg(short, long)]
    output: Option<String>,
    /// Write JSON instead of Markdown
    #[arg(long)]
    json: bool,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a project config file
    Init,
    /// Edit settings interactively
    Config {
        /// Edit the global config instead of the project one
        #[arg(short, long)]
        global: bool,
    },
    /// Render a Markdown report from a saved JSON report
    GenerateMd {
        /// JSON report path
        #[arg(short, long)]
        report: PathBuf,
        /// Markdown output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the remaining GitHub API quota
    RateLimit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let project_path = std::env::current_dir()?;

    match &args.command {
        Some(Commands::Init) => config::init_project(&project_path)?,
        Some(Commands::Config { global }) => config::configure_interactive(&project_path, *global)?,
        Some(Commands::GenerateMd { report, output }) => {
            markdown::generate_md_from_json(report, output.as_deref())?
        }
        Some(Commands::RateLimit) => {
            let rate = github_client().rate_limit().await?;
            println!(
                "GitHub API: {}/{} requests remaining (resets at {})",
                rate.remaining, rate.limit, rate.reset
            );
        }
        None => run_analysis(&args, &project_path).await?,
    }

    Ok(())
}

fn github_client() -> GitHubClient {
    GitHubClient::new(std::env::var("GITHUB_TOKEN").ok())
}

async fn run_analysis(args: &Args, project_path: &Path) -> Result<()> {
    let repository_url = args
        .repository_url
        .as_deref()
        .ok_or_else(|| anyhow!("A repository URL is required, e.g. https://github.com/owner/repo"))?;

    // Command-line arguments take precedence over the config file
    let config = Config::load(project_path)?;
    let provider_name = args.provider.clone().unwrap_or(config.provider);
    let api_key = match &args.api_key {
        Some(key) => key.clone(),
        None => ProviderKind::api_key_env(&provider_name.trim().to_ascii_lowercase())
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default(),
    };
    let settings = ProviderSettings {
        api_key,
        model: args.model.clone().or(config.model),
        base_url: args.api_base_url.clone().or(config.api_base_url),
    };
    let kind = ProviderKind::from_name(&provider_name, settings)?;
    if kind.settings().api_key.is_empty() {
        let var = ProviderKind::api_key_env(kind.name()).unwrap_or("API key");
        error!("{} not found in environment", var);
        return Err(anyhow!("{} not found in environment", var));
    }

    let options = AnalyzerOptions {
        max_files: args.max_files.unwrap_or(config.max_files),
        exclude_patterns: if args.exclude.is_empty() {
            config.exclude_patterns
        } else {
            args.exclude.clone()
        },
        max_attempts: config.max_attempts,
        ..AnalyzerOptions::default()
    };

    info!("Repository: {}", repository_url);
    info!(
        "Provider: {} (model: {})",
        kind,
        args.model.as_deref().unwrap_or("default")
    );

    let provider = kind.into_provider(ScorePolicy::default());
    let mut analyzer = RepositoryAnalyzer::new(github_client(), provider, options)?;
    let report = analyzer.analyze(repository_url).await?;

    print_summary(&report);

    let output_path = match args.output.clone().or(config.output) {
        Some(path) => path,
        None if args.json => "complexity_report.json".to_string(),
        None => "complexity_report.md".to_string(),
    };
    let output_path = PathBuf::from(output_path);
    if args.json || output_path.extension().map_or(false, |ext| ext == "json") {
        markdown::write_json_report(&report, &output_path)?;
    } else {
        markdown::write_markdown_report(&report, &output_path)?;
    }
    println!("\nReport saved to: {}", output_path.display());
    Ok(())
}

fn print_summary(report: &ComplexityReport) {
    println!("\nAnalysis complete");
    println!("  Repository:         {}", report.repository_url());
    println!("  Files analyzed:     {}", report.analyzed_files().len());
    println!("  Average complexity: {:.2}/100", report.score());
    println!("  Top file:           {}", report.top_file());
    if let Some(cost) = report
        .metadata()
        .get("estimated_cost_usd")
        .and_then(|v| v.as_f64())
    {
        println!("  Estimated cost:     ${:.4}", cost);
    }
}
