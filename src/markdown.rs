use crate::models::ComplexityReport;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Files at or above this total score are listed separately.
pub const HIGH_COMPLEXITY_THRESHOLD: f64 = 70.0;

const TOP_N: usize = 5;

pub fn render_markdown(report: &ComplexityReport) -> String {
    let mut md_content = String::new();
    md_content.push_str("# Complexity Report\n\n");

    md_content.push_str("## Summary\n\n");
    md_content.push_str("| Metric | Value |\n|---|---|\n");
    md_content.push_str(&format!("| Repository | {} |\n", report.repository_url()));
    md_content.push_str(&format!(
        "| Files Analyzed | {} |\n",
        report.analyzed_files().len()
    ));
    md_content.push_str(&format!("| Average Complexity | {:.2}/100 |\n", report.score()));
    md_content.push_str(&format!("| Top File | {} |\n", report.top_file()));
    md_content.push_str(&format!(
        "| Generated | {} |\n\n",
        report.timestamp().to_rfc3339()
    ));

    let mut ranked: Vec<_> = report.analyzed_files().iter().collect();
    ranked.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    md_content.push_str(&format!("## Top {} Most Complex Files\n\n", TOP_N));
    md_content.push_str("| Rank | File | Score | Cyclomatic | Architectural | Algorithmic |\n");
    md_content.push_str("|---|---|---:|---:|---:|---:|\n");
    for (idx, file) in ranked.iter().take(TOP_N).enumerate() {
        md_content.push_str(&format!(
            "| #{} | {} | {:.1} | {:.1} | {:.1} | {:.1} |\n",
            idx + 1,
            file.file_path,
            file.total_score,
            file.cyclomatic_score,
            file.architectural_score,
            file.algorithmic_score
        ));
    }
    md_content.push('\n');

    if let Some(top) = report.top() {
        md_content.push_str(&format!("## Most Complex File: {}\n\n", top.file_path));
        md_content.push_str(&format!(
            "- Lines: {}\n- Functions: {}\n- Classes: {}\n\n",
            top.line_count, top.function_count, top.class_count
        ));
        md_content.push_str(&format!("{}\n\n", top.reasoning.trim()));
        if !top.patterns_detected.is_empty() {
            md_content.push_str(&format!(
                "Design patterns detected: {}\n\n",
                top.patterns_detected.join(", ")
            ));
        }
    }

    let distribution = report.pattern_distribution();
    if !distribution.is_empty() {
        md_content.push_str("## Design Patterns\n\n");
        for (pattern, count) in &distribution {
            md_content.push_str(&format!("- {}: {}\n", pattern, count));
        }
        md_content.push('\n');
    }

    let high = report.files_above(HIGH_COMPLEXITY_THRESHOLD);
    if !high.is_empty() {
        md_content.push_str(&format!(
            "## Files Scoring {:.0} or Higher\n\n",
            HIGH_COMPLEXITY_THRESHOLD
        ));
        for file in high {
            md_content.push_str(&format!("- {} ({:.1})\n", file.file_path, file.total_score));
        }
        md_content.push('\n');
    }

    md_content
}

pub fn write_markdown_report(report: &ComplexityReport, output_path: &Path) -> Result<()> {
    create_parent(output_path)?;
    std::fs::write(output_path, render_markdown(report))?;
    info!("Markdown report written to {}", output_path.display());
    Ok(())
}

pub fn write_json_report(report: &ComplexityReport, output_path: &Path) -> Result<()> {
    create_parent(output_path)?;
    let json_report = serde_json::to_string_pretty(report)?;
    std::fs::write(output_path, json_report)?;
    info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Load and validate a report saved as JSON.
pub fn read_json_report(report_path: &Path) -> Result<ComplexityReport> {
    let report_content = std::fs::read_to_string(report_path)
        .with_context(|| format!("cannot read {}", report_path.display()))?;
    let report: ComplexityReport = serde_json::from_str(&report_content)
        .with_context(|| format!("invalid report {}", report_path.display()))?;
    Ok(report)
}

pub fn generate_md_from_json(report_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let report = read_json_report(report_path)?;
    let output = output_path.unwrap_or_else(|| Path::new("complexity_report.md"));
    write_markdown_report(&report, output)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
