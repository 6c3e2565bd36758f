//! Report rendering.
//!
//! Renders a successful case review as plain text (the downloadable
//! layout), Markdown, or JSON.

use crate::config::ReportConfig;
use crate::models::{CaseReview, RunMetadata};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Generate the plain-text report.
///
/// Layout: banner, one `<NAME> ANALYSIS:` section per specialist in spec
/// order, then the final team analysis, separated by `=` rules.
pub fn generate_text_report(
    review: &CaseReview,
    metadata: &RunMetadata,
    config: &ReportConfig,
) -> String {
    let rule = "=".repeat(config.rule_width);
    let mut output = String::new();

    output.push_str("MEDICAL REPORT ANALYSIS\n");
    output.push_str(&format!(
        "Generated on: {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    output.push_str(&format!("Model: {}\n", metadata.model));
    output.push_str(&format!("{}\n\n", rule));

    if config.include_specialist_sections {
        for report in &review.reports {
            output.push_str(&format!(
                "{} ANALYSIS:\n{}\n\n{}\n\n",
                report.specialist.to_uppercase(),
                report.findings,
                rule
            ));
        }
    }

    output.push_str(&format!(
        "FINAL MULTIDISCIPLINARY TEAM ANALYSIS:\n{}\n\n{}\n",
        review.final_assessment, rule
    ));
    output.push_str("End of Report\n");

    output
}

/// Generate a Markdown report.
pub fn generate_markdown_report(
    review: &CaseReview,
    metadata: &RunMetadata,
    config: &ReportConfig,
) -> String {
    let mut output = String::new();

    output.push_str("# Medical Report Analysis\n\n");
    output.push_str(&generate_metadata_section(metadata));

    if config.include_specialist_sections {
        output.push_str("## Specialist Reports\n\n");
        for report in &review.reports {
            output.push_str(&format!(
                "### {} Analysis\n\n{}\n\n",
                report.specialist, report.findings
            ));
        }
    }

    output.push_str("## Final Multidisciplinary Assessment\n\n");
    output.push_str(&review.final_assessment);
    output.push_str("\n\n---\n\n");
    output.push_str(
        "*This analysis is for educational purposes only. Always consult \
         qualified healthcare professionals for medical advice.*\n",
    );

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model:** `{}`\n", metadata.model));
    section.push_str(&format!("- **Report Size:** {} bytes\n", metadata.report_bytes));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a RunMetadata,
    #[serde(flatten)]
    review: &'a CaseReview,
}

/// Generate a JSON report.
pub fn generate_json_report(review: &CaseReview, metadata: &RunMetadata) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { metadata, review })
        .context("Failed to serialize report to JSON")
}

/// Write a rendered report to disk.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
