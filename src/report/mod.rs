pub mod types;

pub use types::{QuestionSection, Report, Strength};

use crate::analysis::{AnalysisResults, Correlation, Summary};
use crate::collect::types::PrStatus;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Assemble a Report from computed analysis results.
pub fn build(results: &AnalysisResults) -> Report {
    Report {
        dataset: results.dataset.clone(),
        total: results.total_prs,
        merged: results.merged,
        closed: results.closed,
        summaries: results.summaries.clone(),
        sections: results
            .research_questions
            .iter()
            .cloned()
            .map(QuestionSection::from)
            .collect(),
    }
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(dataset = %report.dataset, prs = report.total))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

fn print_terminal_report(report: &Report) {
    println!();
    println!("Dataset: {}", report.dataset);
    println!(
        "PRs: {} | MERGED: {} | CLOSED: {}",
        report.total, report.merged, report.closed
    );
    println!();

    println!("═══ Medians ═══");
    println!("{:<22} {:>10} {:>10} {:>10}", "metric", "overall", "merged", "closed");
    for summary in &report.summaries {
        println!(
            "{:<22} {:>10} {:>10} {:>10}",
            summary.metric.column(),
            median(summary.overall),
            median(summary.merged),
            median(summary.closed)
        );
    }
    println!();

    for section in &report.sections {
        println!("═══ {}: {} ═══", section.id, section.title);
        for row in &section.rows {
            match (row.correlation, row.strength()) {
                (Some(c), Some(strength)) => println!(
                    "  • {} vs {}: ρ = {:.4} ({}) p = {:.6} {}",
                    row.attribute,
                    section.outcome,
                    c.coefficient,
                    colorize_strength(strength),
                    c.p_value,
                    colorize_significance(c.significant)
                ),
                _ => println!(
                    "  • {} vs {}: {}",
                    row.attribute,
                    section.outcome,
                    "undefined".dimmed()
                ),
            }
        }
        println!();
    }
}

/// Write the report as a markdown file.
fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str("# Code review analysis\n\n");
    md.push_str(&format!("**Dataset:** `{}`\n\n", report.dataset));
    md.push_str(&format!("- **Total PRs:** {}\n", report.total));
    md.push_str(&format!("- **MERGED:** {} ({:.1}%)\n", report.merged, percent(report.merged, report.total)));
    md.push_str(&format!("- **CLOSED:** {} ({:.1}%)\n\n", report.closed, percent(report.closed, report.total)));

    md.push_str("## Medians\n\n");
    md.push_str("| Metric | Overall | MERGED | CLOSED |\n");
    md.push_str("|--------|---------|--------|--------|\n");
    for summary in &report.summaries {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            summary.metric.column(),
            median(summary.overall),
            median(summary.merged),
            median(summary.closed)
        ));
    }
    md.push('\n');

    for section in &report.sections {
        md.push_str(&format!("## {}: {}\n\n", section.id, section.title));
        md.push_str(&format!("Outcome: `{}`\n\n", section.outcome));
        let grouped = section.rows.iter().any(|r| !r.by_status.is_empty());
        if grouped {
            md.push_str("| Attribute | ρ | p-value | Strength | Significant | ρ MERGED | ρ CLOSED |\n");
            md.push_str("|-----------|---|---------|----------|-------------|----------|----------|\n");
        } else {
            md.push_str("| Attribute | ρ | p-value | Strength | Significant |\n");
            md.push_str("|-----------|---|---------|----------|-------------|\n");
        }
        for row in &section.rows {
            match (row.correlation, row.strength()) {
                (Some(c), Some(strength)) => md.push_str(&format!(
                    "| {} | {:.4} | {:.6} | {} | {} |",
                    row.attribute,
                    c.coefficient,
                    c.p_value,
                    strength,
                    if c.significant { "yes" } else { "no" }
                )),
                _ => md.push_str(&format!("| {} | n/a | n/a | n/a | n/a |", row.attribute)),
            }
            if grouped {
                md.push_str(&format!(
                    " {} | {} |",
                    rho(row.within(PrStatus::Merged)),
                    rho(row.within(PrStatus::Closed))
                ));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    std::fs::write(path, md)?;
    Ok(())
}

fn rho(correlation: Option<Correlation>) -> String {
    correlation.map_or_else(|| "n/a".to_string(), |c| format!("{:.4}", c.coefficient))
}

fn median(summary: Option<Summary>) -> String {
    summary.map_or_else(|| "-".to_string(), |s| format!("{:.1}", s.median))
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn colorize_strength(strength: Strength) -> colored::ColoredString {
    match strength {
        Strength::Strong => "STRONG".red().bold(),
        Strength::Moderate => "MODERATE".yellow().bold(),
        Strength::Weak => "WEAK".green(),
        Strength::Negligible => "NEGLIGIBLE".dimmed(),
    }
}

fn colorize_significance(significant: bool) -> colored::ColoredString {
    if significant {
        "significant".green().bold()
    } else {
        "not significant".dimmed()
    }
}
