//! SVG charts rendered straight from the dataset file.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::analysis::{DatasetTable, Metric};
use crate::collect::types::PrStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Failed to load dataset: {0}")]
    Load(#[from] StoreError),

    #[error("Failed to write chart: {0}")]
    Write(#[from] std::io::Error),
}

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 420.0;
const MARGIN: f64 = 60.0;
const MERGED_COLOR: &str = "#2e7d32";
const CLOSED_COLOR: &str = "#c62828";

/// Metrics shown in the median comparison chart.
const COMPARED: [Metric; 6] = [
    Metric::FilesChanged,
    Metric::TotalLinesChanged,
    Metric::TimeToCloseHours,
    Metric::NumParticipants,
    Metric::NumComments,
    Metric::NumReviews,
];

/// Render every chart for the dataset at `dataset_path` into `out_dir`.
#[instrument(skip_all, fields(dataset = %dataset_path.display()))]
pub fn generate_all(dataset_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PlotError> {
    let table = DatasetTable::load(dataset_path)?;
    fs::create_dir_all(out_dir)?;

    let charts = [
        ("status_distribution.svg", status_distribution(&table)),
        ("median_comparison.svg", median_comparison(&table)),
        ("correlation_heatmap.svg", correlation_heatmap(&table)),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (name, svg) in charts {
        let path = out_dir.join(name);
        fs::write(&path, svg)?;
        debug!(path = %path.display(), "chart written");
        written.push(path);
    }
    info!(charts = written.len(), dir = %out_dir.display(), "charts generated");
    Ok(written)
}

fn open_svg(title: &str) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    ));
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
    svg.push_str(&format!(
        r#"<text x="{}" y="30" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
        WIDTH / 2.0,
        escape(title)
    ));
    svg
}

/// Bar chart of MERGED vs CLOSED counts.
fn status_distribution(table: &DatasetTable) -> String {
    let bars = [
        ("MERGED", table.count(PrStatus::Merged), MERGED_COLOR),
        ("CLOSED", table.count(PrStatus::Closed), CLOSED_COLOR),
    ];
    let max = bars.iter().map(|b| b.1).max().unwrap_or(0).max(1) as f64;
    let plot_height = HEIGHT - 2.0 * MARGIN;
    let slot = (WIDTH - 2.0 * MARGIN) / bars.len() as f64;

    let mut svg = open_svg("PR status distribution");
    for (i, (label, count, color)) in bars.iter().enumerate() {
        let height = *count as f64 / max * plot_height;
        let x = MARGIN + i as f64 * slot + slot * 0.2;
        let y = HEIGHT - MARGIN - height;
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="{y:.1}" width="{:.1}" height="{height:.1}" fill="{color}"/>"#,
            slot * 0.6
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">{label} ({count})</text>"#,
            x + slot * 0.3,
            HEIGHT - MARGIN + 20.0
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

/// Grouped bars of per-status medians, each metric scaled to its own maximum.
fn median_comparison(table: &DatasetTable) -> String {
    let plot_height = HEIGHT - 2.0 * MARGIN;
    let slot = (WIDTH - 2.0 * MARGIN) / COMPARED.len() as f64;
    let bar_width = slot * 0.35;

    let mut svg = open_svg("Median by status (scaled per metric)");
    for (i, metric) in COMPARED.iter().enumerate() {
        let summary = table.describe(*metric);
        let merged = summary.merged.map_or(0.0, |s| s.median);
        let closed = summary.closed.map_or(0.0, |s| s.median);
        let scale = merged.max(closed);
        let x0 = MARGIN + i as f64 * slot + slot * 0.1;

        for (j, (value, color)) in [(merged, MERGED_COLOR), (closed, CLOSED_COLOR)].iter().enumerate() {
            let height = if scale > 0.0 { value / scale * plot_height } else { 0.0 };
            svg.push_str(&format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{bar_width:.1}" height="{height:.1}" fill="{color}"><title>{value:.1}</title></rect>"#,
                x0 + j as f64 * bar_width,
                HEIGHT - MARGIN - height
            ));
        }
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="10">{}</text>"#,
            x0 + bar_width,
            HEIGHT - MARGIN + 16.0,
            metric.column()
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

/// Spearman ρ between every pair of attributes, blue negative to red positive.
fn correlation_heatmap(table: &DatasetTable) -> String {
    let metrics: Vec<Metric> = Metric::ATTRIBUTES
        .into_iter()
        .chain([Metric::StatusNumeric])
        .collect();
    let n = metrics.len() as f64;
    let left = 150.0;
    let top = 50.0;
    let cell = ((WIDTH - left - 20.0).min(HEIGHT - top - 20.0) / n).floor();

    let mut svg = open_svg("Spearman correlation matrix");
    for (row, a) in metrics.iter().enumerate() {
        let y = top + row as f64 * cell;
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="10">{}</text>"#,
            left - 6.0,
            y + cell * 0.6,
            a.column()
        ));
        for (col, b) in metrics.iter().enumerate() {
            let rho = if row == col {
                Some(1.0)
            } else {
                table.correlate(*a, *b).map(|c| c.coefficient)
            };
            let x = left + col as f64 * cell;
            let label = rho.map_or_else(|| "-".to_string(), |r| format!("{r:.2}"));
            svg.push_str(&format!(
                r#"<rect x="{x:.1}" y="{y:.1}" width="{cell:.1}" height="{cell:.1}" fill="{}" stroke="white"/>"#,
                heat_color(rho)
            ));
            svg.push_str(&format!(
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="8">{label}</text>"#,
                x + cell / 2.0,
                y + cell * 0.6
            ));
        }
    }
    svg.push_str("</svg>\n");
    svg
}

fn heat_color(rho: Option<f64>) -> String {
    let Some(rho) = rho else {
        return "#e0e0e0".to_string();
    };
    let intensity = (rho.abs().min(1.0) * 200.0) as u8;
    let fade = 255 - intensity;
    if rho >= 0.0 {
        format!("#ff{fade:02x}{fade:02x}")
    } else {
        format!("#{fade:02x}{fade:02x}ff")
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
