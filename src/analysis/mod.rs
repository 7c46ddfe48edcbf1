pub mod stats;

pub use stats::{Correlation, Summary};

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::collect::types::{PrMetricRecord, PrStatus};
use crate::store::{self, StoreError};

/// Numeric columns of the dataset, plus the derived merge indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FilesChanged,
    Additions,
    Deletions,
    TotalLinesChanged,
    TimeToCloseHours,
    BodyLength,
    NumParticipants,
    NumComments,
    NumReviews,
    /// 1 for MERGED, 0 for CLOSED
    StatusNumeric,
}

impl Metric {
    /// The attribute columns, in report order.
    pub const ATTRIBUTES: [Metric; 9] = [
        Metric::FilesChanged,
        Metric::Additions,
        Metric::Deletions,
        Metric::TotalLinesChanged,
        Metric::TimeToCloseHours,
        Metric::BodyLength,
        Metric::NumParticipants,
        Metric::NumComments,
        Metric::NumReviews,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::FilesChanged => "files_changed",
            Metric::Additions => "additions",
            Metric::Deletions => "deletions",
            Metric::TotalLinesChanged => "total_lines_changed",
            Metric::TimeToCloseHours => "time_to_close_hours",
            Metric::BodyLength => "body_length",
            Metric::NumParticipants => "num_participants",
            Metric::NumComments => "num_comments",
            Metric::NumReviews => "num_reviews",
            Metric::StatusNumeric => "status_numeric",
        }
    }

    pub fn value(self, record: &PrMetricRecord) -> f64 {
        match self {
            Metric::FilesChanged => record.files_changed as f64,
            Metric::Additions => record.additions as f64,
            Metric::Deletions => record.deletions as f64,
            Metric::TotalLinesChanged => record.total_lines_changed as f64,
            Metric::TimeToCloseHours => record.time_to_close_hours,
            Metric::BodyLength => record.body_length as f64,
            Metric::NumParticipants => record.num_participants as f64,
            Metric::NumComments => record.num_comments as f64,
            Metric::NumReviews => record.num_reviews as f64,
            Metric::StatusNumeric => match record.status {
                PrStatus::Merged => 1.0,
                PrStatus::Closed => 0.0,
            },
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The dataset as loaded by the statistics stage.
pub struct DatasetTable {
    records: Vec<PrMetricRecord>,
}

impl DatasetTable {
    pub fn new(records: Vec<PrMetricRecord>) -> Self {
        Self { records }
    }

    /// Load the CSV written by the collection stage.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let records = store::read_csv(path)?;
        info!(
            prs = records.len(),
            merged = records.iter().filter(|r| r.status == PrStatus::Merged).count(),
            closed = records.iter().filter(|r| r.status == PrStatus::Closed).count(),
            "dataset loaded"
        );
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, status: PrStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn column(&self, metric: Metric) -> Vec<f64> {
        self.records.iter().map(|r| metric.value(r)).collect()
    }

    fn column_where(&self, metric: Metric, status: PrStatus) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| metric.value(r))
            .collect()
    }

    /// Spearman correlation between two columns over the whole dataset.
    pub fn correlate(&self, a: Metric, b: Metric) -> Option<Correlation> {
        stats::spearman(&self.column(a), &self.column(b))
    }

    /// Spearman correlation computed separately within each status group.
    pub fn correlate_grouped(&self, a: Metric, b: Metric) -> Vec<(PrStatus, Option<Correlation>)> {
        [PrStatus::Merged, PrStatus::Closed]
            .into_iter()
            .map(|status| {
                let corr = stats::spearman(&self.column_where(a, status), &self.column_where(b, status));
                (status, corr)
            })
            .collect()
    }

    /// Summary of a column overall and per status.
    pub fn describe(&self, metric: Metric) -> MetricSummary {
        MetricSummary {
            metric,
            overall: stats::summarize(&self.column(metric)),
            merged: stats::summarize(&self.column_where(metric, PrStatus::Merged)),
            closed: stats::summarize(&self.column_where(metric, PrStatus::Closed)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub overall: Option<Summary>,
    pub merged: Option<Summary>,
    pub closed: Option<Summary>,
}

/// One research question: a set of attributes correlated against an outcome.
#[derive(Debug, Clone, Copy)]
pub struct ResearchQuestion {
    pub id: &'static str,
    pub title: &'static str,
    pub outcome: Metric,
    pub attributes: &'static [Metric],
}

const SIZE: &[Metric] = &[
    Metric::FilesChanged,
    Metric::Additions,
    Metric::Deletions,
    Metric::TotalLinesChanged,
];
const TIME: &[Metric] = &[Metric::TimeToCloseHours];
const DESCRIPTION: &[Metric] = &[Metric::BodyLength];
const INTERACTIONS: &[Metric] = &[Metric::NumParticipants, Metric::NumComments];

pub const RESEARCH_QUESTIONS: [ResearchQuestion; 8] = [
    ResearchQuestion { id: "RQ01", title: "PR size vs final status", outcome: Metric::StatusNumeric, attributes: SIZE },
    ResearchQuestion { id: "RQ02", title: "Review time vs final status", outcome: Metric::StatusNumeric, attributes: TIME },
    ResearchQuestion { id: "RQ03", title: "Description length vs final status", outcome: Metric::StatusNumeric, attributes: DESCRIPTION },
    ResearchQuestion { id: "RQ04", title: "Interactions vs final status", outcome: Metric::StatusNumeric, attributes: INTERACTIONS },
    ResearchQuestion { id: "RQ05", title: "PR size vs number of reviews", outcome: Metric::NumReviews, attributes: SIZE },
    ResearchQuestion { id: "RQ06", title: "Review time vs number of reviews", outcome: Metric::NumReviews, attributes: TIME },
    ResearchQuestion { id: "RQ07", title: "Description length vs number of reviews", outcome: Metric::NumReviews, attributes: DESCRIPTION },
    ResearchQuestion { id: "RQ08", title: "Interactions vs number of reviews", outcome: Metric::NumReviews, attributes: INTERACTIONS },
];

/// One attribute correlated against a research question's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeCorrelation {
    pub attribute: Metric,
    pub overall: Option<Correlation>,
    /// Within each status group; empty when the outcome is the status itself.
    pub by_status: Vec<(PrStatus, Option<Correlation>)>,
}

/// Correlations computed for one research question.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub id: &'static str,
    pub title: &'static str,
    pub outcome: Metric,
    pub correlations: Vec<AttributeCorrelation>,
}

/// Answer every research question against the dataset.
pub fn run_all(table: &DatasetTable) -> Vec<QuestionResult> {
    RESEARCH_QUESTIONS
        .iter()
        .map(|rq| {
            let correlations = rq
                .attributes
                .iter()
                .map(|&attribute| AttributeCorrelation {
                    attribute,
                    overall: table.correlate(attribute, rq.outcome),
                    by_status: if rq.outcome == Metric::StatusNumeric {
                        Vec::new()
                    } else {
                        table.correlate_grouped(attribute, rq.outcome)
                    },
                })
                .collect::<Vec<_>>();
            for c in &correlations {
                debug!(rq = rq.id, attribute = %c.attribute, rho = ?c.overall.map(|c| c.coefficient), "correlation");
            }
            QuestionResult {
                id: rq.id,
                title: rq.title,
                outcome: rq.outcome,
                correlations,
            }
        })
        .collect()
}

/// Everything computed from one dataset. Serialized as the
/// `analysis_results_<ts>.json` report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResults {
    pub dataset: String,
    pub total_prs: usize,
    pub merged: usize,
    pub closed: usize,
    pub summaries: Vec<MetricSummary>,
    pub research_questions: Vec<QuestionResult>,
}

pub fn analyze(table: &DatasetTable, dataset: &str) -> AnalysisResults {
    AnalysisResults {
        dataset: dataset.to_string(),
        total_prs: table.len(),
        merged: table.count(PrStatus::Merged),
        closed: table.count(PrStatus::Closed),
        summaries: Metric::ATTRIBUTES.iter().map(|&metric| table.describe(metric)).collect(),
        research_questions: run_all(table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_record;

    fn table() -> DatasetTable {
        let records = (1..=6u64)
            .map(|n| {
                let status = if n % 2 == 0 { PrStatus::Merged } else { PrStatus::Closed };
                let mut r = sample_record(n, status);
                r.additions = n * 10;
                r.deletions = n;
                r.total_lines_changed = r.additions + r.deletions;
                r.num_reviews = n;
                r.body_length = 100 - n;
                r
            })
            .collect();
        DatasetTable::new(records)
    }

    #[test]
    fn test_metric_display_matches_csv_column() {
        assert_eq!(Metric::TimeToCloseHours.to_string(), "time_to_close_hours");
        assert_eq!(Metric::StatusNumeric.column(), "status_numeric");
    }

    #[test]
    fn test_status_numeric() {
        let t = table();
        assert_eq!(t.column(Metric::StatusNumeric), vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(t.count(PrStatus::Merged), 3);
    }

    #[test]
    fn test_correlate_named_columns() {
        let t = table();
        let size_vs_reviews = t.correlate(Metric::Additions, Metric::NumReviews).unwrap();
        assert!((size_vs_reviews.coefficient - 1.0).abs() < 1e-12);
        let body_vs_reviews = t.correlate(Metric::BodyLength, Metric::NumReviews).unwrap();
        assert!((body_vs_reviews.coefficient + 1.0).abs() < 1e-12);
        // constant column
        assert!(t.correlate(Metric::FilesChanged, Metric::NumReviews).is_none());
    }

    #[test]
    fn test_correlate_grouped_splits_by_status() {
        let groups = table().correlate_grouped(Metric::Additions, Metric::NumReviews);
        assert_eq!(groups.len(), 2);
        for (_, corr) in groups {
            assert_eq!(corr.unwrap().n, 3);
        }
    }

    #[test]
    fn test_run_all_answers_eight_questions() {
        let results = run_all(&table());
        assert_eq!(results.len(), 8);
        assert_eq!(results[0].id, "RQ01");
        assert_eq!(results[0].correlations.len(), 4);
        assert!(results[0].correlations.iter().all(|c| c.by_status.is_empty()));
        assert_eq!(results[7].outcome, Metric::NumReviews);
        assert_eq!(results[4].correlations[0].by_status.len(), 2);
    }

    #[test]
    fn test_analyze_serializes_every_question() {
        let results = analyze(&table(), "dataset.csv");
        assert_eq!(results.total_prs, 6);
        assert_eq!(results.merged, 3);

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["research_questions"].as_array().unwrap().len(), 8);
        assert_eq!(json["research_questions"][4]["outcome"], "num_reviews");
        let additions = &json["research_questions"][4]["correlations"][1];
        assert_eq!(additions["attribute"], "additions");
        assert!((additions["overall"]["coefficient"].as_f64().unwrap() - 1.0).abs() < 1e-12);
        // constant column
        assert!(json["research_questions"][0]["correlations"][0]["overall"].is_null());
        assert_eq!(json["summaries"][8]["metric"], "num_reviews");
    }

    #[test]
    fn test_describe_groups() {
        let summary = table().describe(Metric::NumReviews);
        assert_eq!(summary.overall.unwrap().median, 3.5);
        assert_eq!(summary.merged.unwrap().median, 4.0);
        assert_eq!(summary.closed.unwrap().median, 3.0);
    }
}
