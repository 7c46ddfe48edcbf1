use crate::analysis::{Correlation, Metric, MetricSummary, QuestionResult};
use crate::collect::types::PrStatus;

/// Magnitude class of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Negligible,
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn of(coefficient: f64) -> Self {
        match coefficient.abs() {
            r if r < 0.1 => Strength::Negligible,
            r if r < 0.3 => Strength::Weak,
            r if r < 0.5 => Strength::Moderate,
            _ => Strength::Strong,
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strength::Negligible => write!(f, "NEGLIGIBLE"),
            Strength::Weak => write!(f, "WEAK"),
            Strength::Moderate => write!(f, "MODERATE"),
            Strength::Strong => write!(f, "STRONG"),
        }
    }
}

/// One line of a research question table.
#[derive(Debug, Clone)]
pub struct CorrelationRow {
    /// Attribute correlated against the question's outcome
    pub attribute: Metric,
    /// `None` when the correlation is undefined for this dataset
    pub correlation: Option<Correlation>,
    pub by_status: Vec<(PrStatus, Option<Correlation>)>,
}

impl CorrelationRow {
    pub fn strength(&self) -> Option<Strength> {
        self.correlation.map(|c| Strength::of(c.coefficient))
    }

    pub fn within(&self, status: PrStatus) -> Option<Correlation> {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .and_then(|(_, c)| *c)
    }
}

/// A research question with its rendered rows.
#[derive(Debug, Clone)]
pub struct QuestionSection {
    pub id: String,
    pub title: String,
    pub outcome: Metric,
    pub rows: Vec<CorrelationRow>,
}

impl From<QuestionResult> for QuestionSection {
    fn from(result: QuestionResult) -> Self {
        Self {
            id: result.id.to_string(),
            title: result.title.to_string(),
            outcome: result.outcome,
            rows: result
                .correlations
                .into_iter()
                .map(|c| CorrelationRow {
                    attribute: c.attribute,
                    correlation: c.overall,
                    by_status: c.by_status,
                })
                .collect(),
        }
    }
}

/// Complete analysis report.
#[derive(Debug)]
pub struct Report {
    /// Dataset the report was computed from
    pub dataset: String,
    /// Total PRs
    pub total: usize,
    /// PRs with MERGED status
    pub merged: usize,
    /// PRs with CLOSED status
    pub closed: usize,
    /// Descriptive statistics per attribute
    pub summaries: Vec<MetricSummary>,
    /// One section per research question
    pub sections: Vec<QuestionSection>,
}
