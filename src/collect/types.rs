use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::forge::{FetchError, RepoRef};

/// A repository picked up by the popularity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryCandidate {
    pub owner: String,
    pub name: String,
    pub star_count: u64,
    /// Closed PR estimate; unset until the candidate has been counted
    pub pr_count: Option<u64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl RepositoryCandidate {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.name)
    }
}

impl fmt::Display for RepositoryCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Final feedback a PR received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Merged,
    Closed,
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrStatus::Merged => write!(f, "MERGED"),
            PrStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// One row of the dataset. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrMetricRecord {
    pub repository: String,
    pub pr_number: u64,
    pub title: String,
    pub status: PrStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub time_to_close_hours: f64,
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
    pub total_lines_changed: u64,
    pub body_length: u64,
    pub num_reviews: u64,
    pub num_comments: u64,
    pub num_participants: u64,
    pub url: String,
}

/// Why a PR was left out of the dataset. Expected, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingNumber,
    MissingFields,
    StillOpen,
    ClosedTooQuickly,
    NoReviews,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::MissingNumber => "listing entry has no number",
            SkipReason::MissingFields => "detail lacks size counters, creation time or author",
            SkipReason::StillOpen => "no merge or close timestamp",
            SkipReason::ClosedTooQuickly => "closed within one hour of creation",
            SkipReason::NoReviews => "no reviews",
        };
        f.write_str(text)
    }
}

/// Result of processing a single PR.
#[derive(Debug)]
pub enum PrOutcome {
    Record(Box<PrMetricRecord>),
    Skipped(SkipReason),
    Failed(FetchError),
}

/// Everything the extractor produced for one repository.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<PrMetricRecord>,
    pub skipped: usize,
    pub failed: usize,
    pub pages: u32,
}

impl Harvest {
    pub fn absorb(&mut self, outcome: PrOutcome) {
        match outcome {
            PrOutcome::Record(record) => self.records.push(*record),
            PrOutcome::Skipped(_) => self.skipped += 1,
            PrOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// The accumulated output of a collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub collected_at: DateTime<Utc>,
    pub total_prs: usize,
    pub prs: Vec<PrMetricRecord>,
}

impl Dataset {
    pub fn new(prs: Vec<PrMetricRecord>) -> Self {
        Self {
            collected_at: Utc::now(),
            total_prs: prs.len(),
            prs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prs.is_empty()
    }
}
