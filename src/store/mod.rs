use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::collect::types::{Dataset, PrMetricRecord, RepositoryCandidate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read or write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read or write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The repositories file written by the selection stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryList {
    pub collected_at: DateTime<Utc>,
    pub total_repositories: usize,
    pub repositories: Vec<RepositoryCandidate>,
}

/// Paths of a final dataset written in both formats.
#[derive(Debug, Clone)]
pub struct DatasetFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Owns the `data/` directory of a run.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn checkpoint_path(&self, processed_repos: usize) -> PathBuf {
        self.dir.join(format!("checkpoint_{processed_repos}_repos.csv"))
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn write_checkpoint(
        &self,
        processed_repos: usize,
        records: &[PrMetricRecord],
    ) -> Result<PathBuf, StoreError> {
        let path = self.checkpoint_path(processed_repos);
        write_csv(&path, records)?;
        Ok(path)
    }

    #[instrument(skip(self, dataset), fields(records = dataset.total_prs))]
    pub fn write_dataset(&self, dataset: &Dataset, stamp: &str) -> Result<DatasetFiles, StoreError> {
        let files = DatasetFiles {
            csv: self.dir.join(format!("dataset_{stamp}.csv")),
            json: self.dir.join(format!("dataset_{stamp}.json")),
        };
        write_csv(&files.csv, &dataset.prs)?;
        write_json(&files.json, dataset)?;
        Ok(files)
    }

    pub fn write_repositories(
        &self,
        repositories: &[RepositoryCandidate],
        stamp: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(format!("repositories_{stamp}.json"));
        let list = RepositoryList {
            collected_at: Utc::now(),
            total_repositories: repositories.len(),
            repositories: repositories.to_vec(),
        };
        write_json(&path, &list)?;
        Ok(path)
    }
}

/// Write records as CSV with a header row, columns in record field order.
pub fn write_csv(path: &Path, records: &[PrMetricRecord]) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    debug!(path = %path.display(), rows = records.len(), "wrote CSV");
    Ok(())
}

/// Load a dataset CSV previously written by `write_csv`.
pub fn read_csv(path: &Path) -> Result<Vec<PrMetricRecord>, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<PrMetricRecord>, _>>()?;
    Ok(records)
}

pub fn read_repositories(path: &Path) -> Result<RepositoryList, StoreError> {
    let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(path, contents).map_err(|e| StoreError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON");
    Ok(())
}

/// Header written for an empty dataset so the file still has its schema.
const CSV_HEADER: [&str; 16] = [
    "repository",
    "pr_number",
    "title",
    "status",
    "created_at",
    "closed_at",
    "time_to_close_hours",
    "files_changed",
    "additions",
    "deletions",
    "total_lines_changed",
    "body_length",
    "num_reviews",
    "num_comments",
    "num_participants",
    "url",
];
