use tracing::{error, info, instrument, warn};

use super::extractor::Extractor;
use super::types::{Dataset, PrMetricRecord, RepositoryCandidate};
use crate::forge::ForgeClient;
use crate::store::{DatasetFiles, DatasetStore, StoreError};

/// How a collection run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// At least one record was collected and written.
    Collected { dataset: Dataset, files: DatasetFiles },
    /// Every repository was processed but no PR passed validation.
    Empty { files: DatasetFiles },
}

/// Drives the extractor over the selected repositories, one at a time.
pub struct Orchestrator<'a> {
    extractor: Extractor<'a>,
    store: &'a DatasetStore,
    checkpoint_interval: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        client: &'a ForgeClient,
        store: &'a DatasetStore,
        page_size: u32,
        checkpoint_interval: usize,
    ) -> Self {
        Self {
            extractor: Extractor::new(client, page_size),
            store,
            checkpoint_interval,
        }
    }

    /// Collect from every candidate in order, writing a checkpoint after each
    /// `checkpoint_interval` repositories and the final dataset at the end.
    ///
    /// A repository that fails contributes no records; the run continues.
    #[instrument(skip_all, fields(repos = candidates.len(), max_prs_per_repo = max_prs_per_repo))]
    pub async fn run(
        &self,
        candidates: &[RepositoryCandidate],
        max_prs_per_repo: usize,
        stamp: &str,
    ) -> Result<RunOutcome, StoreError> {
        let mut records: Vec<PrMetricRecord> = Vec::new();
        let total = candidates.len();

        for (i, candidate) in candidates.iter().enumerate() {
            let processed = i + 1;
            info!(progress = %format!("{processed}/{total}"), repo = %candidate, "collecting pull requests");

            match self
                .extractor
                .collect(&candidate.owner, &candidate.name, max_prs_per_repo)
                .await
            {
                Ok(harvest) => {
                    info!(
                        repo = %candidate,
                        records = harvest.records.len(),
                        skipped = harvest.skipped,
                        failed = harvest.failed,
                        "repository done"
                    );
                    records.extend(harvest.records);
                }
                Err(e) => {
                    error!(repo = %candidate, error = %e, "repository failed, contributing no records");
                }
            }
            info!(total_records = records.len(), "accumulated");

            if self.checkpoint_interval > 0 && processed % self.checkpoint_interval == 0 {
                match self.store.write_checkpoint(processed, &records) {
                    Ok(path) => info!(path = %path.display(), "checkpoint written"),
                    Err(e) => warn!(error = %e, processed, "checkpoint failed"),
                }
            }
        }

        let dataset = Dataset::new(records);
        let files = self.store.write_dataset(&dataset, stamp)?;
        info!(records = dataset.total_prs, csv = %files.csv.display(), "dataset written");

        if dataset.is_empty() {
            Ok(RunOutcome::Empty { files })
        } else {
            Ok(RunOutcome::Collected { dataset, files })
        }
    }
}
