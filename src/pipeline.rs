//! The stages of a run, wired to the configured output layout.

use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::analysis::{self, DatasetTable};
use crate::collect::{selector, Orchestrator, RepositoryCandidate, RunOutcome};
use crate::config::Config;
use crate::forge::{FetchError, ForgeClient, HttpTransport};
use crate::plot::{self, PlotError};
use crate::report::{self, ReportError};
use crate::store::{self, DatasetFiles, DatasetStore, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error("No repository met the selection criteria")]
    NoRepositories,

    #[error("No valid pull requests were collected (empty dataset at {0}); check the token's permissions, the rate limit, or pick other repositories")]
    EmptyDataset(PathBuf),
}

/// Files produced by the analysis stage.
#[derive(Debug)]
pub struct AnalysisArtifacts {
    pub results: PathBuf,
    pub report: PathBuf,
    pub charts: Vec<PathBuf>,
}

pub struct Pipeline {
    config: Config,
    stamp: String,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stamp: Utc::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.config.output.dir.join("data")
    }

    fn reports_dir(&self) -> PathBuf {
        self.config.output.dir.join("reports")
    }

    fn plots_dir(&self) -> PathBuf {
        self.config.output.dir.join("plots").join(&self.stamp)
    }

    /// The session every stage that talks to GitHub shares.
    pub fn client(&self) -> Result<ForgeClient, PipelineError> {
        let token = self.config.github_token().ok_or(FetchError::MissingToken)?;
        let transport = HttpTransport::new(&self.config.github.api_url, token)?;
        Ok(ForgeClient::new(transport, self.config.collection.request_delay()))
    }

    /// Search popular repositories and keep those with enough closed PRs.
    #[instrument(skip_all)]
    pub async fn select(&self, client: &ForgeClient) -> Result<(Vec<RepositoryCandidate>, PathBuf), PipelineError> {
        let selection = &self.config.selection;
        let popular = selector::search_popular(client, &selection.query, selection.search_limit).await?;
        info!(count = popular.len(), "popular repositories collected");

        let kept = selector::filter_by_min_prs(client, &popular, selection.min_prs).await;
        info!(analysed = popular.len(), selected = kept.len(), min_prs = selection.min_prs, "selection finished");

        let store = DatasetStore::open(self.data_dir())?;
        let path = store.write_repositories(&kept, &self.stamp)?;
        info!(path = %path.display(), "repositories saved");
        Ok((kept, path))
    }

    /// Load a repositories file written by `select`.
    pub fn load_repositories(&self, path: &Path) -> Result<Vec<RepositoryCandidate>, PipelineError> {
        Ok(store::read_repositories(path)?.repositories)
    }

    /// Collect PR metrics from the first `max_repos` repositories.
    #[instrument(skip_all, fields(repos = repositories.len()))]
    pub async fn collect(
        &self,
        client: &ForgeClient,
        repositories: &[RepositoryCandidate],
    ) -> Result<DatasetFiles, PipelineError> {
        let collection = &self.config.collection;
        if repositories.is_empty() {
            return Err(PipelineError::NoRepositories);
        }
        let selected = &repositories[..repositories.len().min(collection.max_repos)];

        let store = DatasetStore::open(self.data_dir())?;
        let orchestrator = Orchestrator::new(client, &store, collection.page_size, collection.checkpoint_interval);

        match orchestrator.run(selected, collection.prs_per_repo, &self.stamp).await? {
            RunOutcome::Collected { dataset, files } => {
                info!(prs = dataset.total_prs, csv = %files.csv.display(), json = %files.json.display(), "collection finished");
                Ok(files)
            }
            RunOutcome::Empty { files } => {
                warn!(csv = %files.csv.display(), "collection finished without any valid PR");
                Err(PipelineError::EmptyDataset(files.csv))
            }
        }
    }

    /// Correlation report and charts for a dataset CSV.
    #[instrument(skip(self))]
    pub fn analyze(&self, dataset: &Path, report_path: Option<&Path>) -> Result<AnalysisArtifacts, PipelineError> {
        let table = DatasetTable::load(dataset)?;
        if table.is_empty() {
            warn!("dataset has no rows; every correlation will be undefined");
        }
        let results = analysis::analyze(&table, &dataset.display().to_string());

        let reports_dir = self.reports_dir();
        std::fs::create_dir_all(&reports_dir).map_err(ReportError::from)?;
        let results_path = reports_dir.join(format!("analysis_results_{}.json", self.stamp));
        store::write_json(&results_path, &results)?;
        info!(path = %results_path.display(), "analysis results written");

        let built = report::build(&results);
        report::output(&built, None)?;

        let report_path = report_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| reports_dir.join(format!("analysis_{}.md", self.stamp)));
        report::output(&built, Some(&report_path))?;
        info!(path = %report_path.display(), "report written");

        let charts = plot::generate_all(dataset, &self.plots_dir())?;
        Ok(AnalysisArtifacts {
            results: results_path,
            report: report_path,
            charts,
        })
    }
}
