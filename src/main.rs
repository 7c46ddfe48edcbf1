mod analysis;
mod collect;
mod config;
mod forge;
mod pipeline;
mod plot;
mod report;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

use pipeline::Pipeline;

/// PR Census: collects pull request metrics from popular GitHub repositories
/// and correlates them with review outcomes.
#[derive(Parser, Debug)]
#[command(name = "pr-census", version, about)]
struct Cli {
    /// Config file (defaults to .pr-census.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for data, reports and charts
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search popular repositories and keep those with enough closed PRs
    Select,

    /// Collect PR metrics for repositories saved by `select`
    Collect {
        /// Repositories file written by `select`
        #[arg(long)]
        repos: PathBuf,

        #[arg(long)]
        max_repos: Option<usize>,

        #[arg(long)]
        prs_per_repo: Option<usize>,
    },

    /// Correlation report and charts for a dataset CSV
    Analyze {
        dataset: PathBuf,

        /// Markdown report path (defaults to <output-dir>/reports/)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Select, collect and analyze in one go
    Run {
        #[arg(long)]
        max_repos: Option<usize>,

        #[arg(long)]
        prs_per_repo: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pr_census=info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    match cli.command {
        Command::Select => {
            let pipeline = Pipeline::new(config);
            let client = pipeline.client()?;
            let (kept, path) = pipeline.select(&client).await?;
            info!(selected = kept.len(), path = %path.display(), "done");
        }
        Command::Collect {
            repos,
            max_repos,
            prs_per_repo,
        } => {
            apply_limits(&mut config, max_repos, prs_per_repo);
            let pipeline = Pipeline::new(config);
            let client = pipeline.client()?;
            let repositories = pipeline.load_repositories(&repos)?;
            let files = pipeline.collect(&client, &repositories).await?;
            info!(csv = %files.csv.display(), json = %files.json.display(), "done");
        }
        Command::Analyze { dataset, output } => {
            let _span = info_span!("analyze", dataset = %dataset.display()).entered();
            let pipeline = Pipeline::new(config);
            let artifacts = pipeline.analyze(&dataset, output.as_deref())?;
            info!(
                results = %artifacts.results.display(),
                report = %artifacts.report.display(),
                charts = artifacts.charts.len(),
                "done"
            );
        }
        Command::Run {
            max_repos,
            prs_per_repo,
        } => {
            apply_limits(&mut config, max_repos, prs_per_repo);
            let pipeline = Pipeline::new(config);
            let client = pipeline.client()?;

            info!("stage 1: selecting repositories");
            let (repositories, repos_file) = pipeline.select(&client).await?;

            info!("stage 2: collecting pull requests");
            let files = pipeline.collect(&client, &repositories).await?;

            info!("stage 3: analysis and charts");
            let artifacts = pipeline.analyze(&files.csv, None)?;

            info!(
                repositories = %repos_file.display(),
                dataset = %files.csv.display(),
                results = %artifacts.results.display(),
                report = %artifacts.report.display(),
                charts = artifacts.charts.len(),
                "done"
            );
        }
    }

    Ok(())
}

fn apply_limits(config: &mut config::Config, max_repos: Option<usize>, prs_per_repo: Option<usize>) {
    if let Some(max_repos) = max_repos {
        config.collection.max_repos = max_repos;
    }
    if let Some(prs_per_repo) = prs_per_repo {
        config.collection.prs_per_repo = prs_per_repo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_limits() {
        let cli = Cli::parse_from(["pr-census", "--output-dir", "out", "run", "--max-repos", "3"]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        match cli.command {
            Command::Run { max_repos, prs_per_repo } => {
                assert_eq!(max_repos, Some(3));
                assert_eq!(prs_per_repo, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_repos_for_collect() {
        assert!(Cli::try_parse_from(["pr-census", "collect"]).is_err());
    }

    #[test]
    fn test_apply_limits() {
        let mut config = config::Config::default();
        apply_limits(&mut config, None, Some(10));
        assert_eq!(config.collection.max_repos, 5);
        assert_eq!(config.collection.prs_per_repo, 10);
    }
}
