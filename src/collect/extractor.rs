use chrono::Duration;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::types::{Harvest, PrMetricRecord, PrOutcome, PrStatus, SkipReason};
use crate::forge::{
    Authored, Endpoint, FetchError, ForgeClient, PageQuery, PullSummary, RawPullRequest, RepoRef,
};

/// Reviews and comments are read from a single page of this size.
const THREAD_PAGE_SIZE: u32 = 100;

/// Walks the closed pull requests of one repository and turns the ones that
/// pass validation into metric records.
pub struct Extractor<'a> {
    client: &'a ForgeClient,
    page_size: u32,
}

impl<'a> Extractor<'a> {
    pub fn new(client: &'a ForgeClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    /// Collect up to `max_records` records from `owner/name`, newest PRs first.
    ///
    /// Failing to fetch the first listing page is an error. A failure on a
    /// later listing page ends paging and keeps what was already collected.
    #[instrument(skip(self), fields(repo = %format!("{owner}/{name}")))]
    pub async fn collect(&self, owner: &str, name: &str, max_records: usize) -> Result<Harvest, FetchError> {
        let repo = RepoRef::new(owner, name);
        let listing = Endpoint::Pulls(repo.clone());
        let mut harvest = Harvest::default();
        let mut page = 1;

        while harvest.records.len() < max_records {
            let query = PageQuery::new(page, self.page_size)
                .state("closed")
                .sort("created", "desc");

            let batch = match self.client.fetch_page::<PullSummary>(&listing, &query).await {
                Ok(batch) => batch,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(error = %e, page, "listing failed, keeping collected records");
                    break;
                }
            };
            harvest.pages += 1;

            for summary in &batch.items {
                let outcome = self.process(&repo, summary).await;
                match &outcome {
                    PrOutcome::Skipped(reason) => debug!(number = ?summary.number, %reason, "skipped"),
                    PrOutcome::Failed(e) => warn!(number = ?summary.number, error = %e, "PR failed"),
                    PrOutcome::Record(_) => {}
                }
                harvest.absorb(outcome);

                if harvest.records.len() >= max_records {
                    break;
                }
            }

            info!(
                page,
                records = harvest.records.len(),
                skipped = harvest.skipped,
                failed = harvest.failed,
                "processed listing page"
            );

            if !batch.has_more {
                break;
            }
            page += 1;
        }

        Ok(harvest)
    }

    /// Fetch, validate and join one PR. Errors stay confined to this PR.
    async fn process(&self, repo: &RepoRef, summary: &PullSummary) -> PrOutcome {
        let Some(number) = summary.number else {
            return PrOutcome::Skipped(SkipReason::MissingNumber);
        };
        match self.extract(repo, number).await {
            Ok(Ok(record)) => PrOutcome::Record(Box::new(record)),
            Ok(Err(reason)) => PrOutcome::Skipped(reason),
            Err(e) => PrOutcome::Failed(e),
        }
    }

    async fn extract(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Result<PrMetricRecord, SkipReason>, FetchError> {
        let detail: RawPullRequest = self
            .client
            .fetch_one(&Endpoint::Pull(repo.clone(), number))
            .await?;

        let gated = match validate(&detail) {
            Ok(gated) => gated,
            Err(reason) => return Ok(Err(reason)),
        };

        let reviews: Vec<Authored> = self
            .client
            .fetch_list(&Endpoint::Reviews(repo.clone(), number), THREAD_PAGE_SIZE)
            .await?;
        if reviews.is_empty() {
            return Ok(Err(SkipReason::NoReviews));
        }

        let review_comments: Vec<Authored> = self
            .client
            .fetch_list(&Endpoint::ReviewComments(repo.clone(), number), THREAD_PAGE_SIZE)
            .await?;
        let issue_comments: Vec<Authored> = self
            .client
            .fetch_list(&Endpoint::IssueComments(repo.clone(), number), THREAD_PAGE_SIZE)
            .await?;

        let participants = count_participants(
            &gated.author,
            reviews.iter().chain(&review_comments).chain(&issue_comments),
        );

        Ok(Ok(build_record(
            repo,
            &detail,
            &gated,
            reviews.len(),
            review_comments.len() + issue_comments.len(),
            participants,
        )))
    }
}

/// Fields of a PR detail that survived the local validation gates.
#[derive(Debug)]
struct Gated {
    number: u64,
    author: String,
    status: PrStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    closed_at: chrono::DateTime<chrono::Utc>,
    files_changed: u64,
    additions: u64,
    deletions: u64,
}

/// The gates that need no further request: required fields present, a
/// resolved close event, and a close more than an hour after creation.
fn validate(detail: &RawPullRequest) -> Result<Gated, SkipReason> {
    let (Some(number), Some(files_changed), Some(additions), Some(deletions), Some(created_at)) = (
        detail.number,
        detail.changed_files,
        detail.additions,
        detail.deletions,
        detail.created_at,
    ) else {
        return Err(SkipReason::MissingFields);
    };
    let author = detail
        .user
        .as_ref()
        .and_then(|u| u.login.clone())
        .ok_or(SkipReason::MissingFields)?;

    let (status, closed_at) = match (detail.merged_at, detail.closed_at) {
        (Some(merged), _) => (PrStatus::Merged, merged),
        (None, Some(closed)) => (PrStatus::Closed, closed),
        (None, None) => return Err(SkipReason::StillOpen),
    };

    if closed_at - created_at <= Duration::hours(1) {
        return Err(SkipReason::ClosedTooQuickly);
    }

    Ok(Gated {
        number,
        author,
        status,
        created_at,
        closed_at,
        files_changed,
        additions,
        deletions,
    })
}

/// Unique logins across the PR author and everyone who reviewed or commented.
fn count_participants<'a>(author: &'a str, others: impl Iterator<Item = &'a Authored>) -> usize {
    let mut logins: HashSet<&str> = HashSet::new();
    logins.insert(author);
    logins.extend(others.filter_map(Authored::login));
    logins.len()
}

fn build_record(
    repo: &RepoRef,
    detail: &RawPullRequest,
    gated: &Gated,
    num_reviews: usize,
    num_comments: usize,
    num_participants: usize,
) -> PrMetricRecord {
    let elapsed = gated.closed_at - gated.created_at;
    PrMetricRecord {
        repository: repo.to_string(),
        pr_number: gated.number,
        title: detail.title.clone().unwrap_or_default(),
        status: gated.status,
        created_at: gated.created_at,
        closed_at: gated.closed_at,
        time_to_close_hours: elapsed.num_seconds() as f64 / 3600.0,
        files_changed: gated.files_changed,
        additions: gated.additions,
        deletions: gated.deletions,
        total_lines_changed: gated.additions + gated.deletions,
        body_length: detail.body.as_deref().map_or(0, |b| b.chars().count() as u64),
        num_reviews: num_reviews as u64,
        num_comments: num_comments as u64,
        num_participants: num_participants as u64,
        url: detail.html_url.clone().unwrap_or_default(),
    }
}
