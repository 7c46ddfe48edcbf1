use tracing::{debug, info, instrument, warn};

use super::types::RepositoryCandidate;
use crate::forge::{Endpoint, FetchError, ForgeClient, PageQuery, SearchRepository};

const SEARCH_PAGE_SIZE: u32 = 100;

/// Page through the repository search, most-starred first, until
/// `target_count` candidates are gathered or the search runs dry.
///
/// A failure on the first page is returned. Later failures end the search
/// with whatever was gathered so far.
#[instrument(skip(client))]
pub async fn search_popular(
    client: &ForgeClient,
    query: &str,
    target_count: usize,
) -> Result<Vec<RepositoryCandidate>, FetchError> {
    let per_page = SEARCH_PAGE_SIZE.min(target_count.max(1) as u32);
    let mut candidates = Vec::with_capacity(target_count);
    let mut page = 1;

    while candidates.len() < target_count {
        let request = PageQuery::search(query, page, per_page).sort("stars", "desc");
        let result = client
            .fetch_page::<SearchRepository>(&Endpoint::SearchRepositories, &request)
            .await;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) if candidates.is_empty() => return Err(e),
            Err(e) => {
                warn!(error = %e, page, "repository search stopped early");
                break;
            }
        };

        candidates.extend(batch.items.into_iter().filter_map(to_candidate));
        info!(collected = candidates.len(), target_count, "searched popular repositories");

        if !batch.has_more {
            break;
        }
        page += 1;
    }

    candidates.truncate(target_count);
    Ok(candidates)
}

fn to_candidate(hit: SearchRepository) -> Option<RepositoryCandidate> {
    let owner = hit.owner.login?;
    Some(RepositoryCandidate {
        owner,
        name: hit.name,
        star_count: hit.stargazers_count,
        pr_count: None,
        language: hit.language,
        url: hit.html_url,
    })
}

/// Estimate the number of closed PRs in a repository.
///
/// Probes the closed listing with one item per page and reads the last page
/// number from the `Link` header. Small repositories get no pagination
/// metadata, so in that case the issue search `total_count` is used instead.
#[instrument(skip(client, candidate), fields(repo = %candidate))]
pub async fn count_closed_prs(
    client: &ForgeClient,
    candidate: &RepositoryCandidate,
) -> Result<u64, FetchError> {
    let per_page = 1;
    let probe = PageQuery::new(0, per_page).state("closed");
    let pagination = client.probe(&Endpoint::Pulls(candidate.repo_ref()), &probe).await?;

    let from_links = pagination.last.map(|last| u64::from(last) * u64::from(per_page));
    match from_links {
        Some(count) if count > 0 => {
            debug!(count, "counted closed PRs from pagination");
            Ok(count)
        }
        _ => {
            let q = format!("repo:{}/{} type:pr is:closed", candidate.owner, candidate.name);
            let count = client.search_total_count(&q).await?;
            debug!(count, "counted closed PRs from search");
            Ok(count)
        }
    }
}

/// Keep the candidates with at least `threshold` closed PRs, in input order,
/// with `pr_count` filled in. Candidates whose count cannot be fetched are
/// dropped.
pub async fn filter_by_min_prs(
    client: &ForgeClient,
    candidates: &[RepositoryCandidate],
    threshold: u64,
) -> Vec<RepositoryCandidate> {
    let mut kept = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        let count = match count_closed_prs(client, candidate).await {
            Ok(count) => count,
            Err(e) => {
                warn!(repo = %candidate, error = %e, "could not count closed PRs");
                continue;
            }
        };

        if count >= threshold {
            info!(progress = %format!("{}/{}", i + 1, candidates.len()), repo = %candidate, count, "kept");
            kept.push(RepositoryCandidate {
                pr_count: Some(count),
                ..candidate.clone()
            });
        } else {
            info!(progress = %format!("{}/{}", i + 1, candidates.len()), repo = %candidate, count, threshold, "below threshold");
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockTransport;
    use crate::forge::Pagination;
    use serde_json::json;
    use std::time::Duration;

    fn hit(owner: &str, name: &str, stars: u64) -> serde_json::Value {
        json!({"name": name, "owner": {"login": owner}, "stargazers_count": stars})
    }

    fn candidate(owner: &str, name: &str) -> RepositoryCandidate {
        RepositoryCandidate {
            owner: owner.to_string(),
            name: name.to_string(),
            star_count: 1000,
            pr_count: None,
            language: None,
            url: None,
        }
    }

    fn with_last_page(mock: &MockTransport, owner: &str, name: &str, last: u32) {
        mock.respond_with_links(
            &format!("/repos/{owner}/{name}/pulls"),
            0,
            json!([{"number": 1}]),
            Pagination { next: Some(2), last: Some(last) },
        );
    }

    #[tokio::test]
    async fn test_search_popular_stops_at_target() {
        let mock = MockTransport::new();
        mock.respond(
            "/search/repositories",
            1,
            json!({"total_count": 900, "items": [hit("a", "one", 30), hit("b", "two", 20), hit("c", "three", 10)]}),
        );
        let client = ForgeClient::new(mock.clone(), Duration::ZERO);

        let found = search_popular(&client, "stars:>1", 3).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].owner, "a");
        assert!(found.iter().all(|c| c.pr_count.is_none()));
        // full page but target reached: no second request
        assert_eq!(mock.requests_for("/search/repositories"), vec![1]);
    }

    #[tokio::test]
    async fn test_search_popular_stops_when_exhausted() {
        let mock = MockTransport::new();
        mock.respond(
            "/search/repositories",
            1,
            json!({"total_count": 2, "items": [hit("a", "one", 30), hit("b", "two", 20)]}),
        );
        let client = ForgeClient::new(mock.clone(), Duration::ZERO);

        let found = search_popular(&client, "stars:>1", 5).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(mock.requests_for("/search/repositories"), vec![1]);
    }

    #[tokio::test]
    async fn test_search_popular_first_page_failure_is_error() {
        let mock = MockTransport::new();
        mock.fail("/search/repositories", 1, 403);
        let client = ForgeClient::new(mock, Duration::ZERO);
        assert!(search_popular(&client, "stars:>1", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_count_from_last_page() {
        let mock = MockTransport::new();
        with_last_page(&mock, "a", "big", 3412);
        let client = ForgeClient::new(mock.clone(), Duration::ZERO);

        let count = count_closed_prs(&client, &candidate("a", "big")).await.unwrap();
        assert_eq!(count, 3412);
        assert!(mock.requests_for("/search/issues").is_empty());
    }

    #[tokio::test]
    async fn test_count_falls_back_to_search_without_links() {
        let mock = MockTransport::new();
        mock.respond("/repos/a/small/pulls", 0, json!([{"number": 1}]));
        mock.respond("/search/issues", 0, json!({"total_count": 150, "items": []}));
        let client = ForgeClient::new(mock, Duration::ZERO);

        let count = count_closed_prs(&client, &candidate("a", "small")).await.unwrap();
        assert_eq!(count, 150);
    }

    #[tokio::test]
    async fn test_filter_keeps_order_and_is_idempotent() {
        let mock = MockTransport::new();
        with_last_page(&mock, "a", "first", 500);
        with_last_page(&mock, "b", "second", 20);
        with_last_page(&mock, "c", "third", 120);
        let client = ForgeClient::new(mock, Duration::ZERO);

        let input = vec![candidate("a", "first"), candidate("b", "second"), candidate("c", "third")];
        let kept = filter_by_min_prs(&client, &input, 100).await;
        let names: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "third"]);
        assert_eq!(kept[0].pr_count, Some(500));

        let again = filter_by_min_prs(&client, &kept, 100).await;
        assert_eq!(again, kept);
    }

    #[tokio::test]
    async fn test_filter_drops_uncountable() {
        let mock = MockTransport::new();
        mock.fail("/repos/a/gone/pulls", 0, 404);
        let client = ForgeClient::new(mock, Duration::ZERO);

        let kept = filter_by_min_prs(&client, &[candidate("a", "gone")], 1).await;
        assert!(kept.is_empty());
    }
}
