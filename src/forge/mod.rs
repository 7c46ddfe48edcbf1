pub mod http;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use http::HttpTransport;
pub use types::{
    Authored, Endpoint, Page, PageQuery, Pagination, PullSummary, RawPullRequest, RawResponse,
    RepoRef, SearchRepository,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use types::SearchEnvelope;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub API returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("GitHub token not found in config or environment")]
    MissingToken,
}

/// A single GET against the forge, returning the undecoded JSON body and the
/// pagination links of the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, FetchError>;
}

/// Session value shared by every component that talks to the forge.
///
/// Requests are issued one at a time and each one is followed by a fixed
/// delay, whether it succeeded or not.
pub struct ForgeClient {
    transport: Box<dyn Transport>,
    delay: Duration,
}

impl ForgeClient {
    pub fn new(transport: impl Transport + 'static, delay: Duration) -> Self {
        Self {
            transport: Box::new(transport),
            delay,
        }
    }

    /// Fetch and decode one page of `endpoint`.
    ///
    /// `has_more` is set when the page came back full or the response
    /// advertised a next page.
    #[instrument(skip(self, query), fields(path = %endpoint.path(), page = query.page))]
    pub async fn fetch_page<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        query: &PageQuery,
    ) -> Result<Page<R>, FetchError> {
        let response = self.request(endpoint, &query.to_pairs(endpoint)).await?;
        let items: Vec<R> = if endpoint.is_search() {
            decode::<SearchEnvelope<R>>(endpoint, response.body)?.items
        } else {
            decode(endpoint, response.body)?
        };

        let full = query.per_page > 0 && items.len() as u32 >= query.per_page;
        let has_more = !items.is_empty() && (full || response.pagination.next.is_some());
        debug!(items = items.len(), has_more, "decoded page");

        Ok(Page {
            items,
            has_more,
            pagination: response.pagination,
        })
    }

    /// Fetch a single object (e.g. a PR detail).
    pub async fn fetch_one<R: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<R, FetchError> {
        let response = self.request(endpoint, &[]).await?;
        decode(endpoint, response.body)
    }

    /// The first page of a non-search listing, decoded.
    pub async fn fetch_list<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        per_page: u32,
    ) -> Result<Vec<R>, FetchError> {
        let page = self.fetch_page(endpoint, &PageQuery::new(0, per_page)).await?;
        Ok(page.items)
    }

    /// `total_count` of an issue search.
    pub async fn search_total_count(&self, q: &str) -> Result<u64, FetchError> {
        let endpoint = Endpoint::SearchIssues;
        let query = PageQuery::search(q, 0, 1);
        let response = self.request(&endpoint, &query.to_pairs(&endpoint)).await?;
        let envelope: SearchEnvelope<serde_json::Value> = decode(&endpoint, response.body)?;
        Ok(envelope.total_count)
    }

    /// Pagination metadata only, body discarded.
    pub async fn probe(&self, endpoint: &Endpoint, query: &PageQuery) -> Result<Pagination, FetchError> {
        let response = self.request(endpoint, &query.to_pairs(endpoint)).await?;
        Ok(response.pagination)
    }

    async fn request(
        &self,
        endpoint: &Endpoint,
        query: &[(String, String)],
    ) -> Result<RawResponse, FetchError> {
        let result = self.transport.get(&endpoint.path(), query).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        result
    }
}

fn decode<R: DeserializeOwned>(endpoint: &Endpoint, body: serde_json::Value) -> Result<R, FetchError> {
    serde_json::from_value(body).map_err(|source| FetchError::Decode {
        path: endpoint.path(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockTransport;
    use serde_json::json;

    fn client(mock: MockTransport) -> ForgeClient {
        ForgeClient::new(mock, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_full_page_has_more() {
        let mock = MockTransport::new();
        mock.respond("/repos/a/b/pulls", 1, json!([{"number": 1}, {"number": 2}]));
        let page: Page<PullSummary> = client(mock)
            .fetch_page(&Endpoint::Pulls(RepoRef::new("a", "b")), &PageQuery::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_short_page_is_last() {
        let mock = MockTransport::new();
        mock.respond("/repos/a/b/pulls", 1, json!([{"number": 1}]));
        let page: Page<PullSummary> = client(mock)
            .fetch_page(&Endpoint::Pulls(RepoRef::new("a", "b")), &PageQuery::new(1, 2))
            .await
            .unwrap();
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_next_link_means_more() {
        let mock = MockTransport::new();
        mock.respond_with_links(
            "/repos/a/b/pulls",
            1,
            json!([{"number": 1}]),
            Pagination { next: Some(2), last: Some(4) },
        );
        let page: Page<PullSummary> = client(mock)
            .fetch_page(&Endpoint::Pulls(RepoRef::new("a", "b")), &PageQuery::new(1, 100))
            .await
            .unwrap();
        assert!(page.has_more);
        assert_eq!(page.pagination.last, Some(4));
    }

    #[tokio::test]
    async fn test_search_envelope_is_unwrapped() {
        let mock = MockTransport::new();
        mock.respond(
            "/search/repositories",
            1,
            json!({"total_count": 1, "items": [{"name": "rust", "owner": {"login": "rust-lang"}, "stargazers_count": 90000}]}),
        );
        let page: Page<SearchRepository> = client(mock)
            .fetch_page(&Endpoint::SearchRepositories, &PageQuery::search("stars:>1", 1, 10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].owner.login.as_deref(), Some("rust-lang"));
    }

    #[tokio::test]
    async fn test_search_envelope_without_items_is_empty_page() {
        let mock = MockTransport::new();
        mock.respond("/search/repositories", 1, json!({"total_count": 0}));
        let page: Page<SearchRepository> = client(mock)
            .fetch_page(&Endpoint::SearchRepositories, &PageQuery::search("stars:>1", 1, 10))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let mock = MockTransport::new();
        mock.respond("/repos/a/b/pulls/1", 0, json!({"number": "one", "additions": -3}));
        let result: Result<RawPullRequest, _> = client(mock)
            .fetch_one(&Endpoint::Pull(RepoRef::new("a", "b"), 1))
            .await;
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_unknown_path_propagates_status() {
        let result: Result<Vec<Authored>, _> = client(MockTransport::new())
            .fetch_list(&Endpoint::Reviews(RepoRef::new("a", "b"), 1), 100)
            .await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_search_total_count() {
        let mock = MockTransport::new();
        mock.respond("/search/issues", 0, json!({"total_count": 150, "items": []}));
        let count = client(mock).search_total_count("repo:a/b type:pr is:closed").await.unwrap();
        assert_eq!(count, 150);
    }
}
