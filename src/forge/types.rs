use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a repository on the forge as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The fixed set of remote endpoints the pipeline reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    SearchRepositories,
    SearchIssues,
    Pulls(RepoRef),
    Pull(RepoRef, u64),
    Reviews(RepoRef, u64),
    ReviewComments(RepoRef, u64),
    IssueComments(RepoRef, u64),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::SearchRepositories => "/search/repositories".to_string(),
            Endpoint::SearchIssues => "/search/issues".to_string(),
            Endpoint::Pulls(repo) => format!("/repos/{}/{}/pulls", repo.owner, repo.name),
            Endpoint::Pull(repo, number) => {
                format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, number)
            }
            Endpoint::Reviews(repo, number) => {
                format!("/repos/{}/{}/pulls/{}/reviews", repo.owner, repo.name, number)
            }
            Endpoint::ReviewComments(repo, number) => {
                format!("/repos/{}/{}/pulls/{}/comments", repo.owner, repo.name, number)
            }
            Endpoint::IssueComments(repo, number) => {
                format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.name, number)
            }
        }
    }

    /// Search endpoints wrap their results in a `{total_count, items}` envelope.
    pub fn is_search(&self) -> bool {
        matches!(self, Endpoint::SearchRepositories | Endpoint::SearchIssues)
    }
}

/// Query parameters for a single page request.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub q: Option<String>,
    pub state: Option<String>,
    pub sort: Option<String>,
    /// `order` on search endpoints, `direction` on listings.
    pub direction: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            ..Self::default()
        }
    }

    pub fn search(q: impl Into<String>, page: u32, per_page: u32) -> Self {
        Self {
            q: Some(q.into()),
            ..Self::new(page, per_page)
        }
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub fn sort(mut self, sort: &str, direction: &str) -> Self {
        self.sort = Some(sort.to_string());
        self.direction = Some(direction.to_string());
        self
    }

    /// Render as query-string pairs for `endpoint`.
    pub fn to_pairs(&self, endpoint: &Endpoint) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = &self.q {
            pairs.push(("q".to_string(), q.clone()));
        }
        if let Some(state) = &self.state {
            pairs.push(("state".to_string(), state.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(direction) = &self.direction {
            let key = if endpoint.is_search() { "order" } else { "direction" };
            pairs.push((key.to_string(), direction.clone()));
        }
        if self.per_page > 0 {
            pairs.push(("per_page".to_string(), self.per_page.to_string()));
        }
        if self.page > 0 {
            pairs.push(("page".to_string(), self.page.to_string()));
        }
        pairs
    }
}

/// Page numbers advertised by the `Link` response header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub next: Option<u32>,
    pub last: Option<u32>,
}

/// An undecoded response: JSON body plus pagination metadata.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: serde_json::Value,
    pub pagination: Pagination,
}

/// One decoded page of records.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub has_more: bool,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub(crate) struct SearchEnvelope<R> {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<R>,
}

/// A forge account as embedded in PRs, reviews and comments.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub login: Option<String>,
}

/// A repository search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRepository {
    pub name: String,
    pub owner: Account,
    #[serde(default)]
    pub stargazers_count: u64,
    pub language: Option<String>,
    pub html_url: Option<String>,
}

/// A pull request as it appears in a listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub user: Option<Account>,
}

/// The pull request detail payload.
///
/// Every field read downstream is optional so that a missing value becomes a
/// validation skip rather than a decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPullRequest {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub user: Option<Account>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub changed_files: Option<u64>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

/// Anything with an author: reviews, review comments, issue comments.
#[derive(Debug, Clone, Deserialize)]
pub struct Authored {
    pub user: Option<Account>,
}

impl Authored {
    pub fn login(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.login.as_deref())
    }
}
