use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK, USER_AGENT};
use tracing::{debug, warn};

use super::types::{Pagination, RawResponse};
use super::{FetchError, Transport};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// `reqwest`-backed transport carrying the bearer credential on every request.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, token: String) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(USER_AGENT, "pr-census")
            .header(ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), %path, "GitHub API returned an error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let pagination = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            path: path.to_string(),
            source,
        })?;

        Ok(RawResponse { body, pagination })
    }
}

/// Parse an RFC 8288 `Link` header as GitHub sends it:
/// `<https://api.github.com/...&page=2>; rel="next", <...&page=9>; rel="last"`
pub fn parse_link_header(header: &str) -> Pagination {
    let mut pagination = Pagination::default();

    for part in header.split(',') {
        let mut pieces = part.split(';');
        let Some(target) = pieces.next() else {
            continue;
        };
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');

        let page = reqwest::Url::parse(target).ok().and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse::<u32>().ok())
        });

        for param in pieces {
            let param = param.trim();
            match param.strip_prefix("rel=").map(|r| r.trim_matches('"')) {
                Some("next") => pagination.next = page,
                Some("last") => pagination.last = page,
                _ => {}
            }
        }
    }

    pagination
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_header_next_and_last() {
        let header = "<https://api.github.com/repositories/1/pulls?state=closed&per_page=1&page=2>; rel=\"next\", \
                      <https://api.github.com/repositories/1/pulls?state=closed&per_page=1&page=3412>; rel=\"last\"";
        let pagination = parse_link_header(header);
        assert_eq!(pagination.next, Some(2));
        assert_eq!(pagination.last, Some(3412));
    }

    #[test]
    fn test_parse_link_header_last_page_has_no_next() {
        let header = "<https://api.github.com/x?page=1>; rel=\"prev\", <https://api.github.com/x?page=1>; rel=\"first\"";
        let pagination = parse_link_header(header);
        assert_eq!(pagination, Pagination::default());
    }

    #[test]
    fn test_parse_link_header_garbage() {
        assert_eq!(parse_link_header("not a link header"), Pagination::default());
        assert_eq!(parse_link_header(""), Pagination::default());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let transport = HttpTransport::new("https://api.github.com/", "t".to_string()).unwrap();
        assert_eq!(transport.base_url, DEFAULT_API_URL);
    }
}
