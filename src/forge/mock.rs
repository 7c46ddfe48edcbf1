use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::types::{Pagination, RawResponse};
use super::{FetchError, Transport};

/// In-memory transport with canned responses keyed by `(path, page)`.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// `ForgeClient` and inspect the requests that were made.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<(String, u32), Result<RawResponse, u16>>>>,
    /// Every request made: (path, page)
    pub requests: Arc<Mutex<Vec<(String, u32)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, page: u32, body: serde_json::Value) {
        self.respond_with_links(path, page, body, Pagination::default());
    }

    pub fn respond_with_links(
        &self,
        path: &str,
        page: u32,
        body: serde_json::Value,
        pagination: Pagination,
    ) {
        self.responses
            .lock()
            .unwrap()
            .insert((path.to_string(), page), Ok(RawResponse { body, pagination }));
    }

    /// Make `(path, page)` fail with the given HTTP status.
    pub fn fail(&self, path: &str, page: u32, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert((path.to_string(), page), Err(status));
    }

    pub fn requests_for(&self, path: &str) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, page)| *page)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<RawResponse, FetchError> {
        let page = query
            .iter()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        self.requests.lock().unwrap().push((path.to_string(), page));

        match self.responses.lock().unwrap().get(&(path.to_string(), page)) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                status: *status,
                path: path.to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                path: path.to_string(),
            }),
        }
    }
}
