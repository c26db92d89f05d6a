//! Upstream fetching
//!
//! One GET per call: no retries, no timeout beyond the transport defaults.
//! The `Fetch` trait is the seam the router is built against, so the HTTP
//! transport can be swapped for an in-memory one in tests.

use hyper::body::Bytes;
use std::future::Future;
use thiserror::Error;

use crate::logger;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status
    #[error("upstream responded with status {0}")]
    Status(u16),

    /// Connection, TLS or body read failure
    #[error("upstream request failed: {0}")]
    Transport(String),
}

/// Issue a GET against an absolute URL and return the body on success
pub trait Fetch {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// `reqwest` backed fetcher
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher that identifies itself with `user_agent`
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            logger::log_upstream_request(&url);
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            response
                .bytes()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))
        }
    }
}
