// Graph API client — a thin reqwest wrapper with a generic GET helper.
//
// All reads go through `get_json`, which signs the request with the access
// token and retries transient failures with bounded exponential backoff.
// Callers that must never crash the polling loop (the CommentSource impl
// in comments.rs) absorb the residual error into a neutral result.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::retry;

/// Default Graph API host.
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com";

/// Per-request timeout. Applies to each HTTP call, not the overall loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry budget for a single logical read.
const MAX_ATTEMPTS: u32 = 3;

/// Authenticated HTTP client for Graph API read endpoints.
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GraphClient {
    /// Create a new client for the given token and API version.
    pub fn new(access_token: &str, api_version: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_GRAPH_API_URL, access_token, api_version)
    }

    /// Create a client pointing at a non-default host.
    ///
    /// Useful for testing or proxy setups — the version segment is still
    /// appended the same way.
    pub fn with_base_url(base_url: &str, access_token: &str, api_version: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("magpie/0.1 (receipt-collection)")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), api_version),
            access_token: access_token.to_string(),
        })
    }

    /// Make a GET request to a Graph API path and deserialize the response.
    ///
    /// `path` is the object path (e.g. "123_456/comments"). `params` are
    /// query string key-value pairs; the access token is appended here so
    /// callers never handle it.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);

        debug!(path = path, "Graph API GET request");

        retry::with_backoff("Graph API request", MAX_ATTEMPTS, || async {
            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[("access_token", self.access_token.as_str())])
                .send()
                .await
                .with_context(|| format!("Graph API request failed: {path}"))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Graph API {path} returned {status}: {body}");
            }

            response
                .json::<T>()
                .await
                .with_context(|| format!("Failed to deserialize {path} response"))
        })
        .await
    }
}
