use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt::Debug;

use crate::error::HandleError;

/// Status and body of a completed GET request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: StatusCode::OK, body: body.into() }
    }

    pub fn status(status: StatusCode) -> Self {
        Self { status, body: String::new() }
    }
}

/// The HTTP seam under the remote lookups.
///
/// Implementations only move bytes; interpreting the status is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &Url) -> Result<RawResponse, HandleError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, HandleError> {
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| HandleError::Transport { request: describe_request(url), source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| HandleError::Transport { request: describe_request(url), source })?;

        Ok(RawResponse { status, body })
    }
}

/// Render a request URL for error messages and logs, with the API key masked.
pub fn describe_request(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "appid" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    if pairs.is_empty() {
        return shown.to_string();
    }

    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
