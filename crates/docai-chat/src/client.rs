//! Query API collaborator.
//!
//! `QueryApi` is the seam between the orchestrator and the network. The
//! production implementation POSTs JSON with reqwest; tests script replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docai_core::config::ApiConfig;
use reqwest::{Client, Url};

use crate::error::ChatError;
use crate::types::{QueryRequest, QueryResponse};

/// What came back from a call that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReply {
    /// 2xx with a decodable body.
    Success(QueryResponse),
    /// Any other status, or a 2xx without a usable body.
    Failure { status: u16 },
}

/// Sends one query and reports what the server said.
///
/// `Err` is reserved for calls that never produced a response
/// (`ChatError::Transport`).
#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn send_query(&self, request: &QueryRequest) -> Result<ApiReply, ChatError>;
}

#[async_trait]
impl<T: QueryApi + ?Sized> QueryApi for Arc<T> {
    async fn send_query(&self, request: &QueryRequest) -> Result<ApiReply, ChatError> {
        (**self).send_query(request).await
    }
}

/// reqwest-backed client for the query endpoint.
#[derive(Debug, Clone)]
pub struct HttpQueryApi {
    client: Client,
    url: Url,
}

impl HttpQueryApi {
    /// Build a client posting to `endpoint` joined with `query_path`.
    pub fn new(endpoint: &str, query_path: &str, timeout: Duration) -> Result<Self, ChatError> {
        let url = join_endpoint(endpoint, query_path)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ChatError> {
        Self::new(
            &config.endpoint,
            &config.query_path,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Full URL queries are posted to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl QueryApi for HttpQueryApi {
    async fn send_query(&self, request: &QueryRequest) -> Result<ApiReply, ChatError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Query API returned non-success status");
            return Ok(ApiReply::Failure {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(format!("failed to read response: {}", e)))?;

        match serde_json::from_str::<QueryResponse>(&body) {
            Ok(parsed) => Ok(ApiReply::Success(parsed)),
            Err(e) => {
                tracing::warn!(
                    status = status.as_u16(),
                    error = %e,
                    "Query API returned success without a usable body"
                );
                Ok(ApiReply::Failure {
                    status: status.as_u16(),
                })
            }
        }
    }
}

fn describe_transport_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Transport(format!("request timed out: {}", err))
    } else if err.is_connect() {
        ChatError::Transport(format!("connection failed: {}", err))
    } else {
        ChatError::Transport(format!("request failed: {}", err))
    }
}

/// Join a base URL and a relative path, treating the base as a directory.
fn join_endpoint(endpoint: &str, path: &str) -> Result<Url, ChatError> {
    let trimmed = endpoint.trim();
    let base = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let base = Url::parse(&base)
        .map_err(|e| ChatError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ChatError::Config(format!("invalid query path '{}': {}", path, e)))
}
