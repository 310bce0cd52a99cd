// Copyright (c) 2025 - Cowboy AI, Inc.
//! HTTP Control-Plane Client
//!
//! JSON client for a control plane that carries version tokens in the
//! `ETag` response header and expects them back in `If-Match`.
//!
//! # Endpoints
//!
//! ```text
//! GET    {base}/distributions/{id}          → 200 Distribution, ETag
//! POST   {base}/distributions               → 201 Distribution, ETag   body {config, tags}
//! PUT    {base}/distributions/{id}/config   → 200 Distribution, ETag   If-Match
//! DELETE {base}/distributions/{id}          → 204                      If-Match
//! POST   {base}/distributions/{id}/tags     → 204                      body TagDiff
//! ```
//!
//! Error bodies are `{"code": "...", "message": "..."}`; the code decides the
//! [`RemoteError`] variant, the status code is the fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DistributionClient, RemoteResult, TaggingClient};
use crate::domain::{
    Distribution, DistributionConfig, DistributionId, TagDiff, Tags, VersionToken,
    VersionedDistribution,
};
use crate::errors::RemoteError;

/// Connection settings for [`HttpDistributionClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Control-plane base URL (e.g., "https://cdn.example.net/2020-05-31")
    pub base_url: String,

    /// Bearer token sent with every request
    pub api_token: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    config: &'a DistributionConfig,
    tags: &'a Tags,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Map an error response onto [`RemoteError`]
fn classify(status: StatusCode, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        body.to_string()
    } else {
        parsed.message
    };
    let detail = format!("{}: {}", parsed.code, message);

    match parsed.code.as_str() {
        "NoSuchDistribution" => RemoteError::NotFound(detail),
        "InvalidIfMatchVersion" => RemoteError::VersionConflict(detail),
        "PreconditionFailed" => RemoteError::PreconditionFailed(detail),
        "DistributionNotDisabled" => RemoteError::ResourceBusy(detail),
        "InvalidViewerCertificate" => RemoteError::InvalidViewerCertificate(detail),
        "Throttling" | "ServiceUnavailable" => RemoteError::Transient(detail),
        _ => match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
            StatusCode::PRECONDITION_FAILED => RemoteError::PreconditionFailed(detail),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::Transient(detail),
            s if s.is_server_error() => RemoteError::Transient(detail),
            s => RemoteError::Api {
                status: s.as_u16(),
                code: parsed.code,
                message,
            },
        },
    }
}

/// Distribution and tagging client over HTTP
#[derive(Debug, Clone)]
pub struct HttpDistributionClient {
    config: HttpClientConfig,
    client: Client,
}

impl HttpDistributionClient {
    pub fn new(config: HttpClientConfig) -> RemoteResult<Self> {
        info!("Using CDN control plane at {}", config.base_url);

        let mut headers = HeaderMap::new();
        if !config.api_token.is_empty() {
            headers.insert(
                AUTHORIZATION,
                format!("Bearer {}", config.api_token)
                    .parse()
                    .map_err(|e| RemoteError::Transport(format!("Invalid API token: {}", e)))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn distribution_url(&self, id: &DistributionId) -> String {
        format!(
            "{}/distributions/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(id.as_str())
        )
    }

    fn if_match(version: &VersionToken) -> RemoteResult<HeaderValue> {
        HeaderValue::from_str(version.as_str())
            .map_err(|e| RemoteError::Transport(format!("Invalid version token: {}", e)))
    }

    /// Fail with the classified error unless the status is a success
    async fn check(response: Response) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }

    /// Decode a distribution body and pair it with the `ETag` header
    async fn versioned(response: Response) -> RemoteResult<VersionedDistribution> {
        let response = Self::check(response).await?;
        let version = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(VersionToken::new)
            .ok_or_else(|| RemoteError::Api {
                status: response.status().as_u16(),
                code: "MissingETag".to_string(),
                message: "response carried no ETag header".to_string(),
            })?;
        let distribution: Distribution = response.json().await?;
        Ok(VersionedDistribution::new(distribution, version))
    }
}

#[async_trait]
impl DistributionClient for HttpDistributionClient {
    async fn get(&self, id: &DistributionId) -> RemoteResult<VersionedDistribution> {
        debug!(%id, "GET distribution");
        let response = self.client.get(self.distribution_url(id)).send().await?;
        Self::versioned(response).await
    }

    async fn create(
        &self,
        config: &DistributionConfig,
        tags: &Tags,
    ) -> RemoteResult<VersionedDistribution> {
        let url = format!("{}/distributions", self.config.base_url.trim_end_matches('/'));
        debug!(caller_reference = ?config.caller_reference, "POST distribution");
        let response = self
            .client
            .post(url)
            .json(&CreateRequest { config, tags })
            .send()
            .await?;
        Self::versioned(response).await
    }

    async fn update(
        &self,
        id: &DistributionId,
        version: &VersionToken,
        config: &DistributionConfig,
    ) -> RemoteResult<VersionedDistribution> {
        debug!(%id, %version, "PUT distribution config");
        let response = self
            .client
            .put(format!("{}/config", self.distribution_url(id)))
            .header(IF_MATCH, Self::if_match(version)?)
            .json(config)
            .send()
            .await?;
        Self::versioned(response).await
    }

    async fn delete(&self, id: &DistributionId, version: &VersionToken) -> RemoteResult<()> {
        debug!(%id, %version, "DELETE distribution");
        let response = self
            .client
            .delete(self.distribution_url(id))
            .header(IF_MATCH, Self::if_match(version)?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TaggingClient for HttpDistributionClient {
    async fn apply_tag_diff(
        &self,
        id: &DistributionId,
        old_tags: &Tags,
        new_tags: &Tags,
    ) -> RemoteResult<()> {
        let diff = TagDiff::between(old_tags, new_tags);
        if diff.is_empty() {
            return Ok(());
        }
        debug!(%id, upsert = diff.upsert.len(), remove = diff.remove.len(), "POST tags");
        let response = self
            .client
            .post(format!("{}/tags", self.distribution_url(id)))
            .json(&diff)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
