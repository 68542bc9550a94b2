use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use mockall::automock;
use tracing::{debug, error, warn};

use crate::{
    config::AppConfig,
    server::{
        error::{AppResult, Error},
        utils::url_utils::TargetUrl,
    },
};

pub type UpstreamBody = BoxStream<'static, AppResult<Bytes>>;

pub type DynUpstreamFetcher = Arc<dyn UpstreamFetcherTrait + Send + Sync>;

/// one incoming proxy call, built by the extractor and dropped when the response is sent
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target: TargetUrl,
    /// forwarded verbatim so players can seek
    pub range: Option<HeaderValue>,
}

impl ProxyRequest {
    /// same target, whole resource. playlists are never fetched in slices
    pub fn without_range(&self) -> Self {
        Self {
            target: self.target.clone(),
            range: None,
        }
    }
}

/// logs the failed origin and bumps the upstream error counter
pub fn record_upstream_error(target: &str, err: &Error) {
    if let Some(reason) = err.upstream_reason() {
        error!("Upstream {} failed ({}): {}", target, reason, err);
        metrics::counter!("proxy_upstream_errors_total", "reason" => reason).increment(1);
    }
}

/// what came back from the origin, owned by the request that fetched it
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// playlists have to be read fully before they can be rewritten, bounded by `max_bytes`
    pub async fn into_text(self, target: &str, max_bytes: usize) -> AppResult<String> {
        let bytes = self
            .body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                if acc.len() + chunk.len() > max_bytes {
                    return Err(Error::ManifestTooLarge(target.to_string(), max_bytes));
                }
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;

        // a broken byte here only breaks one line for the player, not the whole playlist
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[automock]
#[async_trait::async_trait]
pub trait UpstreamFetcherTrait {
    /// GET the target, forwarding the range header. timeout and redirect bound are applied here
    async fn fetch(&self, request: &ProxyRequest) -> AppResult<UpstreamResponse>;
}

pub struct ReqwestUpstreamFetcher {
    http: reqwest::Client,
}

impl ReqwestUpstreamFetcher {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        if config.danger_accept_invalid_certs {
            warn!("Upstream TLS certificate verification is DISABLED");
        }

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()
            .context("failed to build upstream http client")?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl UpstreamFetcherTrait for ReqwestUpstreamFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> AppResult<UpstreamResponse> {
        let mut request_builder = self.http.get(request.target.url().clone());

        if let Some(range) = &request.range {
            debug!("Forwarding range {:?}", range);
            request_builder = request_builder.header(header::RANGE, range.clone());
        }

        let response = request_builder.send().await?;

        debug!(
            "Upstream {} answered {}",
            request.target.as_str(),
            response.status()
        );

        let status = response.status();
        let headers = response.headers().clone();
        // failures after the headers went out never reach an error response, log them here
        let target = request.target.as_str().to_string();
        let body = response
            .bytes_stream()
            .map_err(Error::from)
            .inspect_err(move |err| record_upstream_error(&target, err))
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
