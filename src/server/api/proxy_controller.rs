// the whole relay lives here: validate (extractor), fetch, classify, rewrite or pass through
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::debug;

use crate::server::{
    error::{AppResult, Error},
    extractors::PROXY_ROUTE,
    services::{
        ProxyServices,
        upstream_services::{ProxyRequest, UpstreamResponse, record_upstream_error},
    },
    utils::manifest_utils::{MANIFEST_CONTENT_TYPE, has_manifest_extension, is_manifest},
};

// headers that keep seeking working in the player, only for raw media
const FORWARDED_MEDIA_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

const DEFAULT_MEDIA_CONTENT_TYPE: &str = "application/octet-stream";

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        let embedded_route = format!("{}/{{*target}}", PROXY_ROUTE);

        Router::new()
            .route(
                PROXY_ROUTE,
                get(Self::proxy_get).options(Self::proxy_options),
            )
            // compatibility form, /proxy/https://host/path.m3u8?query
            .route(
                &embedded_route,
                get(Self::proxy_get).options(Self::proxy_options),
            )
    }

    async fn proxy_get(
        Extension(services): Extension<ProxyServices>,
        request: ProxyRequest,
    ) -> AppResult<Response> {
        // a slice of a playlist can't be rewritten, always fetch the whole thing
        let request = if request.range.is_some() && has_manifest_extension(&request.target) {
            debug!("Dropping range for manifest {}", request.target.as_str());
            request.without_range()
        } else {
            request
        };
        let target = request.target.as_str();

        let mut upstream = Self::fetch(&services, &request).await?;

        // error pages are relayed untouched, rewriting a 404 html page helps nobody
        if !upstream.status.is_success() || !is_manifest(&upstream.headers, &request.target) {
            metrics::counter!("proxy_requests_total", "kind" => "media").increment(1);
            return Self::build_passthrough_response(upstream);
        }

        // only the content type gave it away, the ranged answer is a fragment
        if upstream.status == StatusCode::PARTIAL_CONTENT && request.range.is_some() {
            debug!("Refetching manifest {} without range", target);
            upstream = Self::fetch(&services, &request.without_range()).await?;

            if !upstream.status.is_success() {
                metrics::counter!("proxy_requests_total", "kind" => "media").increment(1);
                return Self::build_passthrough_response(upstream);
            }
        }

        let status = upstream.status;
        let text = upstream
            .into_text(target, services.config.max_manifest_bytes)
            .await
            .inspect_err(|err| {
                // stream errors are counted by the fetcher, the size cap is ours
                if matches!(err, Error::ManifestTooLarge(..)) {
                    record_upstream_error(target, err);
                }
            })?;

        let rewritten = services.rewriter.rewrite(&text, &request.target);
        debug!(
            "Rewrote manifest {} ({} -> {} bytes)",
            target,
            text.len(),
            rewritten.len()
        );

        metrics::counter!("proxy_requests_total", "kind" => "manifest").increment(1);
        Ok(Self::build_manifest_response(status, rewritten))
    }

    async fn fetch(
        services: &ProxyServices,
        request: &ProxyRequest,
    ) -> AppResult<UpstreamResponse> {
        services
            .upstream
            .fetch(request)
            .await
            .inspect_err(|err| record_upstream_error(request.target.as_str(), err))
    }

    /// preflight never reaches upstream, the cors layer adds the headers
    async fn proxy_options() -> impl IntoResponse {
        StatusCode::OK
    }

    /// rewritten playlist, length is whatever the rewrite produced so upstream's is dropped
    fn build_manifest_response(status: StatusCode, body: String) -> Response {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
        );
        // live playlists change every few seconds
        response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        (status, response_headers, body).into_response()
    }

    /// raw bytes straight through, streamed and never buffered
    fn build_passthrough_response(upstream: UpstreamResponse) -> AppResult<Response> {
        let content_type = upstream
            .headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_MEDIA_CONTENT_TYPE));

        let mut builder = Response::builder()
            .status(upstream.status)
            .header(header::CONTENT_TYPE, content_type);

        for name in FORWARDED_MEDIA_HEADERS {
            if let Some(value) = upstream.headers.get(&name) {
                builder = builder.header(name, value.clone());
            }
        }

        debug!("Relaying {} upstream body", upstream.status);

        builder
            .body(Body::from_stream(upstream.body))
            .map_err(|e| Error::InternalServerErrorWithContext(e.to_string()))
    }
}
