use axum::extract::{FromRequestParts, Query};
use axum::http::header::RANGE;
use axum::http::{Uri, request::Parts};
use serde::Deserialize;
use tracing::debug;

use crate::server::error::Error;
use crate::server::services::upstream_services::ProxyRequest;
use crate::server::utils::url_utils::validate_target_url;

/// path the proxy routes are mounted on
pub const PROXY_ROUTE: &str = "/proxy";

#[derive(Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// pulls the target out of `/proxy/<target>`, the raw query belongs to the target in this form
pub fn embedded_target(uri: &Uri) -> Option<String> {
    let rest = uri.path().strip_prefix(PROXY_ROUTE)?.strip_prefix('/')?;

    if rest.is_empty() {
        return None;
    }

    let mut target = urlencoding::decode(rest)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| rest.to_string());

    // some clients squash `//` in paths, put the scheme slash back
    for scheme in ["http:/", "https:/"] {
        let head_matches = target
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme));
        let squashed = target
            .get(scheme.len()..)
            .is_some_and(|tail| !tail.is_empty() && !tail.starts_with('/'));

        if head_matches && squashed {
            target.insert(scheme.len(), '/');
            break;
        }
    }

    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    Some(target)
}

/// validates the target before anything goes upstream
/// `?url=` wins, the embedded path form is only a fallback
impl<S> FromRequestParts<S> for ProxyRequest
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query): Query<ProxyQuery> = Query::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::InvalidUrl(e.body_text()))?;

        let raw = query
            .url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| embedded_target(&parts.uri));

        let target = validate_target_url(raw.as_deref()).inspect_err(|err| {
            let reason = match err {
                Error::MissingParameter => "missing_url",
                _ => "invalid_url",
            };
            metrics::counter!("proxy_rejected_requests_total", "reason" => reason).increment(1);
        })?;
        let range = parts.headers.get(RANGE).cloned();

        debug!("Proxy target: {} (range: {:?})", target.as_str(), range);

        Ok(ProxyRequest { target, range })
    }
}
