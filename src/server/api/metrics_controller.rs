use axum::Extension;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::server::services::ProxyServices;

/// prometheus text format, 404 when the process never installed a recorder
pub async fn metrics_endpoint(Extension(services): Extension<ProxyServices>) -> Response {
    match services.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
