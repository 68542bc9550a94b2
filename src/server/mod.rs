pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderName, HeaderValue, header},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use api::{
    health_controller::health_endpoint, metrics_controller::metrics_endpoint,
    proxy_controller::ProxyController,
};
use services::ProxyServices;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// browsers only need these four, attached to every response including errors
const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Range"),
    (
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        "Content-Length, Content-Range",
    ),
];

pub struct ProxyApplicationServer;

impl ProxyApplicationServer {
    /// full app with the cors headers and request tracing, no listener attached
    pub fn router(services: ProxyServices) -> Router {
        let mut router = Router::new()
            .merge(ProxyController::app())
            .route("/health", get(health_endpoint));

        // only mounted if someone installed a recorder to render
        if services.metrics.is_some() {
            router = router.route("/metrics", get(metrics_endpoint));
        }

        let mut router = router.layer(Extension(services));

        for (name, value) in CORS_HEADERS {
            router = router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ));
        }

        router.layer(TraceLayer::new_for_http())
    }

    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        Lazy::force(&START_TIME);

        // a second recorder can't be installed, the proxy keeps working without /metrics
        let metrics = match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("metrics recorder not installed: {}", e);
                None
            }
        };

        let services = ProxyServices::new(config.clone(), metrics)?;
        let app = Self::router(services);

        let address = config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        info!("proxy listening on {}", address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("proxy stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
