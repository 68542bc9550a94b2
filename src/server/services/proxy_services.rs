use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::{
    config::AppConfig,
    server::{
        services::upstream_services::{DynUpstreamFetcher, ReqwestUpstreamFetcher},
        utils::manifest_utils::ManifestRewriter,
    },
};

/// everything a handler needs, cloned per request
/// nothing in here is mutable, requests never share state through it
#[derive(Clone)]
pub struct ProxyServices {
    pub upstream: DynUpstreamFetcher,
    pub rewriter: Arc<ManifestRewriter>,
    pub metrics: Option<PrometheusHandle>,
    pub config: Arc<AppConfig>,
}

impl ProxyServices {
    pub fn new(config: Arc<AppConfig>, metrics: Option<PrometheusHandle>) -> anyhow::Result<Self> {
        info!("starting proxy services...");

        let upstream = Arc::new(ReqwestUpstreamFetcher::new(&config)?) as DynUpstreamFetcher;

        info!(
            "upstream client ok (timeout {}s, {} redirects max)",
            config.upstream_timeout_secs, config.max_redirects
        );

        Ok(Self::with_upstream(config, upstream, metrics))
    }

    /// same as `new` but with the fetcher supplied, tests hand in a mock here
    pub fn with_upstream(
        config: Arc<AppConfig>,
        upstream: DynUpstreamFetcher,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let rewriter = Arc::new(ManifestRewriter::new(config.proxy_base_path.clone()));

        Self {
            upstream,
            rewriter,
            metrics,
            config,
        }
    }
}
