use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use tracing::info;

use stream_proxy::{AppConfig, Logger, ProxyApplicationServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // guards live until main returns so the log writer and sentry keep flushing
    let _guards = Logger::init(&config);

    info!(
        "logger and env prepped ({:?}), proxy base path {}",
        config.cargo_env, config.proxy_base_path
    );

    ProxyApplicationServer::serve(config)
        .await
        .context("proxy server failed")?;

    Ok(())
}
