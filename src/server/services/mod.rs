pub mod proxy_services;
pub mod upstream_services;

pub use proxy_services::ProxyServices;
pub use upstream_services::DynUpstreamFetcher;
