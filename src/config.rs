use std::time::Duration;

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    // production or development, decides log level and where logs go
    #[clap(long, env, value_enum, default_value = "development")]
    pub cargo_env: CargoEnv,

    #[clap(long, env, default_value = "0.0.0.0")]
    pub host: String,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // prefix written into rewritten playlist lines. if the proxy sits behind something that
    // mounts it somewhere else (vercel likes /api/proxy) change this so players hit the right path
    #[clap(long, env, default_value = "/proxy")]
    pub proxy_base_path: String,

    // whole upstream request, headers and body
    #[clap(long, env, default_value = "30")]
    pub upstream_timeout_secs: u64,

    #[clap(long, env, default_value = "5")]
    pub max_redirects: usize,

    // playlists are buffered to be rewritten, anything bigger than this is refused. 8 MiB
    #[clap(long, env, default_value = "8388608")]
    pub max_manifest_bytes: usize,

    // upstream certs are verified unless this is turned on. only flip it for origins with broken
    // certs that you actually trust
    #[clap(long, env, default_value_t = false)]
    pub danger_accept_invalid_certs: bool,

    // rolling log files land here in production
    #[clap(long, env, default_value = "logs")]
    pub log_dir: String,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    // mirrors the clap defaults so tests and library users don't need to parse args
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            host: "0.0.0.0".to_string(),
            port: 5000,
            proxy_base_path: "/proxy".to_string(),
            upstream_timeout_secs: 30,
            max_redirects: 5,
            max_manifest_bytes: 8 * 1024 * 1024,
            danger_accept_invalid_certs: false,
            log_dir: "logs".to_string(),
            sentry_dsn: None,
        }
    }
}
