/* Logger initialization */
use std::{panic, thread};

use tracing::{error, level_filters::LevelFilter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{AppConfig, CargoEnv};

pub struct LoggerGuards {
    pub _tracing_guard: WorkerGuard,
    // option because sentry is opt in
    pub _sentry_guard: Option<sentry::ClientInitGuard>,
}

pub struct Logger {}

impl Logger {
    pub fn init(config: &AppConfig) -> LoggerGuards {
        // every proxied segment logs at debug, so production stays at info or the files explode
        let max_level = match config.cargo_env {
            CargoEnv::Development => LevelFilter::DEBUG,
            CargoEnv::Production => LevelFilter::INFO,
        };

        let (non_blocking, guard) = match config.cargo_env {
            CargoEnv::Development => tracing_appender::non_blocking(std::io::stdout()),
            CargoEnv::Production => tracing_appender::non_blocking(
                tracing_appender::rolling::daily(&config.log_dir, "proxy.log"),
            ),
        };

        let sentry_guard = config
            .sentry_dsn
            .clone()
            .map(|dsn| Self::init_sentry(dsn, config.cargo_env));

        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);

        let registry = tracing_subscriber::registry()
            .with(max_level)
            .with(fmt_layer);

        if sentry_guard.is_some() {
            registry.with(sentry_tracing::layer()).init();
        } else {
            registry.init();
        }

        Self::install_panic_hook();

        // both guards go back to main, dropping them stops the log flush
        LoggerGuards {
            _tracing_guard: guard,
            _sentry_guard: sentry_guard,
        }
    }

    fn init_sentry(dsn: String, cargo_env: CargoEnv) -> sentry::ClientInitGuard {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(match cargo_env {
                    CargoEnv::Development => "development".into(),
                    CargoEnv::Production => "production".into(),
                }),
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    }

    fn install_panic_hook() {
        panic::set_hook(Box::new(|info| {
            let thread = thread::current();
            let thread = thread.name().unwrap_or("unknown");

            let msg = match info.payload().downcast_ref::<&'static str>() {
                Some(s) => *s,
                None => match info.payload().downcast_ref::<String>() {
                    Some(s) => &**s,
                    None => "Box<Any>",
                },
            };

            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown location".to_string());

            // "notrace - " prefixed panics are expected enough that a backtrace is just noise
            if let Some(stripped) = msg.strip_prefix("notrace - ") {
                error!(
                    target: "panic", "thread '{}' panicked at '{}': {}",
                    thread, stripped, location
                );
            } else {
                error!(
                    target: "panic", "thread '{}' panicked at '{}': {}\n{:?}",
                    thread,
                    msg,
                    location,
                    backtrace::Backtrace::new()
                );
            }
        }));
    }
}
