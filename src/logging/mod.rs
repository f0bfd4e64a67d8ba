/*!
 * Logging Module
 * Console plus daily rolling `app.log` / `error.log` files
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Settings read from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub production: bool,
    pub level: String,
    pub directory: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        let production = std::env::var("ENVIRONMENT")
            .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
            .unwrap_or(false);
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if production {
                "info".to_string()
            } else {
                "debug".to_string()
            }
        });
        let directory = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        Self {
            production,
            level,
            directory,
        }
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        format!(
            "portfolio_cms={},tower_http=debug,axum=info,sqlx=warn",
            self.level
        )
    }
}

/// Installs the global subscriber.
///
/// The returned guards flush the background writers; hold them until exit.
pub fn init() -> Vec<WorkerGuard> {
    let settings = LogSettings::from_env();

    if let Err(e) = std::fs::create_dir_all(&settings.directory) {
        eprintln!("cannot create log directory {}: {}", settings.directory, e);
    }

    let (file_writer, file_guard) =
        non_blocking(rolling::daily(&settings.directory, "app.log"));
    let (error_writer, error_guard) =
        non_blocking(rolling::daily(&settings.directory, "error.log"));
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if settings.production {
        // JSON format for production
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        // Pretty format for development
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .with_writer(error_writer)
            .with_ansi(false)
            .with_filter(LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    }

    tracing::info!(
        production = settings.production,
        directory = %settings.directory,
        "logging initialized"
    );

    vec![file_guard, error_guard, console_guard]
}
