//! Process-wide tracing setup
//!
//! File output goes through a non-blocking rolling appender. Ingest workers
//! and the gateway's blocking pool are told apart by thread name.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Storage engine and HTTP stack internals are noisy below warn
const QUIET_TARGETS: &[&str] = &["redb=warn", "hyper=warn", "tower_http=warn"];

/// Map the config's `rotation` value; anything unrecognized never rotates.
pub fn rotation_for(name: &str) -> Rotation {
    match name.to_ascii_lowercase().as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Default directive string used when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|t| t.to_string()));
    directives.join(",")
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process, or buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = RollingFileAppender::new(
        rotation_for(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    // JSON goes to the file only; text is mirrored to stdout for operators
    let json_layer = config.use_json.then(|| {
        fmt::layer()
            .json()
            .with_thread_names(true)
            .with_writer(writer.clone())
    });
    let text_layer = (!config.use_json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(writer)
    });
    let stdout_layer = (!config.use_json).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(stdout_layer)
        .init();

    tracing::debug!(
        dir = %config.log_dir,
        file = %config.log_file,
        rotation = %config.rotation,
        "Logging initialized"
    );
    guard
}
