use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use super::config::AppConfig;

/// Env var overriding the configured log filter, e.g. `SONGBOOK_LOG=songbook=debug`
pub const LOG_ENV: &str = "SONGBOOK_LOG";

/// Installs the global subscriber: a daily rolling file under the cache
/// dir, plus stderr when `verbose`. Keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init(level: &str, verbose: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let log_dir = AppConfig::get_log_dir();
    let _ = fs::create_dir_all(&log_dir);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("songbook")
        .filename_suffix("log")
        .build(&log_dir)
        .ok();

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    // Without a log file, stderr is the only place left
    let stderr_layer = (verbose || file_layer.is_none())
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    guard
}
