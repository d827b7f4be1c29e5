use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Route tracing output to a daily-rotated file in the state directory so
/// the alternate screen is never written to. Returns the guard that flushes
/// the writer; keep it alive for the life of the process.
///
/// `RUST_LOG` overrides the default `syncboard=info` filter.
pub fn init(state_dir: &Path) -> Option<WorkerGuard> {
    if fs::create_dir_all(state_dir).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::daily(state_dir, "syncboard.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("syncboard=info"));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if result.is_err() {
        // A subscriber is already installed (tests); drop ours quietly.
        return None;
    }
    Some(guard)
}
