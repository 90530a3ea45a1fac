//! Logging setup.
//!
//! Console output is human readable. When a log directory is given, a
//! second layer writes JSON lines to a file rotated daily, with a more
//! verbose filter.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Console filter used when none is given and `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "webgate_web=info,webgate_session=info,webgate_auth=info,warn";

/// Filter of the JSON file layer.
pub const FILE_FILTER: &str = "webgate_web=trace,webgate_session=trace,webgate_auth=trace,info";

/// File name prefix of the rotated log files.
pub const LOG_FILE_NAME: &str = "webgate.log";

/// Install the global subscriber.
///
/// `filter` overrides the console filter; otherwise `RUST_LOG` is used,
/// then [`DEFAULT_FILTER`]. The returned guard flushes the file layer and
/// must be kept alive for as long as logs should be written. If a global
/// subscriber is already installed this does nothing.
pub fn init(filter: Option<&str>, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console_filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(console_filter);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .is_err()
    {
        return None;
    }
    guard
}
