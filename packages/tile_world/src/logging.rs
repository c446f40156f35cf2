//! Process-wide logging for binaries built on the map engine.

use std::{
    fs::File,
    path::Path,
    sync::Arc,
    env,
    panic,
};
use backtrace::Backtrace;
use tracing_subscriber::{
    fmt::{
        self,
        time::uptime,
    },
    prelude::*,
    Registry,
    EnvFilter,
};


/// File that `init_logging` writes next to the working directory.
pub const LOG_FILE_NAME: &'static str = "log";

/// Engine crates log at debug, everything else at warn.
const DEFAULT_FILTER: &'static str = "warn,chunk_data=debug,tile_world=debug";

// defaults first, so that `RUST_LOG` directives override them
fn filter_directives(env_filter: Option<&str>) -> String {
    match env_filter.filter(|s| !s.is_empty()) {
        Some(env_filter) => format!("{},{}", DEFAULT_FILTER, env_filter),
        None => DEFAULT_FILTER.to_owned(),
    }
}

// whether a panic should also log a backtrace
fn wants_backtrace(rust_backtrace: Option<&str>) -> bool {
    rust_backtrace.map(|val| val != "0").unwrap_or(true)
}

/// Install logging to stdout and to `LOG_FILE_NAME`. See `init_logging_to`.
pub fn init_logging() {
    init_logging_to(LOG_FILE_NAME);
}

/// Install a `tracing` subscriber logging compactly to stdout and plainly to
/// the file at `log_path`, filtered by `RUST_LOG` on top of the defaults.
/// Panics are routed through the logger too.
///
/// If the log file cannot be created, logs only go to stdout. Does nothing
/// if a global subscriber is already installed.
pub fn init_logging_to(log_path: impl AsRef<Path>) {
    let log_path = log_path.as_ref();
    let stdout_log = fmt::layer()
        .event_format(fmt::format()
            .compact()
            .with_timer(uptime())
            .with_line_number(true));

    let (file_log, file_error) = match File::create(log_path) {
        Ok(file) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file));
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let env_filter = env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = Registry::default()
        .with(EnvFilter::new(filter_directives(env_filter.as_deref())))
        .with(stdout_log)
        .with(file_log);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    if let Some(e) = file_error {
        warn!(%e, path = %log_path.display(), "unable to create log file, logging to stdout only");
    }
    info!("starting program");

    panic::set_hook(Box::new(|info| {
        error!("{}", info);
        if wants_backtrace(env::var("RUST_BACKTRACE").ok().as_deref()) {
            error!("{:?}", Backtrace::new());
        }
    }));
    trace!("installed panic hook");
}
