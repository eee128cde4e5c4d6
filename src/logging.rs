//! Thin logging wrappers over the `log` facade, matching the rest of the crate's habit of
//! calling `log_error`/`log_info`/... instead of the macros directly so call sites read the
//! same whether the backend is `env_logger` in a CLI host or something else in an embedding app.

use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the `env_logger` backend. Call once at process startup.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
