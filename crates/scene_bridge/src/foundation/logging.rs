//! Logging setup
//!
//! The library only emits through the `log` facade; binaries decide whether
//! and how to install a logger.

pub use log::{debug, error, info, trace, warn};

/// Initialize `env_logger` with `info` as the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    init_with_filter("info");
}

/// Initialize `env_logger` with an explicit default filter (overridden by `RUST_LOG`).
pub fn init_with_filter(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();
}
