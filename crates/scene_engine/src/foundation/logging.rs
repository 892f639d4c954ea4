//! Logging setup
//!
//! The engine logs through the `log` facade; applications pick the sink.
//! These helpers install `env_logger`, which honours `RUST_LOG`.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Initialize logging with an explicit filter such as `"scene_engine=debug"`
///
/// `RUST_LOG`, when set, takes precedence over `filter`.
pub fn init_with_filter(filter: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(filter);
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env_filter);
    }
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized, keeping the existing one");
    }
}
