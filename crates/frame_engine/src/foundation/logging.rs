//! Logging setup on top of `env_logger`

pub use log::{debug, error, info, trace, warn};

use log::LevelFilter;

/// Parse a level name such as `"info"` or `"debug"`
///
/// Unknown names fall back to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

/// Initialize the logging system
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to every
/// module. Safe to call more than once.
pub fn init(default_level: &str) {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(parse_level(default_level));
    }
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
