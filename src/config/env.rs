//! Environment variable overrides.
//!
//! Applied on top of the file (or default) configuration:
//! `AUTHDROP_LISTEN`, `AUTHDROP_UPLOAD_DIR`, `AUTHDROP_LOG_LEVEL`,
//! `AUTHDROP_LOG_FORMAT`, `AUTHDROP_MAX_CONNECTIONS`.

use crate::config::types::*;
use std::path::PathBuf;

/// Apply env var overrides on top of an existing config.
/// Values that fail to parse are warned about and ignored.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(v) = opt_env("AUTHDROP_LISTEN") {
        config.server.listen = v;
    }
    if let Some(v) = opt_env("AUTHDROP_UPLOAD_DIR") {
        config.server.upload_dir = PathBuf::from(v);
    }
    if let Some(level) = parse_env_checked::<LogLevel>("AUTHDROP_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = parse_env_checked::<LogFormat>("AUTHDROP_LOG_FORMAT") {
        config.logging.format = format;
    }
    config.limits.max_connections =
        parse_env("AUTHDROP_MAX_CONNECTIONS", config.limits.max_connections);
}

/// Get an env var, treating empty as unset.
fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    parse_env_checked(key).unwrap_or(default)
}

fn parse_env_checked<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = opt_env(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
