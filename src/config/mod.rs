pub mod env;
pub mod redact;
pub mod types;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use types::AppConfig;

use crate::protocol::MAX_FRAME_LEN_LIMIT;

/// Maximum config file size (1 MB)
const MAX_CONFIG_SIZE: u64 = 1_048_576;

/// Load and validate configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("reading config metadata: {}", path.display()))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        anyhow::bail!(
            "config file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        );
    }

    check_config_file_permissions(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&content)
}

/// Effective configuration: the file if present (defaults otherwise),
/// then `AUTHDROP_*` environment overrides, then validation.
pub fn load_effective_config(path: &Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        tracing::warn!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        AppConfig::default()
    };
    env::apply_env_overrides(&mut config);
    parse_config_validate(&config)?;
    Ok(config)
}

/// On Unix, warn if the config file is readable by group or others,
/// since it holds shared secrets.
#[cfg(unix)]
fn check_config_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    path = %path.display(),
                    mode = format!("{:04o}", mode & 0o7777),
                    "Config file is readable by group/others. \
                     Consider restricting permissions to 0600 \
                     since it contains shared secrets."
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not check config file permissions"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_config_file_permissions(_path: &Path) {}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("parsing TOML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate an already-constructed AppConfig (e.g. after env overrides).
pub fn parse_config_validate(config: &AppConfig) -> Result<()> {
    validate_config(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    validate_server(config)?;
    validate_limits(config)?;
    validate_users(config)?;
    Ok(())
}

fn validate_server(config: &AppConfig) -> Result<()> {
    config
        .server
        .listen
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server.listen address: {}", config.server.listen))?;
    if config.server.upload_dir.as_os_str().is_empty() {
        anyhow::bail!("server.upload_dir must not be empty");
    }
    Ok(())
}

fn validate_limits(config: &AppConfig) -> Result<()> {
    let limits = &config.limits;
    if limits.max_connections == 0 {
        anyhow::bail!("limits.max_connections must be greater than 0");
    }
    if limits.control_timeout == 0 {
        anyhow::bail!("limits.control_timeout must be greater than 0");
    }
    if limits.chunk_timeout == 0 {
        anyhow::bail!("limits.chunk_timeout must be greater than 0");
    }
    if limits.chunk_size == 0 {
        anyhow::bail!("limits.chunk_size must be greater than 0");
    }
    if limits.max_frame_len == 0 || limits.max_frame_len > MAX_FRAME_LEN_LIMIT {
        anyhow::bail!(
            "limits.max_frame_len must be between 1 and {}",
            MAX_FRAME_LEN_LIMIT
        );
    }
    Ok(())
}

fn validate_users(config: &AppConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for user in &config.users {
        if user.username.is_empty() {
            anyhow::bail!("username must not be empty");
        }
        if !seen.insert(user.username.as_str()) {
            anyhow::bail!("duplicate username: {}", user.username);
        }
        if user.secret.is_none() && user.skey.is_none() {
            anyhow::bail!(
                "user '{}' needs a secret, an skey chain, or both",
                user.username
            );
        }
        if let Some(ref skey) = user.skey {
            crate::auth::store::decode_checkpoint(&skey.checkpoint)
                .with_context(|| format!("user '{}': invalid skey.checkpoint", user.username))?;
        }
    }
    if config.users.is_empty() {
        tracing::warn!("No users configured: every authentication attempt will fail");
    }
    Ok(())
}
