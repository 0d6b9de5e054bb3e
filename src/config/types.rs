use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Log level enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "users")]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Where received files are written (created if absent)
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Seconds to wait for in-flight connections on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upload_dir: default_upload_dir(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("received_files")
}

fn default_shutdown_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Concurrent connection workers; extra connections are dropped.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Per-frame read/write timeout during negotiation and metadata (seconds)
    #[serde(default = "default_control_timeout")]
    pub control_timeout: u64,
    /// Per-chunk read timeout during the file body (seconds)
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout: u64,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Largest accepted declared file size in bytes (0 = unlimited)
    #[serde(default)]
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            control_timeout: default_control_timeout(),
            chunk_timeout: default_chunk_timeout(),
            max_frame_len: default_max_frame_len(),
            chunk_size: default_chunk_size(),
            max_file_size: 0,
        }
    }
}

fn default_max_connections() -> u32 {
    256
}
fn default_control_timeout() -> u64 {
    30
}
fn default_chunk_timeout() -> u64 {
    10
}
fn default_max_frame_len() -> usize {
    crate::protocol::DEFAULT_MAX_FRAME_LEN
}
fn default_chunk_size() -> usize {
    4096
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

#[derive(Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub username: String,
    /// Shared secret for PAP and CHAP
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub skey: Option<SkeyConfig>,
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("skey", &self.skey)
            .finish()
    }
}

/// Provisioned S-Key chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkeyConfig {
    pub seed: String,
    /// Logins left in the chain
    pub counter: u64,
    /// Hex-encoded `otp(counter + 1)`
    pub checkpoint: String,
}
