use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "authdrop",
    version,
    about = "Authenticated single-file drop server (PAP, CHAP, S-Key)"
)]
pub struct Cli {
    /// Path to configuration file (also settable via AUTHDROP_CONFIG env var)
    #[arg(short, long, default_value = "config.toml", env = "AUTHDROP_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration file
    CheckConfig,
    /// Show the effective configuration (with secrets redacted)
    ShowConfig {
        /// Output format: toml or json
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Health check: verify the server is reachable via TCP connect
    HealthCheck {
        /// Address to check (host:port)
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Authenticate against a server and upload one file
    Send {
        /// Server address (host:port)
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        /// Authentication scheme
        #[arg(long, value_enum, default_value_t = SendProtocol::Chap)]
        protocol: SendProtocol,
        #[arg(short, long)]
        username: String,
        /// Shared secret (S-Key: the passphrase the chain was derived from)
        #[arg(long, env = "AUTHDROP_SECRET", hide_env_values = true)]
        secret: String,
        /// S-Key seed (required with --protocol skey)
        #[arg(long)]
        seed: Option<String>,
        /// Per-step timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
        /// File to upload; only its final path component is sent as the name
        file: PathBuf,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page (roff format)
    Manpage,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendProtocol {
    Pap,
    Chap,
    Skey,
}
