use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

use authdrop::cli::{Cli, Command, SendProtocol};
use authdrop::client::{self, AuthVerdict, Credentials, FileReply};
use authdrop::config;
use authdrop::logging;
use authdrop::config::types::LogFormat;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckConfig) => {
            let cfg = logging::with_startup_logging(|| config::load_config(&cli.config))?;
            println!("Configuration is valid.");
            println!("  Listen: {}", cfg.server.listen);
            println!("  Upload dir: {}", cfg.server.upload_dir.display());
            println!("  Users: {}", cfg.users.len());
            let chains = cfg.users.iter().filter(|u| u.skey.is_some()).count();
            println!("  S-Key chains: {}", chains);
            println!(
                "  Max file size: {}",
                authdrop::utils::format_limit(cfg.limits.max_file_size)
            );
            return Ok(());
        }
        Some(Command::ShowConfig { ref format }) => {
            let app_config =
                logging::with_startup_logging(|| config::load_effective_config(&cli.config))?;
            let redacted = config::redact::redact_config(&app_config);

            match format.as_str() {
                "json" => {
                    let json = serde_json::to_string_pretty(&redacted)?;
                    println!("{}", json);
                }
                "toml" => {
                    let toml_str = toml::to_string_pretty(&redacted)?;
                    println!("{}", toml_str);
                }
                _ => {
                    anyhow::bail!("unsupported format '{}' (available: toml, json)", format);
                }
            }
            return Ok(());
        }
        Some(Command::HealthCheck { ref addr, timeout }) => {
            use std::net::{SocketAddr, TcpStream};

            let Ok(sock_addr) = addr.parse::<SocketAddr>() else {
                eprintln!("Invalid address: {}", addr);
                std::process::exit(1);
            };
            match TcpStream::connect_timeout(&sock_addr, Duration::from_secs(timeout)) {
                Ok(_) => {
                    println!("OK: {} is reachable", addr);
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("FAIL: {} is not reachable: {}", addr, e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Send {
            addr,
            protocol,
            username,
            secret,
            seed,
            timeout,
            file,
        }) => {
            let level = cli.log_level.as_deref().unwrap_or("warn");
            logging::setup_logging(level, LogFormat::Pretty);

            let creds = match protocol {
                SendProtocol::Pap => Credentials::Pap { username, secret },
                SendProtocol::Chap => Credentials::Chap { username, secret },
                SendProtocol::Skey => {
                    let seed = seed.context("--seed is required with --protocol skey")?;
                    Credentials::SKey {
                        username,
                        seed,
                        secret,
                    }
                }
            };
            let data = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("FILE has no file name component")?;

            let rt = tokio::runtime::Runtime::new()?;
            let (verdict, reply) = rt.block_on(client::connect_and_send(
                &addr,
                &creds,
                &name,
                &data,
                Duration::from_secs(timeout),
            ))?;

            match (verdict, reply) {
                (AuthVerdict::Success, Some(FileReply::Received(msg))) => {
                    println!("{}", msg);
                    return Ok(());
                }
                (AuthVerdict::Success, Some(other)) => {
                    eprintln!("{}", other.message());
                }
                (AuthVerdict::Success, None) => {
                    eprintln!("No transfer reply from server");
                }
                (AuthVerdict::Failed, _) => {
                    eprintln!("AUTH_FAILED");
                }
                (AuthVerdict::Error(msg), _) => {
                    eprintln!("{}", msg);
                }
            }
            std::process::exit(1);
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "authdrop", &mut std::io::stdout());
            return Ok(());
        }
        Some(Command::Manpage) => {
            use clap::CommandFactory;
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            return Ok(());
        }
        None => {}
    }

    let app_config =
        logging::with_startup_logging(|| config::load_effective_config(&cli.config))?;

    // Setup logging (CLI override > config)
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.to_string());
    logging::setup_logging(&log_level, app_config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %app_config.server.listen,
        "Starting authdrop"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = authdrop::server::run(app_config).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}
