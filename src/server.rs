use crate::config::types::AppConfig;
use crate::context::AppContext;
use crate::handler;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn run(config: AppConfig) -> Result<()> {
    let ctx = Arc::new(AppContext::from_config(config)?);
    ctx.upload_dir.ensure().await.with_context(|| {
        format!(
            "creating upload directory {}",
            ctx.upload_dir.root().display()
        )
    })?;

    let listener = TcpListener::bind(&ctx.config.server.listen)
        .await
        .with_context(|| format!("binding {}", ctx.config.server.listen))?;

    info!(
        addr = %ctx.config.server.listen,
        upload_dir = %ctx.upload_dir.root().display(),
        users = ctx.config.users.len(),
        max_connections = ctx.config.limits.max_connections,
        "Starting authdrop server"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(handle_signals(shutdown.clone()));

    serve(listener, ctx, shutdown).await
}

/// Accept loop. Returns once `shutdown` fires and in-flight workers
/// have drained or `server.shutdown_timeout` has elapsed.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<AppContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let max_connections = ctx.config.limits.max_connections as usize;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Listening for connections");
    }

    loop {
        let (stream, peer) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Accept error");
                        continue;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("Server shutting down (no new connections)");
                break;
            }
        };

        // Check connection limit before spawning
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(peer = %peer, "Connection limit reached, dropping connection");
                drop(stream);
                continue;
            }
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handler::handle_connection(stream, ctx).await {
                error!(peer = %peer, error = %e, "Connection error");
            }
        });
    }

    drain(&semaphore, max_connections, ctx.config.server.shutdown_timeout).await;
    info!(uptime_secs = ctx.start_time.elapsed().as_secs(), "Server stopped");
    Ok(())
}

/// Wait until every worker permit is back, or the deadline passes.
async fn drain(semaphore: &Semaphore, max_connections: usize, timeout_secs: u64) {
    let active = max_connections - semaphore.available_permits();
    if active == 0 {
        info!("Graceful shutdown complete");
        return;
    }

    info!(active_connections = active, timeout = timeout_secs, "Draining connections");
    let all = u32::try_from(max_connections).unwrap_or(u32::MAX);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), semaphore.acquire_many(all)).await
    {
        Ok(_) => info!("All connections drained"),
        Err(_) => {
            let active = max_connections - semaphore.available_permits();
            warn!(active_connections = active, "Shutdown timeout reached, forcing exit");
        }
    }
}

#[cfg(unix)]
async fn handle_signals(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            wait_ctrl_c(shutdown).await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received, initiating graceful shutdown");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, initiating graceful shutdown");
        }
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn handle_signals(shutdown: CancellationToken) {
    wait_ctrl_c(shutdown).await;
}

async fn wait_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Ctrl-C received, initiating graceful shutdown");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}
