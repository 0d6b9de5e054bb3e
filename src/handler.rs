use crate::auth::{self, AuthResult};
use crate::context::AppContext;
use crate::error::{ConnectionError, SessionError};
use crate::session::{Session, SessionState};
use crate::transfer::{self, TransferResult};
use crate::utils::{format_bytes, generate_correlation_id};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info_span, warn, Instrument};

/// What happened on one connection, for logging and tests.
#[derive(Debug)]
pub struct ConnectionReport {
    pub conn_id: String,
    pub state: SessionState,
    pub auth: Option<AuthResult>,
    pub transfer: Option<TransferResult>,
    pub error: Option<SessionError>,
}

impl ConnectionReport {
    pub fn authenticated(&self) -> bool {
        self.auth.as_ref().is_some_and(|a| a.success)
    }
}

/// Handle a single accepted TCP connection.
pub async fn handle_connection(stream: TcpStream, ctx: Arc<AppContext>) -> Result<()> {
    let peer_addr = stream.peer_addr()?;
    let conn_id = generate_correlation_id();
    let span = info_span!("conn", conn_id = %conn_id, peer = %peer_addr);
    async {
        debug!(conn_id = %conn_id, peer = %peer_addr, "New connection");
        let report = run_session(stream, conn_id.clone(), &ctx).await;
        let received = report.transfer.as_ref().map_or(0, |t| t.bytes_received());
        debug!(
            conn_id = %conn_id,
            peer = %peer_addr,
            state = %report.state,
            authenticated = report.authenticated(),
            received = %format_bytes(received),
            "Connection closed"
        );
        Ok(())
    }
    .instrument(span)
    .await
}

/// Drive one connection end to end: negotiate, then receive one file.
///
/// Never fails: every outcome ends up in the report and the transport
/// is shut down before returning.
pub async fn run_session<T>(stream: T, conn_id: String, ctx: &AppContext) -> ConnectionReport
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut session = Session::new(stream, conn_id.clone(), ctx.limits);
    let mut report = ConnectionReport {
        conn_id,
        state: SessionState::Negotiating,
        auth: None,
        transfer: None,
        error: None,
    };

    match auth::negotiate(&mut session, ctx.credentials.as_ref()).await {
        Ok(result) if result.success => {
            let username = result.username.clone();
            report.auth = Some(result);
            match transfer::receive(&mut session, &username, &ctx.upload_dir).await {
                Ok(outcome) => report.transfer = Some(outcome),
                Err(e) => report.error = Some(e),
            }
        }
        Ok(result) => report.auth = Some(result),
        Err(e) => report.error = Some(e),
    }

    if let Some(ref e) = report.error {
        log_session_error(session.conn_id(), session.state(), e);
        session.fail();
    }
    report.state = session.state();
    session.close().await;
    report
}

fn log_session_error(conn_id: &str, state: SessionState, e: &SessionError) {
    match e {
        SessionError::Connection(ConnectionError::Timeout { .. }) => {
            warn!(conn_id = %conn_id, state = %state, error = %e, "Session timed out");
        }
        SessionError::Connection(ConnectionError::Closed) => {
            debug!(conn_id = %conn_id, state = %state, "Peer closed connection mid-session");
        }
        // Already reported to the client and logged where it was detected
        SessionError::Protocol(_) => {}
        _ => {
            warn!(conn_id = %conn_id, state = %state, error = %e, "Session aborted");
        }
    }
}
