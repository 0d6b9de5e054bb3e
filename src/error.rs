use std::time::Duration;
use thiserror::Error;

use crate::session::SessionState;

/// Malformed or unexpected input from the peer. Reported to the client
/// with an error frame, never touches shared state.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid protocol selector: {0:?}")]
    InvalidSelector(String),
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("invalid file size: {0:?}")]
    InvalidFileSize(String),
    #[error("file too large: {declared} bytes (max {max})")]
    FileTooLarge { declared: u64, max: u64 },
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
}

impl ProtocolError {
    /// Status line sent to the client before the connection is closed.
    pub fn client_message(&self) -> String {
        match self {
            ProtocolError::InvalidSelector(_) => crate::protocol::ERROR_INVALID_PROTOCOL.to_string(),
            ProtocolError::FrameTooLarge { .. } => "ERROR: Frame too large".to_string(),
            ProtocolError::MalformedFrame(_) => "ERROR: Malformed frame".to_string(),
            ProtocolError::InvalidFileSize(_) => "ERROR: Invalid file size".to_string(),
            ProtocolError::FileTooLarge { .. } => "ERROR: File too large".to_string(),
            ProtocolError::InvalidFilename(_) => "ERROR: Invalid filename".to_string(),
        }
    }
}

/// Transport-level failure. The session is aborted without a reply.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("{phase} timed out after {}s", after.as_secs())]
    Timeout {
        phase: &'static str,
        after: Duration,
    },
    #[error("connection closed by peer")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Map a read error, folding unexpected EOF into `Closed`.
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => ConnectionError::Closed,
            _ => ConnectionError::Io(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Connection(ConnectionError::Timeout { .. })
        )
    }
}
