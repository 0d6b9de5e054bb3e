use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::types::LimitsConfig;
use crate::error::{ConnectionError, SessionError};
use crate::protocol::frame;

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Authenticating,
    AuthOk,
    AuthFailed,
    Transferring,
    Done,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::AuthFailed | SessionState::Done | SessionState::Errored
        )
    }

    fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Negotiating, Authenticating) => true,
            (Authenticating, AuthOk) | (Authenticating, AuthFailed) => true,
            (AuthOk, Transferring) => true,
            (Transferring, Done) => true,
            (from, Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Negotiating => "NEGOTIATING",
            SessionState::Authenticating => "AUTHENTICATING",
            SessionState::AuthOk => "AUTH_OK",
            SessionState::AuthFailed => "AUTH_FAILED",
            SessionState::Transferring => "TRANSFERRING",
            SessionState::Done => "DONE",
            SessionState::Errored => "ERRORED",
        };
        f.write_str(s)
    }
}

/// Timeouts and size bounds applied to every session I/O operation.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub control_timeout: Duration,
    pub chunk_timeout: Duration,
    pub max_frame_len: usize,
    pub chunk_size: usize,
    /// 0 = unlimited
    pub max_file_size: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            control_timeout: Duration::from_secs(30),
            chunk_timeout: Duration::from_secs(10),
            max_frame_len: crate::protocol::DEFAULT_MAX_FRAME_LEN,
            chunk_size: 4096,
            max_file_size: 0,
        }
    }
}

impl From<&LimitsConfig> for SessionLimits {
    fn from(cfg: &LimitsConfig) -> Self {
        Self {
            control_timeout: Duration::from_secs(cfg.control_timeout),
            chunk_timeout: Duration::from_secs(cfg.chunk_timeout),
            max_frame_len: cfg.max_frame_len,
            chunk_size: cfg.chunk_size,
            max_file_size: cfg.max_file_size,
        }
    }
}

/// Per-connection session. Owns the transport for its whole lifetime and
/// is never shared between tasks.
pub struct Session<T> {
    stream: T,
    state: SessionState,
    username: Option<String>,
    conn_id: String,
    limits: SessionLimits,
    bytes_received: u64,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: T, conn_id: impl Into<String>, limits: SessionLimits) -> Self {
        Self {
            stream,
            state: SessionState::Negotiating,
            username: None,
            conn_id: conn_id.into(),
            limits,
            bytes_received: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub(crate) fn set_username(&mut self, username: &str) {
        self.username = Some(username.to_string());
    }

    pub(crate) fn add_received(&mut self, n: u64) {
        self.bytes_received += n;
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_advance_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(conn_id = %self.conn_id, from = %self.state, to = %next, "Session state change");
        self.state = next;
        Ok(())
    }

    /// Mark the session as errored unless it already finished.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Errored;
        }
    }

    async fn bounded<F, R>(
        timeout: Duration,
        phase: &'static str,
        fut: F,
    ) -> Result<R, SessionError>
    where
        F: std::future::Future<Output = Result<R, SessionError>>,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout {
                phase,
                after: timeout,
            }
            .into()),
        }
    }

    /// Read a length-prefixed control frame as raw bytes.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, SessionError> {
        let max = self.limits.max_frame_len;
        let stream = &mut self.stream;
        Self::bounded(self.limits.control_timeout, "control read", async move {
            frame::read_frame(stream, max).await
        })
        .await
    }

    /// Read a length-prefixed control frame as UTF-8 text.
    pub async fn read_text(&mut self) -> Result<String, SessionError> {
        let max = self.limits.max_frame_len;
        let stream = &mut self.stream;
        Self::bounded(self.limits.control_timeout, "control read", async move {
            frame::read_text_frame(stream, max).await
        })
        .await
    }

    /// Read a fixed-length binary value (challenge response, OTP).
    pub async fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], SessionError> {
        let stream = &mut self.stream;
        Self::bounded(self.limits.control_timeout, "control read", async move {
            Ok(frame::read_fixed::<N>(stream).await?)
        })
        .await
    }

    pub async fn write_text(&mut self, text: &str) -> Result<(), SessionError> {
        let stream = &mut self.stream;
        Self::bounded(self.limits.control_timeout, "control write", async move {
            Ok(frame::write_text_frame(stream, text).await?)
        })
        .await
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let stream = &mut self.stream;
        Self::bounded(self.limits.control_timeout, "control write", async move {
            Ok(frame::write_raw(stream, bytes).await?)
        })
        .await
    }

    /// Read one chunk of file body. `Ok(0)` means the peer closed its side.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let stream = &mut self.stream;
        Self::bounded(self.limits.chunk_timeout, "chunk read", async move {
            match stream.read(buf).await {
                Ok(n) => Ok(n),
                Err(e) => Err(ConnectionError::from_read(e).into()),
            }
        })
        .await
    }

    /// Best-effort status line; failures are only logged.
    pub async fn try_write_text(&mut self, text: &str) {
        if let Err(e) = self.write_text(text).await {
            tracing::debug!(conn_id = %self.conn_id, error = %e, "Could not deliver status frame");
        }
    }

    /// Close the write side and hand the transport back.
    pub async fn close(mut self) -> T {
        let _ = self.stream.shutdown().await;
        self.stream
    }
}
