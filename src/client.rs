//! Client side of the protocol, used by `authdrop send` and the
//! end-to-end tests.

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::auth::{chap, skey, AuthProtocol};
use crate::error::SessionError;
use crate::protocol::{self, frame, CHALLENGE_LEN, DEFAULT_MAX_FRAME_LEN, DIGEST_LEN};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum Credentials {
    Pap {
        username: String,
        secret: String,
    },
    Chap {
        username: String,
        secret: String,
    },
    SKey {
        username: String,
        seed: String,
        secret: String,
    },
}

impl Credentials {
    pub fn protocol(&self) -> AuthProtocol {
        match self {
            Credentials::Pap { .. } => AuthProtocol::Pap,
            Credentials::Chap { .. } => AuthProtocol::Chap,
            Credentials::SKey { .. } => AuthProtocol::SKey,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Credentials::Pap { username, .. }
            | Credentials::Chap { username, .. }
            | Credentials::SKey { username, .. } => username,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("protocol", &self.protocol())
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

/// Server verdict after the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthVerdict {
    Success,
    Failed,
    /// Any `ERROR: ...` line or an unexpected reply.
    Error(String),
}

/// Server status line after the file body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReply {
    Received(String),
    Incomplete(String),
    Error(String),
}

impl FileReply {
    pub fn message(&self) -> &str {
        match self {
            FileReply::Received(m) | FileReply::Incomplete(m) | FileReply::Error(m) => m,
        }
    }
}

async fn read_status<S>(stream: &mut S) -> Result<String, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    frame::read_text_frame(stream, DEFAULT_MAX_FRAME_LEN).await
}

/// Send the selector and run the client half of the chosen scheme.
pub async fn authenticate<S>(stream: &mut S, creds: &Credentials) -> Result<AuthVerdict, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let selector = creds.protocol().selector().to_string();
    frame::write_text_frame(stream, &selector).await?;
    frame::write_text_frame(stream, creds.username()).await?;

    match creds {
        Credentials::Pap { secret, .. } => {
            frame::write_frame(stream, secret.as_bytes()).await?;
        }
        Credentials::Chap { secret, .. } => {
            let challenge = frame::read_fixed::<CHALLENGE_LEN>(stream).await?;
            let response = chap::expected_response(&challenge, secret.as_bytes());
            frame::write_raw(stream, &response).await?;
        }
        Credentials::SKey { seed, secret, .. } => {
            let announced = read_status(stream).await?;
            // A counter of 0 cannot be answered; send filler so the
            // server still reads a complete response.
            let otp = announced
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|n| skey::one_time_password(seed.as_bytes(), secret.as_bytes(), n))
                .unwrap_or([0u8; DIGEST_LEN]);
            frame::write_raw(stream, &otp).await?;
        }
    }

    let reply = read_status(stream).await?;
    Ok(match reply.as_str() {
        protocol::AUTH_SUCCESS => AuthVerdict::Success,
        protocol::AUTH_FAILED => AuthVerdict::Failed,
        _ => AuthVerdict::Error(reply),
    })
}

/// Announce and stream one file after a successful `authenticate`.
pub async fn send_file<S>(stream: &mut S, name: &str, data: &[u8]) -> Result<FileReply, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    frame::write_text_frame(stream, &format!("{}{}", protocol::FILENAME_TAG, name)).await?;
    frame::write_text_frame(stream, &format!("{}{}", protocol::FILESIZE_TAG, data.len())).await?;

    let ready = read_status(stream).await?;
    if ready != protocol::READY {
        return Ok(classify_reply(ready));
    }

    frame::write_raw(stream, data).await?;
    Ok(classify_reply(read_status(stream).await?))
}

/// Connect, authenticate and, on success, send one file. Every step is
/// bounded by `timeout`.
pub async fn connect_and_send(
    addr: &str,
    creds: &Credentials,
    name: &str,
    data: &[u8],
    timeout: Duration,
) -> anyhow::Result<(AuthVerdict, Option<FileReply>)> {
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .with_context(|| format!("connecting to {}: timed out", addr))?
        .with_context(|| format!("connecting to {}", addr))?;

    let verdict = tokio::time::timeout(timeout, authenticate(&mut stream, creds))
        .await
        .context("authentication timed out")??;
    if verdict != AuthVerdict::Success {
        let _ = stream.shutdown().await;
        return Ok((verdict, None));
    }

    let reply = tokio::time::timeout(timeout, send_file(&mut stream, name, data))
        .await
        .context("file transfer timed out")??;
    let _ = stream.shutdown().await;
    Ok((verdict, Some(reply)))
}

fn classify_reply(line: String) -> FileReply {
    if line.starts_with(protocol::FILE_RECEIVED_PREFIX) {
        FileReply::Received(line)
    } else if line.starts_with(protocol::FILE_INCOMPLETE_PREFIX) {
        FileReply::Incomplete(line)
    } else {
        FileReply::Error(line)
    }
}
