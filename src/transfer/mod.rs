pub mod sink;

use std::fmt;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{ConnectionError, ProtocolError, SessionError};
use crate::protocol;
use crate::session::{Session, SessionState};
use sink::UploadDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Received,
    Incomplete,
    Error,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Received => write!(f, "RECEIVED"),
            TransferStatus::Incomplete => write!(f, "INCOMPLETE"),
            TransferStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Name and size announced by the client, plus what actually arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferMetadata {
    pub name: String,
    pub declared_size: u64,
    pub bytes_received: u64,
}

impl FileTransferMetadata {
    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.declared_size
    }

    pub fn remaining(&self) -> u64 {
        self.declared_size.saturating_sub(self.bytes_received)
    }
}

#[derive(Debug, Clone)]
pub struct TransferResult {
    pub status: TransferStatus,
    pub metadata: FileTransferMetadata,
    pub path: PathBuf,
    /// Set when `status` is `Error`.
    pub error: Option<String>,
}

impl TransferResult {
    pub fn bytes_received(&self) -> u64 {
        self.metadata.bytes_received
    }
}

/// Read the `FILENAME:` and `FILESIZE:` frames.
async fn read_metadata<T>(
    session: &mut Session<T>,
) -> Result<FileTransferMetadata, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let name_frame = session.read_text().await?;
    let name = protocol::parse_tagged(&name_frame, protocol::FILENAME_TAG)?.to_string();

    let size_frame = session.read_text().await?;
    let size_value = protocol::parse_tagged(&size_frame, protocol::FILESIZE_TAG)?;
    let declared_size = protocol::parse_file_size(size_value)?;

    let max = session.limits().max_file_size;
    if max > 0 && declared_size > max {
        return Err(ProtocolError::FileTooLarge {
            declared: declared_size,
            max,
        }
        .into());
    }

    Ok(FileTransferMetadata {
        name,
        declared_size,
        bytes_received: 0,
    })
}

/// Receive exactly one file from an authenticated session.
///
/// Protocol errors in the metadata frames are reported with an error frame
/// and returned as `Err`. Once `READY` has been sent the outcome is always a
/// `TransferResult`: a short stream (EOF or reset) is `Incomplete`, a
/// timeout, i/o or storage failure is `Error`. Partial output is left on
/// disk in both cases.
pub async fn receive<T>(
    session: &mut Session<T>,
    username: &str,
    sink: &UploadDir,
) -> Result<TransferResult, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    session.advance(SessionState::Transferring)?;

    let mut metadata = match read_metadata(session).await {
        Ok(m) => m,
        Err(SessionError::Protocol(e)) => {
            warn!(conn_id = %session.conn_id(), user = %username, error = %e, "File metadata rejected");
            session.try_write_text(&e.client_message()).await;
            session.fail();
            return Err(e.into());
        }
        Err(e) => {
            session.fail();
            return Err(e);
        }
    };

    let path = match sink.resolve(&metadata.name) {
        Ok(p) => {
            // Status lines name the file as stored
            if let Some(stored) = p.file_name() {
                metadata.name = stored.to_string_lossy().into_owned();
            }
            p
        }
        Err(e) => {
            warn!(conn_id = %session.conn_id(), user = %username, error = %e, "File metadata rejected");
            session.try_write_text(&e.client_message()).await;
            session.fail();
            return Err(e.into());
        }
    };

    let mut file = match sink.create(&path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(conn_id = %session.conn_id(), path = %path.display(), error = %e, "Cannot open destination file");
            session.try_write_text("ERROR: Storage failure").await;
            session.fail();
            return Ok(TransferResult {
                status: TransferStatus::Error,
                metadata,
                path,
                error: Some(e.to_string()),
            });
        }
    };

    tracing::debug!(
        conn_id = %session.conn_id(),
        user = %username,
        file = %metadata.name,
        declared = metadata.declared_size,
        "Receiving file"
    );
    session.write_text(protocol::READY).await?;

    let mut buf = vec![0u8; session.limits().chunk_size.max(1)];
    let mut failure: Option<String> = None;

    while metadata.remaining() > 0 {
        let want = buf.len().min(usize::try_from(metadata.remaining()).unwrap_or(usize::MAX));
        let n = match session.read_chunk(&mut buf[..want]).await {
            // Peer reset ends the stream like EOF
            Ok(0) | Err(SessionError::Connection(ConnectionError::Closed)) => break,
            Ok(n) => n,
            Err(e) => {
                failure = Some(e.to_string());
                break;
            }
        };
        if let Err(e) = file.write_all(&buf[..n]).await {
            failure = Some(format!("storage write failed: {}", e));
            break;
        }
        metadata.bytes_received += n as u64;
        session.add_received(n as u64);
    }

    if let Err(e) = file.flush().await {
        failure.get_or_insert_with(|| format!("storage flush failed: {}", e));
    }
    drop(file);

    let status = match (&failure, metadata.is_complete()) {
        (Some(_), _) => TransferStatus::Error,
        (None, true) => TransferStatus::Received,
        (None, false) => TransferStatus::Incomplete,
    };

    match status {
        TransferStatus::Received => {
            session.advance(SessionState::Done)?;
            info!(
                conn_id = %session.conn_id(),
                user = %username,
                file = %metadata.name,
                bytes = metadata.bytes_received,
                path = %path.display(),
                "File received"
            );
            let msg = format!(
                "{} {} ({} bytes)",
                protocol::FILE_RECEIVED_PREFIX,
                metadata.name,
                metadata.bytes_received
            );
            session.try_write_text(&msg).await;
        }
        TransferStatus::Incomplete => {
            session.fail();
            warn!(
                conn_id = %session.conn_id(),
                user = %username,
                file = %metadata.name,
                bytes = metadata.bytes_received,
                declared = metadata.declared_size,
                "File transfer incomplete"
            );
            let msg = format!(
                "{} {} ({} of {} bytes)",
                protocol::FILE_INCOMPLETE_PREFIX,
                metadata.name,
                metadata.bytes_received,
                metadata.declared_size
            );
            session.try_write_text(&msg).await;
        }
        TransferStatus::Error => {
            session.fail();
            warn!(
                conn_id = %session.conn_id(),
                user = %username,
                file = %metadata.name,
                bytes = metadata.bytes_received,
                error = failure.as_deref().unwrap_or_default(),
                "File transfer aborted"
            );
            session
                .try_write_text(&format!("{} Transfer failed", protocol::ERROR_PREFIX))
                .await;
        }
    }

    Ok(TransferResult {
        status,
        metadata,
        path,
        error: failure,
    })
}
