//! Length-prefixed framing.
//!
//! Text frames carry a 2-byte big-endian length followed by the payload.
//! Binary values with a length known to both sides (challenge, digest
//! responses, file body) travel as raw bytes with no prefix.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ConnectionError, ProtocolError, SessionError};

/// Read one length-prefixed frame. Lengths above `max_len` are rejected
/// before any payload is read.
pub async fn read_frame(
    stream: &mut (impl AsyncRead + Unpin),
    max_len: usize,
) -> Result<Vec<u8>, SessionError> {
    let len = stream
        .read_u16()
        .await
        .map_err(ConnectionError::from_read)? as usize;
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len }.into());
    }
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(ConnectionError::from_read)?;
    Ok(payload)
}

/// Read one frame and decode it as UTF-8.
pub async fn read_text_frame(
    stream: &mut (impl AsyncRead + Unpin),
    max_len: usize,
) -> Result<String, SessionError> {
    let payload = read_frame(stream, max_len).await?;
    String::from_utf8(payload)
        .map_err(|_| ProtocolError::MalformedFrame("text frame is not valid UTF-8".into()).into())
}

/// Write one length-prefixed frame.
pub async fn write_frame(
    stream: &mut (impl AsyncWrite + Unpin),
    payload: &[u8],
) -> Result<(), ConnectionError> {
    let len = u16::try_from(payload.len()).map_err(|_| {
        ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("frame payload too long: {} bytes", payload.len()),
        ))
    })?;
    let mut buf = Vec::with_capacity(2 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Write a UTF-8 text frame.
pub async fn write_text_frame(
    stream: &mut (impl AsyncWrite + Unpin),
    text: &str,
) -> Result<(), ConnectionError> {
    write_frame(stream, text.as_bytes()).await
}

/// Read exactly `N` raw bytes.
pub async fn read_fixed<const N: usize>(
    stream: &mut (impl AsyncRead + Unpin),
) -> Result<[u8; N], ConnectionError> {
    let mut buf = [0u8; N];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(ConnectionError::from_read)?;
    Ok(buf)
}

/// Write raw bytes with no prefix.
pub async fn write_raw(
    stream: &mut (impl AsyncWrite + Unpin),
    bytes: &[u8],
) -> Result<(), ConnectionError> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}
