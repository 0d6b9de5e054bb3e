pub mod frame;

use crate::error::ProtocolError;

// Server status lines
pub const AUTH_SUCCESS: &str = "AUTH_SUCCESS";
pub const AUTH_FAILED: &str = "AUTH_FAILED";
pub const ERROR_INVALID_PROTOCOL: &str = "ERROR: Invalid protocol";
pub const READY: &str = "READY";
pub const FILE_RECEIVED_PREFIX: &str = "FILE_RECEIVED:";
pub const FILE_INCOMPLETE_PREFIX: &str = "FILE_INCOMPLETE:";
pub const ERROR_PREFIX: &str = "ERROR:";

// Client metadata tags
pub const FILENAME_TAG: &str = "FILENAME:";
pub const FILESIZE_TAG: &str = "FILESIZE:";

// Protocol selectors
pub const SELECTOR_PAP: u8 = 1;
pub const SELECTOR_CHAP: u8 = 2;
pub const SELECTOR_SKEY: u8 = 3;

/// CHAP challenge length in bytes
pub const CHALLENGE_LEN: usize = 16;

/// Length of the reference digest (MD5)
pub const DIGEST_LEN: usize = 16;

/// Default upper bound for a single text frame
pub const DEFAULT_MAX_FRAME_LEN: usize = 4096;

/// Largest configurable frame length. Leaves room under the u16 prefix for
/// status lines that echo a filename of the maximum frame length.
pub const MAX_FRAME_LEN_LIMIT: usize = u16::MAX as usize - 64;

/// Strip a `TAG:` prefix from a metadata frame.
pub fn parse_tagged<'a>(frame: &'a str, tag: &str) -> Result<&'a str, ProtocolError> {
    frame
        .strip_prefix(tag)
        .ok_or_else(|| ProtocolError::MalformedFrame(format!("expected {} frame", tag)))
}

/// Parse the value of a `FILESIZE:` frame as a non-negative byte count.
pub fn parse_file_size(value: &str) -> Result<u64, ProtocolError> {
    let trimmed = value.trim();
    // u64::from_str accepts a leading '+', which the wire format does not
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidFileSize(value.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidFileSize(value.to_string()))
}
