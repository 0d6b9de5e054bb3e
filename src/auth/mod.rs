pub mod chap;
pub mod pap;
pub mod skey;
pub mod store;

use std::fmt;

use md5::{Digest as _, Md5};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::error::{ProtocolError, SessionError};
use crate::protocol::{self, DIGEST_LEN};
use crate::session::{Session, SessionState};
use store::{CredentialStore, OtpRejection};

/// Output of the reference hash (MD5).
pub type Digest = [u8; DIGEST_LEN];

/// Hash the concatenation of `parts`.
pub fn digest(parts: &[&[u8]]) -> Digest {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// The three selectable challenge-response schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Pap,
    Chap,
    SKey,
}

impl AuthProtocol {
    /// Parse the selector token sent by the client.
    pub fn from_selector(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(raw);
        let token = text.trim();
        // A single ASCII digit; "+1" or "01" are not selectors
        let digit = match token.as_bytes() {
            [d] if d.is_ascii_digit() => d - b'0',
            _ => return Err(ProtocolError::InvalidSelector(token.to_string())),
        };
        match digit {
            protocol::SELECTOR_PAP => Ok(AuthProtocol::Pap),
            protocol::SELECTOR_CHAP => Ok(AuthProtocol::Chap),
            protocol::SELECTOR_SKEY => Ok(AuthProtocol::SKey),
            _ => Err(ProtocolError::InvalidSelector(token.to_string())),
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            AuthProtocol::Pap => protocol::SELECTOR_PAP,
            AuthProtocol::Chap => protocol::SELECTOR_CHAP,
            AuthProtocol::SKey => protocol::SELECTOR_SKEY,
        }
    }

    /// Run this scheme's exchange. Writes nothing after the last
    /// credential frame; the verdict is the negotiator's job.
    pub async fn authenticate<T>(
        self,
        session: &mut Session<T>,
        store: &dyn CredentialStore,
    ) -> Result<AuthResult, SessionError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match self {
            AuthProtocol::Pap => pap::authenticate(session, store).await,
            AuthProtocol::Chap => chap::authenticate(session, store).await,
            AuthProtocol::SKey => skey::authenticate(session, store).await,
        }
    }
}

impl fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthProtocol::Pap => write!(f, "pap"),
            AuthProtocol::Chap => write!(f, "chap"),
            AuthProtocol::SKey => write!(f, "skey"),
        }
    }
}

/// Why an authentication attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownUser,
    SecretMismatch,
    ResponseMismatch,
    OtpMismatch,
    ChainExhausted,
    StaleCounter,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthFailure::UnknownUser => "unknown user",
            AuthFailure::SecretMismatch => "secret mismatch",
            AuthFailure::ResponseMismatch => "challenge response mismatch",
            AuthFailure::OtpMismatch => "one-time password mismatch",
            AuthFailure::ChainExhausted => "one-time password chain exhausted",
            AuthFailure::StaleCounter => "stale one-time password counter",
        };
        f.write_str(s)
    }
}

impl From<OtpRejection> for AuthFailure {
    fn from(r: OtpRejection) -> Self {
        match r {
            OtpRejection::UnknownUser => AuthFailure::UnknownUser,
            OtpRejection::ChainExhausted => AuthFailure::ChainExhausted,
            OtpRejection::StaleCounter { .. } => AuthFailure::StaleCounter,
            OtpRejection::Mismatch => AuthFailure::OtpMismatch,
        }
    }
}

/// Verdict of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub success: bool,
    /// Claimed username; empty when the exchange never got that far.
    pub username: String,
    pub protocol: AuthProtocol,
    pub failure: Option<AuthFailure>,
}

impl AuthResult {
    pub fn success(protocol: AuthProtocol, username: impl Into<String>) -> Self {
        Self {
            success: true,
            username: username.into(),
            protocol,
            failure: None,
        }
    }

    pub fn failure(
        protocol: AuthProtocol,
        username: impl Into<String>,
        reason: AuthFailure,
    ) -> Self {
        Self {
            success: false,
            username: username.into(),
            protocol,
            failure: Some(reason),
        }
    }
}

/// Read the selector, run the matching scheme and report the verdict.
///
/// Exactly one of `AUTH_SUCCESS`, `AUTH_FAILED` or an error frame is written
/// unless the transport itself fails. Protocol errors are returned after
/// the error frame went out; the caller closes the connection.
pub async fn negotiate<T>(
    session: &mut Session<T>,
    store: &dyn CredentialStore,
) -> Result<AuthResult, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let selector = match session.read_frame().await {
        Ok(raw) => AuthProtocol::from_selector(&raw),
        Err(SessionError::Protocol(e)) => Err(ProtocolError::InvalidSelector(e.to_string())),
        Err(e) => {
            session.fail();
            return Err(e);
        }
    };

    let scheme = match selector {
        Ok(p) => p,
        Err(e) => {
            warn!(conn_id = %session.conn_id(), error = %e, "Invalid protocol selector rejected");
            session.try_write_text(&e.client_message()).await;
            session.fail();
            return Err(e.into());
        }
    };

    session.advance(SessionState::Authenticating)?;
    tracing::debug!(conn_id = %session.conn_id(), protocol = %scheme, "Protocol selected");

    let result = match scheme.authenticate(session, store).await {
        Ok(r) => r,
        Err(SessionError::Protocol(e)) => {
            warn!(conn_id = %session.conn_id(), protocol = %scheme, error = %e, "Malformed credential exchange rejected");
            session.try_write_text(&e.client_message()).await;
            session.fail();
            return Err(e.into());
        }
        Err(e) => {
            session.fail();
            return Err(e);
        }
    };

    if result.success {
        session.set_username(&result.username);
        session.advance(SessionState::AuthOk)?;
        info!(conn_id = %session.conn_id(), user = %result.username, protocol = %scheme, "Auth success");
        session.write_text(protocol::AUTH_SUCCESS).await?;
    } else {
        session.advance(SessionState::AuthFailed)?;
        let reason = result
            .failure
            .map(|f| f.to_string())
            .unwrap_or_default();
        warn!(conn_id = %session.conn_id(), user = %result.username, protocol = %scheme, reason = %reason, "Auth failed");
        session.write_text(protocol::AUTH_FAILED).await?;
    }

    Ok(result)
}
