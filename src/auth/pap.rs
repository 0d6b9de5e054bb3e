use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use zeroize::Zeroizing;

use super::store::CredentialStore;
use super::{AuthFailure, AuthProtocol, AuthResult};
use crate::error::SessionError;
use crate::session::Session;

/// Compared against when the user is unknown so the work done does not
/// depend on whether the account exists.
const DUMMY_SECRET: &[u8] = b"\0dummy-secret-for-unknown-users\0";

/// Byte-exact secret comparison. No normalization of case, whitespace or
/// encoding.
pub fn verify_secret(stored: &[u8], presented: &[u8]) -> bool {
    stored.ct_eq(presented).into()
}

/// PAP: username frame, then secret frame, both in the clear.
pub async fn authenticate<T>(
    session: &mut Session<T>,
    store: &dyn CredentialStore,
) -> Result<AuthResult, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let username = session.read_text().await?;
    let secret = Zeroizing::new(session.read_frame().await?);
    tracing::debug!(conn_id = %session.conn_id(), user = %username, "PAP credentials received");

    let result = match store.lookup_secret(&username) {
        Some(stored) if verify_secret(&stored, &secret) => {
            AuthResult::success(AuthProtocol::Pap, username)
        }
        Some(_) => AuthResult::failure(AuthProtocol::Pap, username, AuthFailure::SecretMismatch),
        None => {
            let _ = verify_secret(DUMMY_SECRET, &secret);
            AuthResult::failure(AuthProtocol::Pap, username, AuthFailure::UnknownUser)
        }
    };
    Ok(result)
}
