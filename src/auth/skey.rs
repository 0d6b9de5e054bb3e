//! S-Key one-time passwords.
//!
//! `otp(n) = H^n(seed ‖ secret)`. The server never holds the secret: it
//! keeps the last accepted password as a checkpoint and accepts the next
//! one iff hashing it once yields the checkpoint. A user provisioned with
//! counter `N` starts with checkpoint `otp(N + 1)`; when the server
//! announces counter `c` the client answers with `otp(c)`.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use super::store::CredentialStore;
use super::{digest, AuthFailure, AuthProtocol, AuthResult, Digest};
use crate::error::SessionError;
use crate::protocol::DIGEST_LEN;
use crate::session::Session;

/// Counter announced to unknown users to keep the exchange well-formed.
pub const UNKNOWN_USER_COUNTER: u64 = 0;

/// One step down the chain: `H(otp)`.
pub fn chain_step(otp: &Digest) -> Digest {
    digest(&[&otp[..]])
}

/// `H^n(seed ‖ secret)` for `n >= 1`. Position 0 is the raw seed and
/// secret, which is never a valid password, so `None` is returned.
pub fn one_time_password(seed: &[u8], secret: &[u8], n: u64) -> Option<Digest> {
    if n == 0 {
        return None;
    }
    let mut current = digest(&[seed, secret]);
    for _ in 1..n {
        current = chain_step(&current);
    }
    Some(current)
}

/// Checkpoint to provision for a fresh chain of `counter` logins.
pub fn initial_checkpoint(seed: &[u8], secret: &[u8], counter: u64) -> Digest {
    let mut current = digest(&[seed, secret]);
    for _ in 0..counter {
        current = chain_step(&current);
    }
    current
}

/// S-Key: username frame, decimal counter from the server, fixed-length
/// OTP response. The counter is decremented only after the OTP verifies.
pub async fn authenticate<T>(
    session: &mut Session<T>,
    store: &dyn CredentialStore,
) -> Result<AuthResult, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let username = session.read_text().await?;

    let announced = store.lookup_otp_state(&username).map(|state| state.counter);
    let counter = announced.unwrap_or(UNKNOWN_USER_COUNTER);
    session.write_text(&counter.to_string()).await?;
    tracing::debug!(conn_id = %session.conn_id(), user = %username, counter = counter, "S-Key counter announced");

    let otp: Digest = session.read_fixed::<DIGEST_LEN>().await?;

    let Some(counter) = announced else {
        return Ok(AuthResult::failure(
            AuthProtocol::SKey,
            username,
            AuthFailure::UnknownUser,
        ));
    };

    let result = match store.commit_otp_advance(&username, counter, &otp) {
        Ok(remaining) => {
            info!(conn_id = %session.conn_id(), user = %username, remaining = remaining, "S-Key chain advanced");
            AuthResult::success(AuthProtocol::SKey, username)
        }
        Err(rejection) => {
            tracing::debug!(conn_id = %session.conn_id(), user = %username, rejection = ?rejection, "S-Key advance refused");
            AuthResult::failure(AuthProtocol::SKey, username, rejection.into())
        }
    };
    Ok(result)
}
