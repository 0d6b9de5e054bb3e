use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};

use super::store::CredentialStore;
use super::{digest, AuthFailure, AuthProtocol, AuthResult, Digest};
use crate::error::SessionError;
use crate::protocol::{CHALLENGE_LEN, DIGEST_LEN};
use crate::session::Session;

pub type Challenge = [u8; CHALLENGE_LEN];

/// Fresh challenge from the OS CSPRNG. Never cached or reused.
pub fn generate_challenge() -> Challenge {
    let mut challenge = [0u8; CHALLENGE_LEN];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

/// `H(challenge ‖ secret)`
pub fn expected_response(challenge: &Challenge, secret: &[u8]) -> Digest {
    digest(&[&challenge[..], secret])
}

pub fn verify_response(challenge: &Challenge, secret: &[u8], response: &Digest) -> bool {
    let expected = expected_response(challenge, secret);
    expected[..].ct_eq(&response[..]).into()
}

/// CHAP: username frame, server challenge, fixed-length digest response.
///
/// Unknown users still get a challenge and have their response read, so
/// the exchange looks the same whether or not the account exists.
pub async fn authenticate<T>(
    session: &mut Session<T>,
    store: &dyn CredentialStore,
) -> Result<AuthResult, SessionError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let username = session.read_text().await?;

    let challenge = generate_challenge();
    tracing::trace!(conn_id = %session.conn_id(), user = %username, challenge = %hex::encode(challenge), "CHAP challenge issued");
    session.write_raw(&challenge).await?;

    let response: Digest = session.read_fixed::<DIGEST_LEN>().await?;

    let result = match store.lookup_secret(&username) {
        Some(secret) if verify_response(&challenge, &secret, &response) => {
            AuthResult::success(AuthProtocol::Chap, username)
        }
        Some(_) => {
            AuthResult::failure(AuthProtocol::Chap, username, AuthFailure::ResponseMismatch)
        }
        None => {
            let _ = verify_response(&challenge, &[], &response);
            AuthResult::failure(AuthProtocol::Chap, username, AuthFailure::UnknownUser)
        }
    };
    Ok(result)
}
