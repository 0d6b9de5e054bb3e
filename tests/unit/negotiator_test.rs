mod test_support;
use test_support::*;

use authdrop::auth::{negotiate, AuthProtocol};
use authdrop::error::{ProtocolError, SessionError};
use authdrop::protocol::{AUTH_FAILED, AUTH_SUCCESS, ERROR_INVALID_PROTOCOL};
use authdrop::session::SessionState;
use tokio::io::AsyncReadExt;

// ---------------------------------------------------------------------------
// Selector handling
// ---------------------------------------------------------------------------
#[tokio::test]
async fn invalid_selectors_get_error_frame() {
    for selector in ["9", "0", "4", "", "abc", "-1", "1.0", "12"] {
        let store = test_store(10);
        let (mut session, mut client) = session_pair(test_limits());
        send_text(&mut client, selector).await;

        let err = negotiate(&mut session, &store).await.unwrap_err();
        assert!(
            matches!(err, SessionError::Protocol(ProtocolError::InvalidSelector(_))),
            "selector {:?}: {:?}",
            selector,
            err
        );
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(recv_text(&mut client).await, ERROR_INVALID_PROTOCOL);
    }
}

#[tokio::test]
async fn selector_whitespace_is_trimmed() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, " 1\n").await;
    send_text(&mut client, ADMIN).await;
    send_text(&mut client, ADMIN_SECRET).await;

    let result = negotiate(&mut session, &store).await.unwrap();
    assert_eq!(result.protocol, AuthProtocol::Pap);
    assert!(result.success);
}

#[tokio::test]
async fn invalid_selector_reads_nothing_else() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, "9").await;
    send_text(&mut client, ADMIN).await;

    assert!(negotiate(&mut session, &store).await.is_err());
    assert!(session.username().is_none());

    // Only the error frame comes back, then EOF once the session closes
    assert_eq!(recv_text(&mut client).await, ERROR_INVALID_PROTOCOL);
    drop(session);
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn oversized_selector_is_invalid_protocol() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_raw(&mut client, &(60_000u16).to_be_bytes()).await;

    let err = negotiate(&mut session, &store).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Protocol(ProtocolError::InvalidSelector(_))
    ));
    assert_eq!(recv_text(&mut client).await, ERROR_INVALID_PROTOCOL);
}

// ---------------------------------------------------------------------------
// Verdict frames and state
// ---------------------------------------------------------------------------
#[tokio::test]
async fn success_writes_auth_success_and_sets_user() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, "1").await;
    send_text(&mut client, ADMIN).await;
    send_text(&mut client, ADMIN_SECRET).await;

    let result = negotiate(&mut session, &store).await.unwrap();
    assert!(result.success);
    assert_eq!(session.state(), SessionState::AuthOk);
    assert_eq!(session.username(), Some(ADMIN));
    assert_eq!(recv_text(&mut client).await, AUTH_SUCCESS);
}

#[tokio::test]
async fn failure_writes_auth_failed() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, "1").await;
    send_text(&mut client, ADMIN).await;
    send_text(&mut client, "nope").await;

    let result = negotiate(&mut session, &store).await.unwrap();
    assert!(!result.success);
    assert_eq!(session.state(), SessionState::AuthFailed);
    assert!(session.username().is_none());
    assert_eq!(recv_text(&mut client).await, AUTH_FAILED);
}

#[tokio::test]
async fn skey_through_negotiator() {
    let store = std::sync::Arc::new(test_store(4));
    let (mut session, mut client) = session_pair(test_limits());
    let s = store.clone();
    let server = tokio::spawn(async move {
        let result = negotiate(&mut session, s.as_ref()).await.unwrap();
        (result, session.state())
    });

    send_text(&mut client, "3").await;
    send_text(&mut client, OTP_USER).await;
    assert_eq!(recv_text(&mut client).await, "4");
    send_raw(&mut client, &otp(4)).await;
    assert_eq!(recv_text(&mut client).await, AUTH_SUCCESS);

    let (result, state) = server.await.unwrap();
    assert!(result.success);
    assert_eq!(result.protocol, AuthProtocol::SKey);
    assert_eq!(state, SessionState::AuthOk);
}

#[tokio::test]
async fn malformed_username_gets_error_frame() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, "2").await;
    send_bytes(&mut client, &[0xc3, 0x28]).await;

    let err = negotiate(&mut session, &store).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Protocol(ProtocolError::MalformedFrame(_))
    ));
    assert_eq!(session.state(), SessionState::Errored);
    assert_eq!(recv_text(&mut client).await, "ERROR: Malformed frame");
}

#[tokio::test]
async fn peer_closing_mid_exchange_is_connection_error() {
    let store = test_store(10);
    let (mut session, mut client) = session_pair(test_limits());
    send_text(&mut client, "1").await;
    send_text(&mut client, ADMIN).await;
    drop(client);

    let err = negotiate(&mut session, &store).await.unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(session.state(), SessionState::Errored);
}
