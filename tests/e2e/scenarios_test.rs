#[allow(dead_code, unused_imports)]
mod helpers;
use helpers::*;

use authdrop::auth::chap::{self, Challenge};
use authdrop::auth::store::CredentialStore;
use authdrop::client::{self, AuthVerdict, Credentials, FileReply};
use authdrop::handler;
use authdrop::session::SessionState;
use authdrop::transfer::TransferStatus;
use authdrop::protocol::frame;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Scenario A: PAP login, then a 13-byte file
// ---------------------------------------------------------------------------
#[tokio::test]
async fn scenario_a_pap_then_file() {
    let server = start_server(test_config(10)).await;
    let mut stream = connect(server.addr).await;

    send_text(&mut stream, "1").await;
    send_text(&mut stream, "admin").await;
    send_text(&mut stream, "password123").await;
    assert_eq!(recv_text(&mut stream).await, "AUTH_SUCCESS");

    send_text(&mut stream, "FILENAME:notes.txt").await;
    send_text(&mut stream, "FILESIZE:13").await;
    assert_eq!(recv_text(&mut stream).await, "READY");
    frame::write_raw(&mut stream, b"Hello, World!").await.unwrap();

    let reply = recv_text(&mut stream).await;
    assert!(reply.starts_with("FILE_RECEIVED"), "{}", reply);
    assert_eq!(reply, "FILE_RECEIVED: notes.txt (13 bytes)");

    // Server closes after the single file
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    assert_eq!(
        std::fs::read(server.received("notes.txt")).unwrap(),
        b"Hello, World!"
    );
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Scenario B: bad selector, error frame, connection closed
// ---------------------------------------------------------------------------
#[tokio::test]
async fn scenario_b_invalid_selector() {
    let server = start_server(test_config(10)).await;
    let mut stream = connect(server.addr).await;

    send_text(&mut stream, "9").await;
    assert_eq!(recv_text(&mut stream).await, "ERROR: Invalid protocol");

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "no frames after the error");

    // No authentication attempted: the S-Key chain is untouched
    assert_eq!(
        server.ctx.credentials.lookup_otp_state("carol").unwrap().counter,
        10
    );
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Scenario C: exhausted S-Key chain stays at zero
// ---------------------------------------------------------------------------
#[tokio::test]
async fn scenario_c_exhausted_chain() {
    let server = start_server(test_config(0)).await;

    for _ in 0..2 {
        let mut stream = connect(server.addr).await;
        send_text(&mut stream, "3").await;
        send_text(&mut stream, "carol").await;
        assert_eq!(recv_text(&mut stream).await, "0");
        frame::write_raw(&mut stream, &[0u8; 16]).await.unwrap();
        assert_eq!(recv_text(&mut stream).await, "AUTH_FAILED");
    }

    assert_eq!(
        server.ctx.credentials.lookup_otp_state("carol").unwrap().counter,
        0
    );
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Scenario D: CHAP wrong secret; retry gets a fresh challenge
// ---------------------------------------------------------------------------
#[tokio::test]
async fn scenario_d_chap_wrong_secret_fresh_challenge() {
    let server = start_server(test_config(10)).await;
    let mut challenges: Vec<Challenge> = Vec::new();

    for secret in [&b"wrong-secret"[..], &b"password123"[..]] {
        let mut stream = connect(server.addr).await;
        send_text(&mut stream, "2").await;
        send_text(&mut stream, "admin").await;
        let challenge: Challenge = frame::read_fixed(&mut stream).await.unwrap();
        let response = chap::expected_response(&challenge, secret);
        frame::write_raw(&mut stream, &response).await.unwrap();
        let verdict = recv_text(&mut stream).await;
        if secret == b"password123" {
            assert_eq!(verdict, "AUTH_SUCCESS");
        } else {
            assert_eq!(verdict, "AUTH_FAILED");
        }
        challenges.push(challenge);
    }

    assert_ne!(challenges[0], challenges[1]);
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Client adapter against the real server, all three schemes
// ---------------------------------------------------------------------------
#[tokio::test]
async fn client_adapter_all_schemes() {
    let server = start_server(test_config(5)).await;
    let addr = server.addr.to_string();
    let timeout = Duration::from_secs(5);

    let cases = [
        (
            Credentials::Pap {
                username: "admin".into(),
                secret: "password123".into(),
            },
            "pap.txt",
        ),
        (
            Credentials::Chap {
                username: "admin".into(),
                secret: "password123".into(),
            },
            "chap.txt",
        ),
        (
            Credentials::SKey {
                username: "carol".into(),
                seed: OTP_SEED.into(),
                secret: OTP_SECRET.into(),
            },
            "skey.txt",
        ),
    ];

    for (creds, name) in cases.iter() {
        let (verdict, reply) =
            client::connect_and_send(&addr, creds, name, name.as_bytes(), timeout)
                .await
                .unwrap();
        assert_eq!(verdict, AuthVerdict::Success, "{:?}", creds);
        assert!(matches!(reply, Some(FileReply::Received(_))));
        assert_eq!(std::fs::read(server.received(name)).unwrap(), name.as_bytes());
    }

    assert_eq!(
        server.ctx.credentials.lookup_otp_state("carol").unwrap().counter,
        4
    );
    server.stop().await;
}

#[tokio::test]
async fn client_adapter_reports_failure() {
    let server = start_server(test_config(5)).await;
    let creds = Credentials::Chap {
        username: "admin".into(),
        secret: "nope".into(),
    };
    let (verdict, reply) = client::connect_and_send(
        &server.addr.to_string(),
        &creds,
        "x.txt",
        b"x",
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert_eq!(verdict, AuthVerdict::Failed);
    assert!(reply.is_none());
    assert!(!server.received("x.txt").exists());
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Peer drops mid-body: partial file stays, server keeps serving
// ---------------------------------------------------------------------------
#[tokio::test]
async fn dropped_connection_mid_transfer_is_isolated() {
    let server = start_server(test_config(10)).await;
    {
        let mut stream = connect(server.addr).await;
        send_text(&mut stream, "1").await;
        send_text(&mut stream, "admin").await;
        send_text(&mut stream, "password123").await;
        assert_eq!(recv_text(&mut stream).await, "AUTH_SUCCESS");
        send_text(&mut stream, "FILENAME:partial.bin").await;
        send_text(&mut stream, "FILESIZE:1000").await;
        assert_eq!(recv_text(&mut stream).await, "READY");
        frame::write_raw(&mut stream, &[1u8; 100]).await.unwrap();
    }

    // Give the worker a moment to notice the close
    tokio::time::sleep(Duration::from_millis(200)).await;
    let partial = std::fs::read(server.received("partial.bin")).unwrap();
    assert_eq!(partial.len(), 100);

    let creds = Credentials::Pap {
        username: "admin".into(),
        secret: "password123".into(),
    };
    let (verdict, _) = client::connect_and_send(
        &server.addr.to_string(),
        &creds,
        "after.txt",
        b"still alive",
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert_eq!(verdict, AuthVerdict::Success);
    server.stop().await;
}

/// Log in as admin and start a `declared`-byte upload, sending `sent` bytes.
async fn start_upload(stream: &mut TcpStream, name: &str, declared: u64, sent: usize) {
    send_text(stream, "1").await;
    send_text(stream, "admin").await;
    send_text(stream, "password123").await;
    assert_eq!(recv_text(stream).await, "AUTH_SUCCESS");
    send_text(stream, &format!("FILENAME:{}", name)).await;
    send_text(stream, &format!("FILESIZE:{}", declared)).await;
    assert_eq!(recv_text(stream).await, "READY");
    frame::write_raw(stream, &vec![1u8; sent]).await.unwrap();
}

/// Accept one connection on a private listener and run it through the
/// handler against the test server's context.
async fn accept_one(
    server: &TestServer,
) -> (
    std::net::SocketAddr,
    tokio::task::JoinHandle<handler::ConnectionReport>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = server.ctx.clone();
    let worker = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        handler::run_session(stream, "e2e00001".into(), &ctx).await
    });
    (addr, worker)
}

#[tokio::test]
async fn peer_close_mid_body_reports_incomplete() {
    let server = start_server(test_config(10)).await;
    let (addr, worker) = accept_one(&server).await;

    let mut stream = connect(addr).await;
    start_upload(&mut stream, "closed.bin", 1000, 100).await;
    drop(stream);

    let report = worker.await.unwrap();
    let transfer = report.transfer.expect("transfer outcome");
    assert_eq!(transfer.status, TransferStatus::Incomplete);
    assert_eq!(transfer.bytes_received(), 100);
    assert_eq!(report.state, SessionState::Errored);
    server.stop().await;
}

#[tokio::test]
#[allow(deprecated)]
async fn peer_reset_mid_body_reports_incomplete() {
    let server = start_server(test_config(10)).await;
    let (addr, worker) = accept_one(&server).await;

    let mut stream = connect(addr).await;
    start_upload(&mut stream, "reset.bin", 1000, 100).await;
    // Zero linger turns the close into an RST
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(stream);

    let report = worker.await.unwrap();
    let transfer = report.transfer.expect("transfer outcome");
    assert_eq!(transfer.status, TransferStatus::Incomplete);
    assert!(transfer.bytes_received() < 1000);
    assert!(transfer.error.is_none());
    server.stop().await;
}
