#[allow(dead_code, unused_imports)]
mod helpers;
use helpers::*;

use authdrop::protocol::frame;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_silent_client_is_closed_after_control_timeout() {
    let mut config = test_config(10);
    config.limits.control_timeout = 1;
    let server = start_server(config).await;

    let mut stream = connect(server.addr).await;
    let start = Instant::now();
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server should close the idle connection");
    assert!(start.elapsed() >= Duration::from_millis(900));
    assert!(buf.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_stalled_body_reports_failure() {
    let mut config = test_config(10);
    config.limits.chunk_timeout = 1;
    let server = start_server(config).await;

    let mut stream = connect(server.addr).await;
    send_text(&mut stream, "1").await;
    send_text(&mut stream, "admin").await;
    send_text(&mut stream, "password123").await;
    assert_eq!(recv_text(&mut stream).await, "AUTH_SUCCESS");
    send_text(&mut stream, "FILENAME:stall.bin").await;
    send_text(&mut stream, "FILESIZE:64").await;
    assert_eq!(recv_text(&mut stream).await, "READY");
    frame::write_raw(&mut stream, &[7u8; 10]).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), recv_text(&mut stream))
        .await
        .expect("server should give up on the stalled body");
    assert!(
        reply.starts_with("ERROR") || reply.starts_with("FILE_INCOMPLETE"),
        "{}",
        reply
    );
    assert_eq!(std::fs::read(server.received("stall.bin")).unwrap().len(), 10);
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_transfer() {
    let server = start_server(test_config(10)).await;

    let mut stream = connect(server.addr).await;
    send_text(&mut stream, "1").await;
    send_text(&mut stream, "admin").await;
    send_text(&mut stream, "password123").await;
    assert_eq!(recv_text(&mut stream).await, "AUTH_SUCCESS");
    send_text(&mut stream, "FILENAME:late.txt").await;
    send_text(&mut stream, "FILESIZE:4").await;
    assert_eq!(recv_text(&mut stream).await, "READY");

    server.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!server.task.is_finished(), "drain should wait for the worker");

    frame::write_raw(&mut stream, b"done").await.unwrap();
    assert_eq!(recv_text(&mut stream).await, "FILE_RECEIVED: late.txt (4 bytes)");

    let received = server.received("late.txt");
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .expect("server should stop after the drain")
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read(received).unwrap(), b"done");
}

#[tokio::test]
async fn test_shutdown_refuses_new_connections() {
    let server = start_server(test_config(10)).await;
    let addr = server.addr;
    server.stop().await;

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
