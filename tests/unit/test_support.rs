//! Shared test utilities for unit tests.
//!
//! Usage: add `mod test_support;` at the top of your unit test file.

#![allow(dead_code)]

use authdrop::auth::skey;
use authdrop::auth::store::{MemoryCredentialStore, OtpChainState};
use authdrop::protocol::{frame, DEFAULT_MAX_FRAME_LEN};
use authdrop::session::{Session, SessionLimits};
use std::time::Duration;
use tokio::io::{duplex, DuplexStream};

pub const ADMIN: &str = "admin";
pub const ADMIN_SECRET: &str = "password123";
pub const OTP_USER: &str = "carol";
pub const OTP_SEED: &str = "salt123";
pub const OTP_SECRET: &str = "hunter2";

/// Limits with short timeouts so stalled tests fail fast.
pub fn test_limits() -> SessionLimits {
    SessionLimits {
        control_timeout: Duration::from_secs(5),
        chunk_timeout: Duration::from_secs(2),
        ..SessionLimits::default()
    }
}

pub fn otp_chain(counter: u64) -> OtpChainState {
    OtpChainState {
        seed: OTP_SEED.to_string(),
        counter,
        checkpoint: skey::initial_checkpoint(OTP_SEED.as_bytes(), OTP_SECRET.as_bytes(), counter),
    }
}

/// `admin`/`password123` for PAP/CHAP plus `carol` with an S-Key chain.
pub fn test_store(otp_counter: u64) -> MemoryCredentialStore {
    MemoryCredentialStore::new()
        .with_secret(ADMIN, ADMIN_SECRET)
        .with_otp_chain(OTP_USER, otp_chain(otp_counter))
}

/// Server-side session over an in-memory pipe, plus the client end.
pub fn session_pair(limits: SessionLimits) -> (Session<DuplexStream>, DuplexStream) {
    let (client, server) = duplex(64 * 1024);
    (Session::new(server, "test0001", limits), client)
}

pub async fn send_text(client: &mut DuplexStream, text: &str) {
    frame::write_text_frame(client, text).await.unwrap();
}

pub async fn send_bytes(client: &mut DuplexStream, bytes: &[u8]) {
    frame::write_frame(client, bytes).await.unwrap();
}

pub async fn send_raw(client: &mut DuplexStream, bytes: &[u8]) {
    frame::write_raw(client, bytes).await.unwrap();
}

pub async fn recv_text(client: &mut DuplexStream) -> String {
    frame::read_text_frame(client, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap()
}

pub fn otp(n: u64) -> [u8; 16] {
    skey::one_time_password(OTP_SEED.as_bytes(), OTP_SECRET.as_bytes(), n).unwrap()
}
