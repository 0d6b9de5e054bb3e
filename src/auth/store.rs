use std::collections::HashMap;

use anyhow::{Context, Result};
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{skey, Digest};
use crate::config::types::UserConfig;
use crate::protocol::DIGEST_LEN;

/// S-Key chain position for one user.
///
/// `checkpoint` is the last accepted one-time password, or the provisioned
/// `otp(counter + 1)` before the first login.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpChainState {
    pub seed: String,
    pub counter: u64,
    pub checkpoint: Digest,
}

impl std::fmt::Debug for OtpChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpChainState")
            .field("seed", &self.seed)
            .field("counter", &self.counter)
            .field("checkpoint", &"***")
            .finish()
    }
}

/// Why an OTP advance was refused. None of these touch the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    UnknownUser,
    ChainExhausted,
    /// Another login advanced the chain after the counter was announced.
    StaleCounter { announced: u64, current: u64 },
    Mismatch,
}

/// Credential lookup consumed by the protocol variants.
pub trait CredentialStore: Send + Sync {
    /// Shared secret for PAP and CHAP.
    fn lookup_secret(&self, username: &str) -> Option<Zeroizing<Vec<u8>>>;

    /// Current S-Key chain state.
    fn lookup_otp_state(&self, username: &str) -> Option<OtpChainState>;

    /// Verify `otp` against the checkpoint and, if it matches, store it as
    /// the new checkpoint and decrement the counter. The check and the
    /// update form one critical section per user. Returns the new counter.
    fn commit_otp_advance(
        &self,
        username: &str,
        announced_counter: u64,
        otp: &Digest,
    ) -> Result<u64, OtpRejection>;
}

/// In-memory store built from configuration.
///
/// Shared secrets are read-only after construction. OTP chains live in a
/// `DashMap`, whose per-shard write guard makes read-verify-decrement
/// atomic for a given username.
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: HashMap<String, Zeroizing<Vec<u8>>>,
    chains: DashMap<String, OtpChainState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, username: &str, secret: impl AsRef<[u8]>) -> Self {
        self.secrets.insert(
            username.to_string(),
            Zeroizing::new(secret.as_ref().to_vec()),
        );
        self
    }

    pub fn with_otp_chain(self, username: &str, state: OtpChainState) -> Self {
        self.chains.insert(username.to_string(), state);
        self
    }

    pub fn from_config(users: &[UserConfig]) -> Result<Self> {
        let mut store = Self::new();
        for user in users {
            if let Some(ref secret) = user.secret {
                store = store.with_secret(&user.username, secret.as_bytes());
            }
            if let Some(ref chain) = user.skey {
                let checkpoint = decode_checkpoint(&chain.checkpoint)
                    .with_context(|| format!("user '{}': S-Key checkpoint", user.username))?;
                store = store.with_otp_chain(
                    &user.username,
                    OtpChainState {
                        seed: chain.seed.clone(),
                        counter: chain.counter,
                        checkpoint,
                    },
                );
            }
        }
        tracing::debug!(
            secrets = store.secrets.len(),
            chains = store.chains.len(),
            "Credential store loaded"
        );
        Ok(store)
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup_secret(&self, username: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.secrets.get(username).cloned()
    }

    fn lookup_otp_state(&self, username: &str) -> Option<OtpChainState> {
        self.chains.get(username).map(|entry| entry.value().clone())
    }

    fn commit_otp_advance(
        &self,
        username: &str,
        announced_counter: u64,
        otp: &Digest,
    ) -> Result<u64, OtpRejection> {
        let mut entry = self
            .chains
            .get_mut(username)
            .ok_or(OtpRejection::UnknownUser)?;

        if entry.counter == 0 {
            return Err(OtpRejection::ChainExhausted);
        }
        if entry.counter != announced_counter {
            return Err(OtpRejection::StaleCounter {
                announced: announced_counter,
                current: entry.counter,
            });
        }
        let next = skey::chain_step(otp);
        if !bool::from(next[..].ct_eq(&entry.checkpoint[..])) {
            return Err(OtpRejection::Mismatch);
        }

        entry.checkpoint = *otp;
        entry.counter -= 1;
        Ok(entry.counter)
    }
}

/// Decode a hex-encoded digest from configuration.
pub fn decode_checkpoint(hex_str: &str) -> Result<Digest> {
    let bytes = hex::decode(hex_str.trim()).context("checkpoint is not valid hex")?;
    if bytes.len() != DIGEST_LEN {
        anyhow::bail!(
            "checkpoint must be {} bytes ({} hex chars), got {} bytes",
            DIGEST_LEN,
            DIGEST_LEN * 2,
            bytes.len()
        );
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}
