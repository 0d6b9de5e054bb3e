use crate::auth::store::{CredentialStore, MemoryCredentialStore};
use crate::config::types::AppConfig;
use crate::session::SessionLimits;
use crate::transfer::sink::UploadDir;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

/// Shared, read-only state handed to every connection worker.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub credentials: Arc<dyn CredentialStore>,
    pub upload_dir: UploadDir,
    pub limits: SessionLimits,
    pub start_time: Instant,
}

impl AppContext {
    /// Build the context from configuration, using the in-memory store.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = MemoryCredentialStore::from_config(&config.users)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build the context around an externally supplied credential store.
    pub fn with_store(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let upload_dir = UploadDir::new(config.server.upload_dir.clone());
        let limits = SessionLimits::from(&config.limits);
        Self {
            config: Arc::new(config),
            credentials,
            upload_dir,
            limits,
            start_time: Instant::now(),
        }
    }
}
