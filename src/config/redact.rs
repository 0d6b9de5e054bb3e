use crate::config::types::AppConfig;

/// Redact sensitive fields in a config for safe display.
/// Replaces shared secrets and S-Key checkpoints with "***".
pub fn redact_config(cfg: &AppConfig) -> AppConfig {
    let mut redacted = cfg.clone();

    for user in &mut redacted.users {
        if user.secret.is_some() {
            user.secret = Some("***".to_string());
        }
        if let Some(ref mut skey) = user.skey {
            skey.checkpoint = "***".to_string();
        }
    }

    redacted
}
