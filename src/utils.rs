/// Generate a compact correlation ID (8 hex characters) from the first 4 bytes of a UUID v4.
///
/// Short enough to scan in log lines; ~4 billion values keeps collisions
/// between concurrent connections unlikely.
pub fn generate_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// Format a byte count as a human-readable string (B, KB, MB, GB).
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Like [`format_bytes`], but 0 reads as "unlimited" (size caps).
pub fn format_limit(bytes: u64) -> String {
    if bytes == 0 {
        return "unlimited".to_string();
    }
    format_bytes(bytes)
}
