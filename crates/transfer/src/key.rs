//! Destination key derivation.

use chrono::Utc;
use uuid::Uuid;

/// Builds a destination key from the current UTC time in milliseconds, a
/// random suffix and the sanitized file name.
///
/// The random suffix keeps keys distinct when two files with the same name
/// start within the same millisecond.
pub fn timestamped_key(file_name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        sanitize_file_name(file_name)
    )
}

/// Reduces a file name to a single safe key segment.
///
/// Directory components are dropped and characters outside
/// `[A-Za-z0-9._-]` become `_`. Names that end up empty or made only of
/// dots become `file`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "file".into()
    } else {
        cleaned
    }
}
