use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a destination key stays inside its storage root.
///
/// Rejects:
/// - Empty keys
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_destination_key(key: &str) -> Result<(), TransferError> {
    if key.is_empty() {
        return Err(TransferError::InvalidKey("empty key".into()));
    }

    let path = Path::new(key);
    if path.is_absolute() {
        return Err(TransferError::InvalidKey(format!(
            "absolute path not allowed: {key}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidKey(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidKey(format!(
                    "absolute path not allowed: {key}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        assert!(validate_destination_key("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_destination_key("../../../etc/passwd").is_err());
        assert!(validate_destination_key("sub/../../escape").is_err());
        assert!(validate_destination_key("..").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_destination_key("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_timestamped_key() {
        assert!(validate_destination_key("1700000000000-a1b2c3d4-beach.jpg").is_ok());
    }

    #[test]
    fn accepts_prefixed_key() {
        assert!(validate_destination_key("packages/1700000000000-beach.jpg").is_ok());
    }
}
