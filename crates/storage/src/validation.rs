use std::path::{Component, Path};

use crate::StorageError;

/// Validates that a chunk name is a single plain file name.
///
/// Rejects:
/// - Empty names
/// - Path separators (`/`, `\`) and NUL bytes
/// - `.` and `..`
/// - Anything that does not parse as exactly one normal path component
pub fn validate_chunk_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("empty name".into()));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidName(format!(
            "separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_chunk_name("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_chunk_name("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_chunk_name(".").is_err());
    }

    #[test]
    fn rejects_nested_path() {
        assert!(validate_chunk_name("sub/c1").is_err());
        assert!(validate_chunk_name("../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(validate_chunk_name("/tmp/c1").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(validate_chunk_name("a\\b").is_err());
    }

    #[test]
    fn rejects_nul() {
        assert!(validate_chunk_name("c\01").is_err());
    }

    #[test]
    fn accepts_plain_names() {
        assert!(validate_chunk_name("c1").is_ok());
        assert!(validate_chunk_name("part-0007").is_ok());
        assert!(validate_chunk_name(".hidden").is_ok());
        assert!(validate_chunk_name("chunk.v2").is_ok());
    }
}
