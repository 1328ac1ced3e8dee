//! Limits applied while reading document headers: archive size, entry size, path traversal.

use std::path::Path;

use crate::error::SecurityError;

#[derive(Debug, Clone)]
pub struct ReadLimits {
    /// Maximum number of files allowed in an archive.
    pub max_file_count: u64,
    /// Maximum size of a metadata entry (OPF, container.xml) in bytes.
    pub max_entry_size_bytes: u64,
    /// Maximum size of a file read fully into memory (MOBI headers).
    pub max_file_size_bytes: u64,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_file_count: 10_000,
            max_entry_size_bytes: 4 * 1024 * 1024,   // 4 MB
            max_file_size_bytes: 256 * 1024 * 1024,  // 256 MB
        }
    }
}

/// Reject archive entry paths that are absolute or contain `..` components.
pub fn check_path_traversal(entry_path: &str) -> Result<(), SecurityError> {
    let is_absolute = entry_path.starts_with('/')
        || entry_path.starts_with('\\')
        || (entry_path.len() >= 2 && entry_path.as_bytes()[1] == b':');

    let has_parent = Path::new(entry_path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));

    if is_absolute || has_parent {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }
    Ok(())
}

pub fn check_file_count(count: u64, limits: &ReadLimits) -> Result<(), SecurityError> {
    if count > limits.max_file_count {
        return Err(SecurityError::TooManyFiles {
            count,
            limit: limits.max_file_count,
        });
    }
    Ok(())
}

pub fn check_resource_size(name: &str, size_bytes: u64, limit_bytes: u64) -> Result<(), SecurityError> {
    if size_bytes > limit_bytes {
        return Err(SecurityError::OversizedResource {
            name: name.to_string(),
            size_kb: size_bytes / 1024,
            limit_kb: limit_bytes / 1024,
        });
    }
    Ok(())
}
