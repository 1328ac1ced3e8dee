//! Progress reporting for folder scans.

use std::path::PathBuf;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Inserted,
    Duplicate,
    Failed,
}

/// Emitted once per attempted file, after its result has been stored.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub current: u64,
    pub total: u64,
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Trait for receiving progress updates. Implement this to drive a progress
/// bar or a status line.
pub trait ProgressHandler: Send {
    fn on_progress(&self, event: ProgressEvent);
}

/// Helper to emit a progress event if a handler is provided.
pub fn emit_progress(
    handler: Option<&dyn ProgressHandler>,
    current: u64,
    total: u64,
    path: &std::path::Path,
    status: FileStatus,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            current,
            total,
            path: path.to_path_buf(),
            status,
        });
    }
}
