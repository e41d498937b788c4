use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use packdesk_protocol::{UploadProgress, UploadStatus};

use crate::TransferError;

/// A chunk of file data for transfer.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Size of this chunk in bytes.
    pub size: usize,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// Destination key the chunk belongs to.
    pub key: String,
    /// SHA-256 hex checksum of `data` (empty means no verification).
    pub checksum: String,
}

/// A locally selected file, ready to be uploaded.
///
/// Cloning is cheap: the content is shared and never mutated.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    name: String,
    content: Arc<[u8]>,
}

impl FileDescriptor {
    /// Wraps in-memory content under the given file name.
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads a file from disk. The descriptor's name is the path's file name.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, content))
    }

    /// Original file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the content in bytes.
    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Shared handle to the content.
    pub fn content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    /// MIME type guessed from the file extension.
    pub fn content_type(&self) -> &'static str {
        detect_content_type(&self.name).unwrap_or("application/octet-stream")
    }
}

/// Detects the image content type from a file extension.
pub fn detect_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        Some("avif") => Some("image/avif"),
        Some("svg") => Some("image/svg+xml"),
        _ => None,
    }
}

/// State of one file's upload within a batch.
///
/// Owned by the unit driving the upload; only that unit mutates it.
#[derive(Debug)]
pub struct UploadUnitState {
    descriptor: FileDescriptor,
    destination_key: String,
    status: UploadStatus,
    bytes_transferred: u64,
    total_bytes: u64,
    result_url: Option<String>,
    failure_reason: Option<String>,
    started_at: Option<Instant>,
    completed_at: Option<Instant>,
}

impl UploadUnitState {
    /// Creates a pending unit for `descriptor`.
    pub fn new(descriptor: FileDescriptor, destination_key: String) -> Self {
        let total_bytes = descriptor.byte_size();
        Self {
            descriptor,
            destination_key,
            status: UploadStatus::Pending,
            bytes_transferred: 0,
            total_bytes,
            result_url: None,
            failure_reason: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Marks the unit as in progress.
    pub fn start(&mut self) {
        self.status = UploadStatus::InProgress;
        self.started_at = Some(Instant::now());
    }

    /// Records a channel progress report and returns the new percentage.
    ///
    /// The channel's total wins over the descriptor size when they differ,
    /// but never drops below bytes already confirmed. Transferred bytes are
    /// clamped to the total and never move backwards.
    pub fn record_progress(&mut self, bytes_transferred: u64, total_bytes: u64) -> u8 {
        if self.status.is_terminal() {
            return self.percent();
        }
        if total_bytes > 0 {
            self.total_bytes = total_bytes.max(self.bytes_transferred);
        }
        let clamped = bytes_transferred.min(self.total_bytes);
        self.bytes_transferred = self.bytes_transferred.max(clamped);
        self.percent()
    }

    /// Marks the unit as succeeded with its access URL.
    pub fn succeed(&mut self, url: String) {
        self.status = UploadStatus::Succeeded;
        self.bytes_transferred = self.total_bytes;
        self.result_url = Some(url);
        self.completed_at = Some(Instant::now());
    }

    /// Marks the unit as failed.
    pub fn fail(&mut self, reason: &str) {
        self.status = UploadStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.completed_at = Some(Instant::now());
    }

    /// Marks the unit as cancelled.
    pub fn cancel(&mut self) {
        self.status = UploadStatus::Cancelled;
        self.completed_at = Some(Instant::now());
    }

    /// Floored completion percentage.
    pub fn percent(&self) -> u8 {
        self.progress().percentage()
    }

    /// Returns current progress as a protocol struct.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            destination_key: self.destination_key.clone(),
            file_name: self.descriptor.name().to_string(),
            status: self.status,
            total_bytes: self.total_bytes,
            transferred_bytes: self.bytes_transferred,
            error: self.failure_reason.clone().unwrap_or_default(),
        }
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    pub fn destination_key(&self) -> &str {
        &self.destination_key
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Time from start to completion, if both happened.
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}
