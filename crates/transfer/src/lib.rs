//! Resumable file transfer with chunking and progress tracking.
//!
//! A [`TransferChannel`] uploads one file to a destination key, reporting
//! byte progress as [`TransferEvent`]s and finishing with a reference that
//! resolves to a public access URL. Two channels ship with the crate:
//! [`LocalDirChannel`] (a directory on disk) and [`HttpResumableChannel`]
//! (Firebase Storage resumable uploads).

mod channel;
mod chunked;
mod http;
mod key;
mod local;
mod progress;
mod types;
mod validation;

pub use channel::{CompletedRef, TransferChannel, TransferEvent, TransferEvents};
pub use chunked::{ChunkReader, ChunkWriter, checksum_bytes};
pub use http::{DEFAULT_FIREBASE_BASE_URL, HttpResumableChannel};
pub use key::{sanitize_file_name, timestamped_key};
pub use local::LocalDirChannel;
pub use progress::ProgressAggregator;
pub use types::{Chunk, FileDescriptor, UploadUnitState, detect_content_type};
pub use validation::validate_destination_key;

/// Default chunk size: 256 KiB.
///
/// Firebase Storage requires every non-final chunk of a resumable upload to
/// be a multiple of 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error {status}: {body}")]
    Storage { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid destination key: {0}")]
    InvalidKey(String),
}
