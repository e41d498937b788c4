//! Batch image upload for package records.
//!
//! This crate implements the **business logic** for uploading a batch of
//! locally selected images. It has no storage dependency of its own: callers
//! hand it a [`TransferChannel`](packdesk_transfer::TransferChannel) that
//! performs the actual resumable transfers.
//!
//! # Pipeline
//!
//! 1. **Admit**: reject empty or oversized batches and oversized files
//!    before anything is sent
//! 2. **Fan out**: run one [`UploadUnit`] per file, interleaved on the
//!    caller's task
//! 3. **Aggregate**: fold per-unit percentages into one monotonic batch
//!    percentage
//! 4. **Settle**: wait for every unit, then resolve with the URLs in
//!    submission order or reject with the first failure observed

pub mod batch;
pub mod error;
pub mod types;
pub mod unit;

#[cfg(test)]
mod mock;

pub use batch::BatchCoordinator;
pub use error::UploadError;
pub use types::{
    BatchEvent, BatchOutcome, BatchProgress, BatchReport, BatchState, DEFAULT_MAX_FILE_BYTES,
    DestinationKeyFn, UnitProgress, UnitReport, UploadPolicy, default_key_fn,
};
pub use unit::UploadUnit;
