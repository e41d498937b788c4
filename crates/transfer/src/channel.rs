//! Transfer channel capability.
//!
//! The batch coordinator drives uploads through this trait so that storage
//! backends stay swappable and tests can inject scripted channels.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::TransferError;
use crate::types::FileDescriptor;

/// Receiving end of one upload's event stream.
pub type TransferEvents = mpsc::Receiver<TransferEvent>;

/// Reference to a finished upload, resolvable to an access URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRef {
    /// Destination key the content was stored under.
    pub destination_key: String,
    /// Backend-issued access token, when the backend hands one out.
    pub token: Option<String>,
}

/// Event emitted by a running upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Bytes confirmed by the backend so far. Never decreases.
    Progress {
        bytes_transferred: u64,
        total_bytes: u64,
    },
    /// The upload failed; no further events follow.
    Error(String),
    /// The upload finished; no further events follow.
    Complete(CompletedRef),
}

/// A resumable upload capability.
///
/// Implementations must be cheap to share between concurrent uploads.
pub trait TransferChannel: Send + Sync {
    /// Starts uploading `file` to `destination_key`.
    ///
    /// Events arrive on the returned stream and end with exactly one
    /// [`TransferEvent::Error`] or [`TransferEvent::Complete`]. When `cancel`
    /// fires the channel abandons its resumable session and closes the
    /// stream without a terminal event.
    fn upload(
        &self,
        destination_key: &str,
        file: &FileDescriptor,
        cancel: CancellationToken,
    ) -> TransferEvents;

    /// Resolves a completed upload to its access URL.
    fn get_url<'a>(
        &'a self,
        completed: &'a CompletedRef,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>>;
}

/// Sends `event`, returning `false` once the consumer has gone away.
pub(crate) async fn emit(tx: &mpsc::Sender<TransferEvent>, event: TransferEvent) -> bool {
    tx.send(event).await.is_ok()
}
