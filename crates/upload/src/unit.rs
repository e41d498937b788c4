//! One file's upload within a batch.
//!
//! `UploadUnit` drives a single transfer through a [`TransferChannel`],
//! turning channel events into unit percentages and a final URL.

use packdesk_transfer::{FileDescriptor, TransferChannel, TransferEvent, UploadUnitState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::UnitProgress;

/// Runs uploads for one batch over a borrowed channel.
pub struct UploadUnit<'a> {
    channel: &'a dyn TransferChannel,
    max_file_bytes: u64,
    cancel: CancellationToken,
}

impl<'a> UploadUnit<'a> {
    pub fn new(
        channel: &'a dyn TransferChannel,
        max_file_bytes: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel,
            max_file_bytes,
            cancel,
        }
    }

    /// Uploads `descriptor` to `destination_key` and returns its access URL.
    ///
    /// Each percentage change is reported on `progress_tx` tagged with
    /// `index`. A successful unit always reports 100 before returning.
    pub async fn run(
        &self,
        index: usize,
        descriptor: FileDescriptor,
        destination_key: String,
        progress_tx: &mpsc::Sender<UnitProgress>,
    ) -> Result<String, UploadError> {
        if descriptor.byte_size() > self.max_file_bytes {
            return Err(UploadError::FileTooLarge {
                name: descriptor.name().to_string(),
                size: descriptor.byte_size(),
                max: self.max_file_bytes,
            });
        }

        let mut state = UploadUnitState::new(descriptor, destination_key);
        state.start();

        if self.cancel.is_cancelled() {
            state.cancel();
            return Err(UploadError::Cancelled);
        }

        let mut events = self.channel.upload(
            state.destination_key(),
            state.descriptor(),
            self.cancel.clone(),
        );
        let mut last_percent = None;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                event = events.recv() => event,
            };

            match event {
                Some(TransferEvent::Progress {
                    bytes_transferred,
                    total_bytes,
                }) => {
                    let percent = state.record_progress(bytes_transferred, total_bytes);
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        report(progress_tx, index, percent).await;
                    }
                }
                Some(TransferEvent::Error(reason)) => {
                    warn!(key = %state.destination_key(), error = %reason, "upload failed");
                    state.fail(&reason);
                    return Err(UploadError::Transport(reason));
                }
                Some(TransferEvent::Complete(completed)) => {
                    let url = match self.channel.get_url(&completed).await {
                        Ok(url) => url,
                        Err(e) => {
                            let reason = e.to_string();
                            warn!(key = %state.destination_key(), error = %reason, "url lookup failed");
                            state.fail(&reason);
                            return Err(UploadError::Transport(reason));
                        }
                    };
                    state.succeed(url.clone());
                    report(progress_tx, index, state.percent()).await;
                    debug!(
                        key = %state.destination_key(),
                        bytes = state.total_bytes(),
                        elapsed_ms = state.elapsed().map(|d| d.as_millis() as u64).unwrap_or(0),
                        "upload complete"
                    );
                    return Ok(url);
                }
                None if self.cancel.is_cancelled() => {
                    debug!(key = %state.destination_key(), "upload cancelled");
                    state.cancel();
                    return Err(UploadError::Cancelled);
                }
                None => {
                    let reason = "transfer channel closed without a result";
                    state.fail(reason);
                    return Err(UploadError::Transport(reason.into()));
                }
            }
        }
    }
}

async fn report(tx: &mpsc::Sender<UnitProgress>, index: usize, percent: u8) {
    // The batch may have stopped listening; progress is advisory.
    let _ = tx.send(UnitProgress { index, percent }).await;
}
