//! Batch coordinator for concurrent image uploads.
//!
//! Admits a batch, runs one unit per file, aggregates their progress and
//! settles the batch once every unit has finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::join_all;
use packdesk_transfer::{FileDescriptor, TransferChannel};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::UploadError;
use crate::types::{
    BatchEvent, BatchOutcome, BatchProgress, BatchReport, BatchState, DestinationKeyFn,
    UnitReport, UploadPolicy, default_key_fn,
};
use crate::unit::UploadUnit;

/// Coordinates batches of uploads over one transfer channel.
///
/// Each `submit` call is an independent batch with its own id. Progress is
/// published both as [`BatchEvent::Progress`] events and on a watch channel
/// holding the latest [`BatchProgress`].
///
/// Admitted batches on one coordinator run one at a time, so the watch and
/// the event stream only ever describe a single running batch. Concurrent
/// `submit` calls wait for the running batch to settle.
pub struct BatchCoordinator {
    channel: Arc<dyn TransferChannel>,
    policy: UploadPolicy,
    key_fn: DestinationKeyFn,
    events_tx: mpsc::Sender<BatchEvent>,
    events_rx: Option<mpsc::Receiver<BatchEvent>>,
    progress_tx: watch::Sender<BatchProgress>,
    running: Mutex<()>,
}

impl BatchCoordinator {
    /// Creates a coordinator with the default key derivation.
    pub fn new(channel: Arc<dyn TransferChannel>, policy: UploadPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (progress_tx, _) = watch::channel(BatchProgress::default());
        Self {
            channel,
            policy,
            key_fn: default_key_fn(),
            events_tx,
            events_rx: Some(events_rx),
            progress_tx,
            running: Mutex::new(()),
        }
    }

    /// Replaces how destination keys are derived from files.
    pub fn with_key_fn(mut self, key_fn: DestinationKeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than awaited when the receiver falls
    /// behind or was never taken.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<BatchEvent>> {
        self.events_rx.take()
    }

    /// Watches the aggregate percentage of the running batch.
    pub fn subscribe_progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Uploads `files` and returns their URLs in submission order.
    ///
    /// `current_image_count` is the number of images already attached to
    /// the record; it counts towards the per-package limit. Fails with the
    /// first unit failure observed, after every unit has settled.
    pub async fn submit(
        &self,
        files: &[FileDescriptor],
        current_image_count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, UploadError> {
        self.submit_report(files, current_image_count, cancel)
            .await?
            .into_result()
    }

    /// Like [`submit`](Self::submit) but returns every unit's outcome.
    ///
    /// Only admission failures are returned as `Err`.
    pub async fn submit_report(
        &self,
        files: &[FileDescriptor],
        current_image_count: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, UploadError> {
        let batch_id = Uuid::new_v4().to_string();

        if let Err(e) = self.policy.admit(files, current_image_count) {
            warn!(batch = %batch_id, error = %e, "batch refused");
            self.emit(BatchEvent::Rejected {
                batch_id,
                reason: e.to_string(),
            });
            return Err(e);
        }

        let _running = self.running.lock().await;
        info!(
            batch = %batch_id,
            files = files.len(),
            existing = current_image_count,
            "batch started"
        );
        self.emit(BatchEvent::Started {
            batch_id: batch_id.clone(),
            files: files.len(),
        });
        self.progress_tx.send_replace(BatchProgress {
            batch_id: batch_id.clone(),
            percent: 0,
        });

        let mut state = BatchState::new(batch_id.clone(), files.len());
        let settled = AtomicUsize::new(0);
        let unit = UploadUnit::new(
            self.channel.as_ref(),
            self.policy.max_file_bytes,
            cancel.clone(),
        );
        let (unit_tx, mut unit_rx) = mpsc::channel(64);

        let units: Vec<_> = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let key = (self.key_fn)(file);
                let tx = unit_tx.clone();
                let unit = &unit;
                let settled = &settled;
                let batch_id = &batch_id;
                async move {
                    debug!(batch = %batch_id, index, key = %key, "unit started");
                    let outcome = unit.run(index, file.clone(), key, &tx).await;
                    let settled_order = settled.fetch_add(1, Ordering::SeqCst);
                    self.emit(match &outcome {
                        Ok(url) => BatchEvent::UnitCompleted {
                            batch_id: batch_id.clone(),
                            index,
                            url: url.clone(),
                        },
                        Err(e) => BatchEvent::UnitFailed {
                            batch_id: batch_id.clone(),
                            index,
                            error: e.to_string(),
                        },
                    });
                    UnitReport {
                        index,
                        settled_order,
                        outcome,
                    }
                }
            })
            .collect();
        // Units hold the remaining senders; the drain ends when they finish.
        drop(unit_tx);

        let drain = async {
            while let Some(progress) = unit_rx.recv().await {
                if let Some(percent) = state.record(progress) {
                    self.publish(&batch_id, percent);
                }
            }
        };
        let (reports, ()) = tokio::join!(join_all(units), drain);

        let report = BatchReport::new(batch_id.clone(), reports);
        let outcome = report.outcome();
        state.settle(outcome.clone());

        match outcome {
            BatchOutcome::Resolved(urls) => {
                info!(batch = %batch_id, files = urls.len(), "batch resolved");
                self.emit(BatchEvent::Resolved { batch_id, urls });
            }
            BatchOutcome::Rejected(reason) => {
                warn!(
                    batch = %batch_id,
                    succeeded = report.succeeded().count(),
                    reason = %reason,
                    "batch rejected"
                );
                self.emit(BatchEvent::Rejected { batch_id, reason });
            }
            BatchOutcome::Pending => {}
        }

        Ok(report)
    }

    fn publish(&self, batch_id: &str, percent: u8) {
        self.progress_tx.send_replace(BatchProgress {
            batch_id: batch_id.to_string(),
            percent,
        });
        self.emit(BatchEvent::Progress {
            batch_id: batch_id.to_string(),
            percent,
        });
    }

    fn emit(&self, event: BatchEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "batch event dropped");
        }
    }
}
