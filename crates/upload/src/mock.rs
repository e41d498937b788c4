//! Scripted transfer channel for tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use packdesk_transfer::{
    CompletedRef, FileDescriptor, TransferChannel, TransferError, TransferEvent, TransferEvents,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One scripted step of an upload.
#[derive(Debug, Clone)]
pub enum Step {
    /// Wait this long before the next step.
    Sleep(u64),
    Progress(u64, u64),
    Fail(&'static str),
    Complete,
    /// Block until cancelled, then close the stream.
    Hang,
}

/// Plays back a script per file name and records every upload call.
#[derive(Default)]
pub struct ScriptedChannel {
    scripts: HashMap<String, Vec<Step>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, file_name: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(file_name.to_string(), steps);
        self
    }

    /// `(file name, destination key)` of every upload started.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TransferChannel for ScriptedChannel {
    fn upload(
        &self,
        destination_key: &str,
        file: &FileDescriptor,
        cancel: CancellationToken,
    ) -> TransferEvents {
        self.calls
            .lock()
            .unwrap()
            .push((file.name().to_string(), destination_key.to_string()));

        let steps = self
            .scripts
            .get(file.name())
            .cloned()
            .unwrap_or_else(|| vec![Step::Progress(0, file.byte_size()), Step::Complete]);
        let key = destination_key.to_string();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for step in steps {
                if cancel.is_cancelled() {
                    return;
                }
                let event = match step {
                    Step::Sleep(ms) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                        }
                        continue;
                    }
                    Step::Progress(bytes_transferred, total_bytes) => TransferEvent::Progress {
                        bytes_transferred,
                        total_bytes,
                    },
                    Step::Fail(reason) => TransferEvent::Error(reason.to_string()),
                    Step::Complete => TransferEvent::Complete(CompletedRef {
                        destination_key: key.clone(),
                        token: None,
                    }),
                    Step::Hang => {
                        cancel.cancelled().await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        rx
    }

    fn get_url<'a>(
        &'a self,
        completed: &'a CompletedRef,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(async move {
            if completed.destination_key.contains("nourl") {
                return Err(TransferError::Protocol("no download url".into()));
            }
            Ok(format!("https://cdn.test/{}", completed.destination_key))
        })
    }
}
