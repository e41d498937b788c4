//! Directory-backed transfer channel.
//!
//! Writes each upload chunk by chunk into a local directory, which can be
//! served statically for development setups.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::{CompletedRef, TransferChannel, TransferEvent, TransferEvents, emit};
use crate::chunked::{ChunkReader, ChunkWriter};
use crate::types::FileDescriptor;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Stores uploads as files under a root directory.
pub struct LocalDirChannel {
    root: PathBuf,
    public_base_url: Option<String>,
    chunk_size: usize,
}

impl LocalDirChannel {
    /// Creates a channel writing under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Serves URLs as `{base}/{key}` instead of `file://` paths.
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Overrides the chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Root directory of stored blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TransferChannel for LocalDirChannel {
    fn upload(
        &self,
        destination_key: &str,
        file: &FileDescriptor,
        cancel: CancellationToken,
    ) -> TransferEvents {
        let (tx, rx) = mpsc::channel(32);
        let writer = ChunkWriter::new(&self.root);
        let reader = ChunkReader::new(file.content(), destination_key, self.chunk_size);
        let key = destination_key.to_string();

        tokio::spawn(async move {
            match write_all(writer, reader, &tx, &cancel).await {
                Ok(true) => {
                    debug!(key = %key, "local upload complete");
                    emit(
                        &tx,
                        TransferEvent::Complete(CompletedRef {
                            destination_key: key,
                            token: None,
                        }),
                    )
                    .await;
                }
                Ok(false) => {
                    debug!(key = %key, "local upload abandoned");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "local upload failed");
                    emit(&tx, TransferEvent::Error(e.to_string())).await;
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
            crate::validate_destination_key(&completed.destination_key)?;
            let url = match &self.public_base_url {
                Some(base) => format!("{base}/{}", completed.destination_key),
                None => format!(
                    "file://{}",
                    self.root.join(&completed.destination_key).display()
                ),
            };
            Ok(url)
        })
    }
}

/// Writes every chunk, reporting progress after each one.
///
/// Returns `Ok(false)` when the upload was abandoned (cancelled or the
/// consumer went away). The partial blob is removed in that case and when a
/// chunk fails to write.
async fn write_all(
    mut writer: ChunkWriter,
    mut reader: ChunkReader,
    tx: &mpsc::Sender<TransferEvent>,
    cancel: &CancellationToken,
) -> Result<bool, TransferError> {
    let total_bytes = reader.file_size();
    let key = reader.key().to_string();

    if !emit(
        tx,
        TransferEvent::Progress {
            bytes_transferred: 0,
            total_bytes,
        },
    )
    .await
    {
        return Ok(false);
    }

    if total_bytes == 0 {
        writer.touch(&key)?;
    }

    while let Some(chunk) = reader.next_chunk() {
        if cancel.is_cancelled() {
            abandon(writer, &key).await;
            return Ok(false);
        }

        let (returned, written) = tokio::task::spawn_blocking(move || {
            let written = writer.write_chunk(&chunk);
            (writer, written)
        })
        .await
        .map_err(|e| TransferError::Protocol(format!("task join error: {e}")))?;
        writer = returned;
        if let Err(e) = written {
            if !matches!(e, TransferError::InvalidKey(_)) {
                abandon(writer, &key).await;
            }
            return Err(e);
        }

        let progressed = emit(
            tx,
            TransferEvent::Progress {
                bytes_transferred: writer.written_offset(&key),
                total_bytes,
            },
        )
        .await;
        if !progressed {
            abandon(writer, &key).await;
            return Ok(false);
        }
    }

    if cancel.is_cancelled() {
        abandon(writer, &key).await;
        return Ok(false);
    }

    Ok(true)
}

async fn abandon(mut writer: ChunkWriter, key: &str) {
    let key = key.to_string();
    let result = tokio::task::spawn_blocking(move || writer.discard(&key)).await;
    if let Ok(Err(e)) = result {
        warn!(error = %e, "failed to discard partial upload");
    }
}
