//! Firebase Storage resumable upload channel.
//!
//! Speaks the `X-Goog-Upload-*` resumable protocol over `reqwest`:
//!
//! 1. **Start**: `POST {base}/o?name={key}` returns a session URL
//! 2. **Upload**: chunks are posted to the session URL at explicit offsets;
//!    the last one carries `upload, finalize`
//! 3. **Query**: after a failed chunk, the session reports how many bytes it
//!    holds and the upload resumes from there
//! 4. **Cancel**: abandons the session when the upload is cancelled

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::{CompletedRef, TransferChannel, TransferEvent, TransferEvents, emit};
use crate::chunked::ChunkReader;
use crate::types::FileDescriptor;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Public Firebase Storage REST endpoint.
pub const DEFAULT_FIREBASE_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";

const UPLOAD_PROTOCOL: &str = "X-Goog-Upload-Protocol";
const UPLOAD_COMMAND: &str = "X-Goog-Upload-Command";
const UPLOAD_URL: &str = "X-Goog-Upload-URL";
const UPLOAD_OFFSET: &str = "X-Goog-Upload-Offset";
const UPLOAD_SIZE_RECEIVED: &str = "X-Goog-Upload-Size-Received";
const UPLOAD_CONTENT_LENGTH: &str = "X-Goog-Upload-Header-Content-Length";
const UPLOAD_CONTENT_TYPE: &str = "X-Goog-Upload-Header-Content-Type";

/// How often a single chunk is re-sent after a transport failure.
const DEFAULT_CHUNK_RETRIES: u32 = 3;

/// Object metadata returned when an upload is finalized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Uploads to a Firebase Storage bucket with the resumable protocol.
#[derive(Clone)]
pub struct HttpResumableChannel {
    http: reqwest::Client,
    bucket_url: String,
    chunk_size: usize,
    chunk_retries: u32,
    retry_delay: Duration,
}

impl HttpResumableChannel {
    /// Creates a channel for `bucket` at the public Firebase endpoint.
    ///
    /// `auth_token`, when given, is sent as a Firebase bearer token.
    pub fn new(bucket: &str, auth_token: Option<&str>) -> Result<Self, TransferError> {
        Self::with_base_url(DEFAULT_FIREBASE_BASE_URL, bucket, auth_token)
    }

    /// Creates a channel for `bucket` under a custom REST endpoint
    /// (emulators, proxies, tests).
    pub fn with_base_url(
        base_url: &str,
        bucket: &str,
        auth_token: Option<&str>,
    ) -> Result<Self, TransferError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Firebase {token}"))
                    .map_err(|_| TransferError::Protocol("invalid auth token".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            bucket_url: format!("{}/b/{}", base_url.trim_end_matches('/'), bucket),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_retries: DEFAULT_CHUNK_RETRIES,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Overrides the chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Overrides how often a failed chunk is resumed, and the pause between tries.
    pub fn with_chunk_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.chunk_retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Public download URL for an object.
    fn download_url(&self, key: &str, token: Option<&str>) -> String {
        let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC);
        match token {
            Some(token) => format!("{}/o/{encoded}?alt=media&token={token}", self.bucket_url),
            None => format!("{}/o/{encoded}?alt=media", self.bucket_url),
        }
    }

    /// Opens a resumable session and returns its URL.
    async fn start_session(&self, key: &str, file: &FileDescriptor) -> Result<String, TransferError> {
        let encoded = utf8_percent_encode(key, NON_ALPHANUMERIC);
        let url = format!("{}/o?name={encoded}", self.bucket_url);
        let body = serde_json::json!({
            "name": key,
            "contentType": file.content_type(),
        });

        let resp = self
            .http
            .post(&url)
            .header(UPLOAD_PROTOCOL, "resumable")
            .header(UPLOAD_COMMAND, "start")
            .header(UPLOAD_CONTENT_LENGTH, file.byte_size().to_string())
            .header(UPLOAD_CONTENT_TYPE, file.content_type())
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body.to_string())
            .send()
            .await?;
        let resp = check_status(resp).await?;

        resp.headers()
            .get(UPLOAD_URL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| TransferError::Protocol("missing upload session URL".into()))
    }

    /// Sends one chunk. Returns the finalized object when `finalize` is set.
    async fn send_chunk(
        &self,
        session_url: &str,
        offset: u64,
        data: Vec<u8>,
        finalize: bool,
    ) -> Result<Option<ObjectMetadata>, TransferError> {
        let command = if finalize { "upload, finalize" } else { "upload" };
        let resp = self
            .http
            .post(session_url)
            .header(UPLOAD_PROTOCOL, "resumable")
            .header(UPLOAD_COMMAND, command)
            .header(UPLOAD_OFFSET, offset.to_string())
            .body(data)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        if finalize {
            let body = resp.bytes().await?;
            Ok(Some(serde_json::from_slice(&body)?))
        } else {
            Ok(None)
        }
    }

    /// Asks the session how many bytes it has persisted.
    async fn query_session(&self, session_url: &str) -> Result<u64, TransferError> {
        let resp = self
            .http
            .post(session_url)
            .header(UPLOAD_PROTOCOL, "resumable")
            .header(UPLOAD_COMMAND, "query")
            .send()
            .await?;
        let resp = check_status(resp).await?;

        resp.headers()
            .get(UPLOAD_SIZE_RECEIVED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| TransferError::Protocol("missing received size".into()))
    }

    /// Abandons a session. Failures are logged, not reported.
    async fn cancel_session(&self, session_url: &str) {
        let result = self
            .http
            .post(session_url)
            .header(UPLOAD_PROTOCOL, "resumable")
            .header(UPLOAD_COMMAND, "cancel")
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to cancel upload session");
        }
    }

    /// Runs a whole upload. Returns `Ok(None)` if it was abandoned.
    async fn run(
        &self,
        key: &str,
        file: &FileDescriptor,
        tx: &mpsc::Sender<TransferEvent>,
        cancel: &CancellationToken,
    ) -> Result<Option<CompletedRef>, TransferError> {
        let total_bytes = file.byte_size();

        let session_url = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            r = self.start_session(key, file) => r?,
        };
        debug!(key = %key, "resumable session opened");

        if !emit(
            tx,
            TransferEvent::Progress {
                bytes_transferred: 0,
                total_bytes,
            },
        )
        .await
        {
            self.cancel_session(&session_url).await;
            return Ok(None);
        }

        let mut reader = ChunkReader::new(file.content(), key, self.chunk_size);
        let mut retries_left = self.chunk_retries;

        loop {
            let finalize = reader.is_last_chunk();
            let offset = reader.offset();
            let data = reader.next_chunk().map(|c| c.data).unwrap_or_default();
            let sent = data.len() as u64;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel_session(&session_url).await;
                    return Ok(None);
                }
                r = self.send_chunk(&session_url, offset, data, finalize) => r,
            };

            match result {
                Ok(metadata) => {
                    let delivered = emit(
                        tx,
                        TransferEvent::Progress {
                            bytes_transferred: offset + sent,
                            total_bytes,
                        },
                    )
                    .await;

                    if let Some(metadata) = metadata {
                        return Ok(Some(CompletedRef {
                            destination_key: metadata.name,
                            token: metadata
                                .download_tokens
                                .and_then(|t| t.split(',').next().map(str::to_string)),
                        }));
                    }
                    if !delivered {
                        self.cancel_session(&session_url).await;
                        return Ok(None);
                    }
                }
                Err(e @ TransferError::Http(_)) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(key = %key, offset, error = %e, "chunk failed, resuming session");
                    let received = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            self.cancel_session(&session_url).await;
                            return Ok(None);
                        }
                        r = async {
                            tokio::time::sleep(self.retry_delay).await;
                            self.query_session(&session_url).await
                        } => r?,
                    };
                    debug!(key = %key, received, "session resumed");
                    reader.seek_to(received);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl TransferChannel for HttpResumableChannel {
    fn upload(
        &self,
        destination_key: &str,
        file: &FileDescriptor,
        cancel: CancellationToken,
    ) -> TransferEvents {
        let (tx, rx) = mpsc::channel(32);
        let channel = self.clone();
        let key = destination_key.to_string();
        let file = file.clone();

        tokio::spawn(async move {
            match channel.run(&key, &file, &tx, &cancel).await {
                Ok(Some(completed)) => {
                    debug!(key = %key, "resumable upload finalized");
                    emit(&tx, TransferEvent::Complete(completed)).await;
                }
                Ok(None) => {
                    debug!(key = %key, "resumable upload abandoned");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "resumable upload failed");
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
            Ok(self.download_url(&completed.destination_key, completed.token.as_deref()))
        })
    }
}

/// Turns non-2xx responses into [`TransferError::Storage`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransferError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransferError::Storage {
        status: status.as_u16(),
        body,
    })
}
