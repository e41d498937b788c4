//! Form state for editing one package.

use packdesk_transfer::FileDescriptor;
use packdesk_upload::BatchCoordinator;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::PackageClient;
use crate::draft::{FieldEdit, PackageDraft};
use crate::error::PackageError;

/// Owns the current draft of one package and the edits applied to it.
///
/// Every change swaps in a new [`PackageDraft`].
#[derive(Debug, Clone)]
pub struct PackageEditor {
    id: String,
    draft: PackageDraft,
}

impl PackageEditor {
    /// Starts editing `id` from an existing draft.
    pub fn new(id: impl Into<String>, draft: PackageDraft) -> Self {
        Self {
            id: id.into(),
            draft,
        }
    }

    /// Loads `id` from the API.
    pub async fn load(client: &PackageClient, id: &str) -> Result<Self, PackageError> {
        let record = client.get_package(id).await?;
        Ok(Self::new(id, PackageDraft::from(record)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn draft(&self) -> &PackageDraft {
        &self.draft
    }

    pub fn current_image_count(&self) -> usize {
        self.draft.image_count()
    }

    pub fn edit(&mut self, edit: FieldEdit) {
        self.draft = self.draft.apply(edit);
    }

    pub fn set_offer(&mut self, offer: bool) {
        self.edit(FieldEdit::Offer(offer));
    }

    pub fn remove_image(&mut self, index: usize) {
        self.draft = self.draft.without_image(index);
    }

    /// Appends the URLs of a resolved batch to whatever the draft is now.
    pub fn on_batch_resolved(&mut self, urls: &[String]) {
        self.draft = self.draft.with_images_appended(urls);
    }

    /// Uploads `files` and merges their URLs. Returns how many were added.
    ///
    /// On any failure the draft's images are left as they were.
    pub async fn upload_images(
        &mut self,
        coordinator: &BatchCoordinator,
        files: &[FileDescriptor],
        cancel: &CancellationToken,
    ) -> Result<usize, PackageError> {
        let urls = coordinator
            .submit(files, self.current_image_count(), cancel)
            .await?;
        self.on_batch_resolved(&urls);
        Ok(urls.len())
    }

    /// Validates the draft and sends it. Returns the server's message.
    ///
    /// Nothing is sent when validation fails. The draft is kept on any
    /// error so the edit can be retried.
    pub async fn submit(&mut self, client: &PackageClient) -> Result<String, PackageError> {
        let record = self.draft.prepare_for_submit()?;
        let message = client.update_package(&self.id, &record).await?;
        info!(id = %self.id, images = record.package_images.len(), "package saved");
        self.draft = PackageDraft::from(record);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use packdesk_protocol::PackageRecord;
    use packdesk_transfer::{CompletedRef, TransferChannel, TransferError, TransferEvent, TransferEvents};
    use packdesk_upload::{UploadError, UploadPolicy};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::ValidationError;

    /// Completes every upload immediately, or fails files named `fail*`.
    struct InstantChannel;

    impl TransferChannel for InstantChannel {
        fn upload(
            &self,
            destination_key: &str,
            file: &FileDescriptor,
            _cancel: CancellationToken,
        ) -> TransferEvents {
            let (tx, rx) = mpsc::channel(4);
            let event = if file.name().starts_with("fail") {
                TransferEvent::Error("storage/quota-exceeded".into())
            } else {
                TransferEvent::Complete(CompletedRef {
                    destination_key: destination_key.to_string(),
                    token: None,
                })
            };
            tx.try_send(event).unwrap();
            rx
        }

        fn get_url<'a>(
            &'a self,
            completed: &'a CompletedRef,
        ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
            Box::pin(async move { Ok(format!("https://cdn.test/{}", completed.destination_key)) })
        }
    }

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(Arc::new(InstantChannel), UploadPolicy::default())
            .with_key_fn(Arc::new(|f: &FileDescriptor| format!("k-{}", f.name())))
    }

    fn record() -> PackageRecord {
        PackageRecord {
            package_name: "Goa Getaway".into(),
            package_description: "Beaches and forts".into(),
            package_destination: "Goa".into(),
            package_accommodation: "Resort".into(),
            package_transportation: "Flight".into(),
            package_meals: "Breakfast".into(),
            package_activities: "Snorkelling".into(),
            package_images: vec!["https://cdn.test/old.jpg".into()],
            ..PackageRecord::default()
        }
    }

    fn editor() -> PackageEditor {
        PackageEditor::new("p1", PackageDraft::from(record()))
    }

    /// Mock API server: answers GETs with `record` and POSTs with success,
    /// counting requests and keeping the last POSTed record.
    async fn mock_api(
        record: PackageRecord,
    ) -> (String, Arc<AtomicUsize>, Arc<std::sync::Mutex<Option<PackageRecord>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        let hits = Arc::new(AtomicUsize::new(0));
        let posted = Arc::new(std::sync::Mutex::new(None));
        let (hits_srv, posted_srv) = (hits.clone(), posted.clone());

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                hits_srv.fetch_add(1, Ordering::SeqCst);
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let (head, body) = loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    if let Some((head, body)) = text.split_once("\r\n\r\n") {
                        let length = head
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .and_then(|v| v.trim().parse::<usize>().ok())
                            })
                            .unwrap_or(0);
                        if body.len() >= length || n == 0 {
                            break (head.to_string(), body.to_string());
                        }
                    }
                    if n == 0 {
                        break (text, String::new());
                    }
                };

                let reply = if head.starts_with("POST") {
                    *posted_srv.lock().unwrap() = serde_json::from_str(&body).ok();
                    r#"{"success":true,"message":"Package updated successfully!"}"#.to_string()
                } else {
                    serde_json::json!({ "success": true, "packageData": record }).to_string()
                };
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, hits, posted)
    }

    #[tokio::test]
    async fn upload_merges_urls_after_existing_images() {
        let mut editor = editor();
        let files = [
            FileDescriptor::new("a.jpg", vec![1u8; 4]),
            FileDescriptor::new("b.jpg", vec![1u8; 4]),
        ];

        let added = editor
            .upload_images(&coordinator(), &files, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(
            editor.draft().images(),
            [
                "https://cdn.test/old.jpg",
                "https://cdn.test/k-a.jpg",
                "https://cdn.test/k-b.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_images() {
        let mut editor = editor();
        let files = [
            FileDescriptor::new("a.jpg", vec![1u8; 4]),
            FileDescriptor::new("fail.jpg", vec![1u8; 4]),
        ];

        let err = editor
            .upload_images(&coordinator(), &files, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Image upload failed");
        assert_eq!(editor.draft().images(), ["https://cdn.test/old.jpg"]);
    }

    #[tokio::test]
    async fn upload_counts_existing_images() {
        let mut editor = editor();
        editor.on_batch_resolved(&["x".into(), "y".into(), "z".into()]);
        let files: Vec<_> = (0..2)
            .map(|i| FileDescriptor::new(format!("{i}.jpg"), vec![0u8; 1]))
            .collect();

        let err = editor
            .upload_images(&coordinator(), &files, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PackageError::Upload(UploadError::TooManyImages { existing: 4, .. })
        ));
        assert_eq!(editor.current_image_count(), 4);
    }

    #[test]
    fn edits_between_uploads_survive_merge() {
        let mut editor = editor();
        editor.edit(FieldEdit::Name("Kerala".into()));
        editor.remove_image(0);
        editor.on_batch_resolved(&["new".into()]);
        assert_eq!(editor.draft().record().package_name, "Kerala");
        assert_eq!(editor.draft().images(), ["new"]);
    }

    #[tokio::test]
    async fn invalid_price_blocks_submit_without_request() {
        let (url, hits, _) = mock_api(record()).await;
        let client = PackageClient::new(&url).unwrap();
        let mut editor = editor();
        editor.edit(FieldEdit::Price(100.0));
        editor.edit(FieldEdit::DiscountPrice(100.0));
        editor.set_offer(true);

        let err = editor.submit(&client).await.unwrap_err();

        assert!(matches!(
            err,
            PackageError::Validation(ValidationError::DiscountNotBelowPrice { .. })
        ));
        assert_eq!(
            err.user_message(),
            "Regular Price should be greater than Discount Price!"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn load_and_resubmit_unchanged_draft() {
        let (url, hits, posted) = mock_api(record()).await;
        let client = PackageClient::new(&url).unwrap();

        let mut editor = PackageEditor::load(&client, "p1").await.unwrap();
        let message = editor.submit(&client).await.unwrap();

        assert_eq!(message, "Package updated successfully!");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        let sent = posted.lock().unwrap().clone().unwrap();
        assert_eq!(sent.package_images, record().package_images);
        assert_eq!(sent, record());
        assert_eq!(editor.draft().record(), &record());
    }
}
