//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use packdesk_package::{PackageClient, PackageDraft, PackageEditor};
use packdesk_protocol::PackageRecord;
use packdesk_transfer::{FileDescriptor, HttpResumableChannel, LocalDirChannel, TransferChannel};
use packdesk_upload::{BatchCoordinator, BatchProgress, UploadPolicy};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::{Cli, Command};

/// Applies command-line flags on top of the loaded configuration.
pub fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(backend) = cli.storage {
        config.storage.backend = backend;
    }
    if let Some(max) = cli.max_file_bytes {
        config.max_file_bytes = max;
    }
}

/// Builds the transfer channel selected by the configuration.
pub fn build_channel(
    config: &Config,
    storage_token: Option<&str>,
) -> anyhow::Result<Arc<dyn TransferChannel>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => {
            let mut channel =
                LocalDirChannel::new(&storage.local_dir).with_chunk_size(config.chunk_size);
            if let Some(base) = &storage.public_base_url {
                channel = channel.with_public_base_url(base.as_str());
            }
            Ok(Arc::new(channel))
        }
        StorageBackend::Firebase => {
            if storage.firebase_bucket.is_empty() {
                anyhow::bail!("storage.firebase_bucket must be set for the firebase backend");
            }
            let channel = HttpResumableChannel::with_base_url(
                &storage.firebase_base_url,
                &storage.firebase_bucket,
                storage_token,
            )?
            .with_chunk_size(config.chunk_size);
            Ok(Arc::new(channel))
        }
    }
}

/// Runs the selected command.
pub async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    let client = PackageClient::new(&config.api_base_url)?;

    match cli.command {
        Command::Show { id } => show(&client, &id).await,
        Command::Upload { id, files, submit } => {
            let channel = build_channel(&config, cli.storage_token.as_deref())?;
            upload(&config, channel, &client, &id, &files, submit).await
        }
        Command::Submit { id, file } => submit_file(&client, &id, &file).await,
    }
}

async fn show(client: &PackageClient, id: &str) -> anyhow::Result<()> {
    let record = client.get_package(id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn upload(
    config: &Config,
    channel: Arc<dyn TransferChannel>,
    client: &PackageClient,
    id: &str,
    paths: &[PathBuf],
    submit: bool,
) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = FileDescriptor::from_path(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(file);
    }

    let mut editor = PackageEditor::load(client, id).await?;
    let policy = UploadPolicy {
        max_file_bytes: config.max_file_bytes,
        ..UploadPolicy::default()
    };
    let coordinator = BatchCoordinator::new(channel, policy);

    let final_progress = coordinator.subscribe_progress();
    let mut progress = coordinator.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = progress.borrow_and_update().percent;
            eprint!("{}", progress_line(percent));
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = editor.upload_images(&coordinator, &files, &cancel).await;
    eprintln!("{}", finish_progress(printer, &final_progress).await);
    let added = result?;

    info!(id, added, total = editor.current_image_count(), "images attached");
    for url in &editor.draft().images()[editor.current_image_count() - added..] {
        println!("{url}");
    }

    if submit {
        let message = editor.submit(client).await?;
        println!("{message}");
    }
    Ok(())
}

fn progress_line(percent: u8) -> String {
    format!("\ruploading images: {percent:>3}%")
}

/// Stops the live printer and returns the line for the last published value,
/// which the printer may not have reached.
async fn finish_progress(
    printer: JoinHandle<()>,
    progress: &watch::Receiver<BatchProgress>,
) -> String {
    printer.abort();
    let _ = printer.await;
    let percent = progress.borrow().percent;
    progress_line(percent)
}

async fn submit_file(client: &PackageClient, id: &str, path: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record: PackageRecord = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a package record", path.display()))?;

    let mut editor = PackageEditor::new(id, PackageDraft::from(record));
    let message = editor.submit(client).await?;
    println!("{message}");
    Ok(())
}
