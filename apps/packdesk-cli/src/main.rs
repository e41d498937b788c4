//! Packdesk admin CLI entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use packdesk_package::PackageError;
use tracing_subscriber::EnvFilter;

use crate::config::StorageBackend;

/// Edit travel packages and upload their images.
#[derive(Debug, Parser)]
#[command(name = "packdesk", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true, env = "PACKDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Package API base URL.
    #[arg(long, global = true, env = "PACKDESK_API_URL")]
    pub api_url: Option<String>,

    /// Image storage backend.
    #[arg(long, global = true, value_enum)]
    pub storage: Option<StorageBackend>,

    /// Largest image accepted for upload, in bytes.
    #[arg(long, global = true)]
    pub max_file_bytes: Option<u64>,

    /// Storage auth token sent with Firebase uploads.
    #[arg(long, global = true, env = "PACKDESK_STORAGE_TOKEN", hide_env_values = true)]
    pub storage_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a package record as JSON.
    Show { id: String },

    /// Upload images and attach them to a package.
    Upload {
        id: String,
        /// Image files to upload (at most five per package).
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Save the package after the images are attached.
        #[arg(long)]
        submit: bool,
    },

    /// Validate a draft and save it as the package.
    Submit {
        id: String,
        /// JSON package record.
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    app::apply_overrides(&mut config, &cli);
    tracing::debug!(api = %config.api_base_url, storage = ?config.storage.backend, "configuration ready");

    let rt = tokio::runtime::Runtime::new()?;
    if let Err(e) = rt.block_on(app::run(config, cli)) {
        match e.downcast_ref::<PackageError>() {
            Some(pe) => {
                tracing::debug!(error = %pe, "command failed");
                eprintln!("{}", pe.user_message());
            }
            None => eprintln!("error: {e:#}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
