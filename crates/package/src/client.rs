//! Package API client.
//!
//! Async HTTP client using `reqwest` against the package endpoints of the
//! travel backend.

use packdesk_protocol::{GetPackageResponse, PackageRecord, UpdatePackageResponse};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::PackageError;

const FALLBACK_MESSAGE: &str = "Something went wrong!";

/// Client for reading and updating package records.
#[derive(Clone)]
pub struct PackageClient {
    http: reqwest::Client,
    base_url: String,
}

impl PackageClient {
    /// Creates a client for the API at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: &str) -> Result<Self, PackageError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, action: &str, id: &str) -> String {
        let id = utf8_percent_encode(id, NON_ALPHANUMERIC);
        format!("{}/api/package/{action}/{id}", self.base_url)
    }

    /// Fetches the record with the given id.
    pub async fn get_package(&self, id: &str) -> Result<PackageRecord, PackageError> {
        let resp = self.http.get(self.endpoint("get-package-data", id)).send().await?;
        let body: GetPackageResponse = parse(resp).await?;

        match body {
            GetPackageResponse {
                success: true,
                package_data: Some(record),
                ..
            } => {
                debug!(id, images = record.package_images.len(), "package loaded");
                Ok(record)
            }
            GetPackageResponse { message, .. } => {
                let message = message.unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
                warn!(id, message = %message, "package load refused");
                Err(PackageError::Server(message))
            }
        }
    }

    /// Replaces the record with the given id. Returns the server's message.
    pub async fn update_package(
        &self,
        id: &str,
        record: &PackageRecord,
    ) -> Result<String, PackageError> {
        let resp = self
            .http
            .post(self.endpoint("update-package", id))
            .json(record)
            .send()
            .await?;
        let body: UpdatePackageResponse = parse(resp).await?;

        let message = body.message.unwrap_or_default();
        if body.success {
            debug!(id, "package updated");
            Ok(message)
        } else {
            warn!(id, message = %message, "package update refused");
            if message.is_empty() {
                Err(PackageError::Server(FALLBACK_MESSAGE.to_string()))
            } else {
                Err(PackageError::Server(message))
            }
        }
    }
}

/// Decodes the JSON envelope, which the backend also sends with error statuses.
async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, PackageError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    match serde_json::from_slice(&bytes) {
        Ok(body) => Ok(body),
        Err(_) if !status.is_success() => Err(PackageError::Api {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }),
        Err(e) => Err(e.into()),
    }
}
