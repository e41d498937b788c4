use serde::{Deserialize, Serialize};

/// Hard ceiling on the number of images attached to one package.
pub const MAX_IMAGES_PER_PACKAGE: usize = 5;

/// A travel package as stored by the package API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub package_name: String,
    pub package_description: String,
    pub package_destination: String,
    pub package_days: u32,
    pub package_nights: u32,
    pub package_accommodation: String,
    pub package_transportation: String,
    pub package_meals: String,
    pub package_activities: String,
    pub package_price: f64,
    #[serde(default)]
    pub package_discount_price: f64,
    #[serde(default)]
    pub package_offer: bool,
    #[serde(default)]
    pub package_images: Vec<String>,
}

impl Default for PackageRecord {
    /// Blank record with the admin form's initial values.
    fn default() -> Self {
        Self {
            package_name: String::new(),
            package_description: String::new(),
            package_destination: String::new(),
            package_days: 1,
            package_nights: 1,
            package_accommodation: String::new(),
            package_transportation: String::new(),
            package_meals: String::new(),
            package_activities: String::new(),
            package_price: 500.0,
            package_discount_price: 0.0,
            package_offer: false,
            package_images: Vec::new(),
        }
    }
}

/// Lifecycle of a single file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` once the upload can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Snapshot of one file upload's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub destination_key: String,
    pub file_name: String,
    pub status: UploadStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl UploadProgress {
    /// Returns the floored upload percentage (0-100).
    ///
    /// An empty file counts as fully transferred.
    pub fn percentage(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let transferred = self.transferred_bytes.min(self.total_bytes);
        (transferred as u128 * 100 / self.total_bytes as u128) as u8
    }
}
