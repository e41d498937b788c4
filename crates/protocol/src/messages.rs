use serde::{Deserialize, Serialize};

use crate::types::PackageRecord;

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response of `GET /api/package/get-package-data/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPackageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_data: Option<PackageRecord>,
}

/// Response of `POST /api/package/update-package/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePackageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
