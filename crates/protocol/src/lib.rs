//! Wire types shared by the package admin client and the package API.
//!
//! Field names follow the JSON the API speaks (camelCase).

pub mod messages;
pub mod types;

pub use messages::{GetPackageResponse, UpdatePackageResponse};
pub use types::{MAX_IMAGES_PER_PACKAGE, PackageRecord, UploadProgress, UploadStatus};
