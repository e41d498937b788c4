//! Package record editing.
//!
//! Holds the draft of one travel package, validates it before saving, merges
//! uploaded image URLs into it and talks to the package API.

pub mod client;
pub mod draft;
pub mod editor;
pub mod error;

pub use client::PackageClient;
pub use draft::{FieldEdit, PackageDraft};
pub use editor::PackageEditor;
pub use error::{PackageError, ValidationError};
