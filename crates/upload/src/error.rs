//! Upload error types.

/// Errors produced while admitting or running an upload batch.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("too many images: {selected} selected, {existing} already attached, limit {max}")]
    TooManyImages {
        selected: usize,
        existing: usize,
        max: usize,
    },

    #[error("file too large: {name} is {size} bytes, limit {max}")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Single human-readable message for the person who started the upload.
    pub fn user_message(&self) -> String {
        match self {
            Self::TooManyImages { max, .. } => {
                format!("You can only upload {max} images per package")
            }
            Self::FileTooLarge { max, .. } => {
                format!("Image upload failed ({} max per image)", format_size(*max))
            }
            Self::Transport(_) => "Image upload failed".into(),
            Self::Cancelled => "Image upload cancelled".into(),
        }
    }
}

/// Formats a byte count with binary units, dropping the fraction.
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes}B")
    }
}
