//! Package editing errors.

use packdesk_upload::UploadError;

/// Reasons a draft cannot be submitted. Raised before any request is sent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is empty: {0}")]
    MissingField(&'static str),

    #[error("{field} is not a finite number")]
    InvalidAmount { field: &'static str },

    #[error("price is zero")]
    MissingPrice,

    #[error("price is negative: {0}")]
    NegativePrice(f64),

    #[error("discount price {discount} is not below regular price {price}")]
    DiscountNotBelowPrice { price: f64, discount: f64 },

    #[error("{field} must be at least 1")]
    InvalidDuration { field: &'static str },

    #[error("{count} images attached, limit {max}")]
    TooManyImages { count: usize, max: usize },
}

impl ValidationError {
    /// Single human-readable message for the editor.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField(_) | Self::MissingPrice => "All fields are required!".into(),
            Self::InvalidAmount { field } => format!("{field} should be a valid number"),
            Self::NegativePrice(_) => "Price should be greater than 500!".into(),
            Self::DiscountNotBelowPrice { .. } => {
                "Regular Price should be greater than Discount Price!".into()
            }
            Self::InvalidDuration { field } => format!("{field} should be at least 1"),
            Self::TooManyImages { max, .. } => {
                format!("You can only upload {max} images per package")
            }
        }
    }
}

/// Errors from loading, editing or saving a package.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    /// The API answered but reported failure.
    #[error("server error: {0}")]
    Server(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackageError {
    /// Single human-readable message for the editor.
    ///
    /// Server messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.user_message(),
            Self::Upload(e) => e.user_message(),
            Self::Server(message) => message.clone(),
            Self::Api { .. } | Self::Http(_) | Self::Json(_) => "Something went wrong!".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages() {
        assert_eq!(
            ValidationError::MissingField("Meals").user_message(),
            "All fields are required!"
        );
        assert_eq!(ValidationError::MissingPrice.user_message(), "All fields are required!");
        assert_eq!(
            ValidationError::DiscountNotBelowPrice {
                price: 100.0,
                discount: 100.0
            }
            .user_message(),
            "Regular Price should be greater than Discount Price!"
        );
        assert_eq!(
            ValidationError::InvalidDuration {
                field: "Nights"
            }
            .user_message(),
            "Nights should be at least 1"
        );
    }

    #[test]
    fn invalid_amount_message() {
        assert_eq!(
            ValidationError::InvalidAmount { field: "Price" }.user_message(),
            "Price should be a valid number"
        );
    }

    #[test]
    fn server_message_is_verbatim() {
        let err = PackageError::Server("Package not found!".into());
        assert_eq!(err.user_message(), "Package not found!");
    }

    #[test]
    fn upload_errors_keep_their_message() {
        let err = PackageError::from(UploadError::Transport("403".into()));
        assert_eq!(err.user_message(), "Image upload failed");
    }
}
