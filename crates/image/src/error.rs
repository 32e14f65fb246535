//! Error types for the image crate.

use crate::ImageFormat;
use thiserror::Error;

/// Result type alias for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors that can occur during image operations.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Unknown image format
    #[error("Unknown image format")]
    UnknownFormat,

    /// Recognised but not decodable here (e.g. HEIC)
    #[error("Unsupported image format: {0:?}")]
    UnsupportedFormat(ImageFormat),

    /// Invalid image data
    #[error("Invalid image data: {0}")]
    InvalidData(String),

    /// Even the smallest attempted encoding stayed above the ceiling
    #[error("Could not compress below {max_bytes} bytes (smallest attempt: {smallest} bytes)")]
    SizeCeiling {
        /// Configured ceiling
        max_bytes: usize,
        /// Size of the smallest encoding produced
        smallest: usize,
    },

    /// Image processing error
    #[cfg(feature = "processing")]
    #[error("Image processing error: {0}")]
    ProcessingError(#[from] image::ImageError),
}

impl From<ImageError> for sow_core::Error {
    fn from(err: ImageError) -> Self {
        use sow_core::ErrorCode;

        let code = match &err {
            ImageError::UnknownFormat | ImageError::UnsupportedFormat(_) => {
                ErrorCode::UnsupportedImage
            }
            ImageError::SizeCeiling { .. } => ErrorCode::ImageTooLarge,
            _ => ErrorCode::ImageError,
        };
        let suggestion = match code {
            ErrorCode::UnsupportedImage => "Use a JPEG, PNG, WebP or GIF photo",
            ErrorCode::ImageTooLarge => "Crop the photo or pick a smaller one",
            _ => "The file may be damaged; try another photo",
        };

        sow_core::Error::new(code, err.to_string())
            .with_suggestion(suggestion)
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sow_core::ErrorCode;

    #[test]
    fn test_error_codes() {
        let unknown: sow_core::Error = ImageError::UnknownFormat.into();
        assert_eq!(unknown.code, ErrorCode::UnsupportedImage);

        let ceiling: sow_core::Error = ImageError::SizeCeiling {
            max_bytes: 204_800,
            smallest: 300_000,
        }
        .into();
        assert_eq!(ceiling.code, ErrorCode::ImageTooLarge);

        let corrupt: sow_core::Error = ImageError::InvalidData("truncated".into()).into();
        assert_eq!(corrupt.code, ErrorCode::ImageError);
    }
}
