//! Error types for the geo crate.

use thiserror::Error;

/// Result type alias for geo operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur during geo operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Coordinate label could not be parsed
    #[error("Invalid coordinate label: {0}")]
    InvalidLabel(String),

    /// Invalid coordinate values
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

/// Error code for integration with sow-core error handling.
/// Range: 10xxx for geo errors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoErrorCode {
    /// Coordinate label could not be parsed
    InvalidLabel = 10001,
    /// Invalid coordinate values
    InvalidCoordinate = 10002,
}

impl GeoError {
    /// Returns the error code for this error.
    pub fn code(&self) -> GeoErrorCode {
        match self {
            GeoError::InvalidLabel(_) => GeoErrorCode::InvalidLabel,
            GeoError::InvalidCoordinate(_) => GeoErrorCode::InvalidCoordinate,
        }
    }
}
