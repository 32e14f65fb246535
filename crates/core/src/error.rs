//! Application errors with codes, context and recovery suggestions
//!
//! Every user-facing failure in the field tools maps onto one of these codes so
//! the CLI can pick an exit status and print a consistent message:
//! - Auth failures block the command
//! - Backend write failures abandon the operation (the user may retry)
//! - Location failures keep the check-in gate closed
//! - Image failures are reported inline and nothing is uploaded

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ErrorCode {
    // General errors (1xxx)
    Unknown = 1000,
    Internal = 1001,
    Timeout = 1003,

    // IO errors (2xxx)
    IoError = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,

    // Configuration errors (3xxx)
    ConfigError = 3000,
    ConfigNotFound = 3001,
    ConfigParseError = 3002,
    ConfigValidationError = 3003,
    MissingCredentials = 3004,

    // Auth errors (4xxx)
    Unauthorized = 4001,
    Forbidden = 4003,
    SessionExpired = 4004,
    PasswordResetRequired = 4005,

    // Backend errors (5xxx)
    BackendError = 5000,
    NotFound = 5001,
    UploadFailed = 5002,
    RealtimeError = 5003,

    // Validation errors (6xxx)
    ValidationError = 6000,
    InvalidInput = 6001,
    InvalidState = 6002,

    // Location errors (7xxx)
    LocationUnavailable = 7000,
    LocationPermissionDenied = 7001,
    LocationTimeout = 7002,
    OutOfRange = 7003,

    // Image errors (8xxx)
    ImageError = 8000,
    UnsupportedImage = 8001,
    ImageTooLarge = 8002,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            4 => "Auth",
            5 => "Backend",
            6 => "Validation",
            7 => "Location",
            8 => "Image",
            _ => "Unknown",
        }
    }

    /// Process exit status for this code.
    pub fn exit_code(&self) -> i32 {
        match self.code() / 1000 {
            3 => exit_codes::CONFIG_ERROR,
            4 => exit_codes::AUTH_ERROR,
            5 => exit_codes::BACKEND_ERROR,
            6 => exit_codes::VALIDATION_ERROR,
            7 => exit_codes::LOCATION_ERROR,
            8 => exit_codes::IMAGE_ERROR,
            _ if *self == ErrorCode::Timeout => exit_codes::TIMEOUT,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {}", ctx)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Convert to a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    /// Whether this error leaves the current flow blocked rather than failed.
    pub fn is_location(&self) -> bool {
        self.code.category() == "Location"
    }

    // Convenience constructors

    /// Generic IO failure
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    /// Missing input file
    pub fn file_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Check that the file exists and you have read permissions")
    }

    /// Configuration problem
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Explicit config path does not exist
    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create a .sow-field.toml file or point SOW_CONFIG at an existing one")
    }

    /// Backend URL or key missing
    pub fn missing_credentials(variable: &str) -> Self {
        Self::new(
            ErrorCode::MissingCredentials,
            format!("{} is not set", variable),
        )
        .with_suggestion("Export SUPABASE_URL and SUPABASE_ANON_KEY for your project")
    }

    /// No signed-in session
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
            .with_suggestion("Sign in again with `sow login`")
    }

    /// Signed in but not allowed
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Backend rejected or failed a call
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendError, message)
            .with_suggestion("Check your connection and try again")
    }

    /// Expected row was not returned
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("Not found: {}", what.into()))
    }

    /// Storage upload failed
    pub fn upload(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UploadFailed, message)
    }

    /// Realtime channel failure
    pub fn realtime(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RealtimeError, message)
    }

    /// Input rejected before reaching the backend
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Operation not allowed in the current flow state
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// No position fix
    pub fn location_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LocationUnavailable, message)
            .with_suggestion("Move to open sky or choose the free-form site")
    }

    /// Single-shot position request ran out of time
    pub fn location_timeout(secs: u64) -> Self {
        Self::new(
            ErrorCode::LocationTimeout,
            format!("No position fix within {}s", secs),
        )
    }

    /// Too far from the selected site
    pub fn out_of_range(distance_km: f64, radius_km: f64) -> Self {
        Self::new(
            ErrorCode::OutOfRange,
            format!(
                "You are {:.2} km from the site; check-in requires {:.1} km or less",
                distance_km, radius_km
            ),
        )
    }

    /// Photo could not be processed
    pub fn image(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ImageError, message)
    }
}

/// Serializable error report for logging and JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for CLI commands
#[allow(missing_docs)]
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const VALIDATION_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const AUTH_ERROR: i32 = 4;
    pub const BACKEND_ERROR: i32 = 5;
    pub const LOCATION_ERROR: i32 = 6;
    pub const IMAGE_ERROR: i32 = 7;
    pub const TIMEOUT: i32 = 124;
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::BackendError, format!("Unexpected response shape: {}", err))
            .with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {}", err))
            .with_source(err)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Attach context describing what was being attempted
    fn context(self, context: impl Into<String>) -> Result<T>;
    /// Attach a recovery suggestion
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}
