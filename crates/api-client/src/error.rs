//! Error types for the gateway

use sow_core::{Error, ErrorCode};
use thiserror::Error;

/// Result type alias for gateway operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Backend returned an error response
    #[error("API error ({status}): {message}")]
    ApiResponse {
        /// HTTP status code
        status: u16,
        /// Error message from the backend
        message: String,
        /// PostgREST/GoTrue error code, when present
        code: Option<String>,
    },

    /// Call needs a signed-in session
    #[error("Not signed in")]
    NotSignedIn,

    /// Realtime channel failure
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Row expected but not returned
    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl ApiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing env var error
    pub fn missing_env(var: impl Into<String>) -> Self {
        Self::MissingEnvVar(var.into())
    }

    /// Create an API response error
    pub fn api_response(status: u16, message: impl Into<String>) -> Self {
        Self::ApiResponse {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// Build from an error body. PostgREST sends `{code, message}`, GoTrue
    /// sends `{error, error_description}` or `{msg}`, Storage `{error, message}`.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let field = |key: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let message = field("message")
            .or_else(|| field("error_description"))
            .or_else(|| field("msg"))
            .or_else(|| field("error"))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.to_string()
                }
            });

        Self::ApiResponse {
            status,
            message,
            code: field("code").or_else(|| field("error_code")),
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if (400..500).contains(status))
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiResponse { status, .. } if *status >= 500)
    }

    /// Whether the backend refused the credentials
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::NotSignedIn)
            || matches!(self, Self::ApiResponse { status: 401 | 403, .. })
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        if let ApiError::MissingEnvVar(variable) = &err {
            return Error::missing_credentials(variable).with_source(err);
        }

        let code = match &err {
            ApiError::Config(_) => ErrorCode::ConfigError,
            ApiError::NotSignedIn | ApiError::ApiResponse { status: 401, .. } => {
                ErrorCode::Unauthorized
            }
            ApiError::ApiResponse { status: 403, .. } => ErrorCode::Forbidden,
            ApiError::Realtime(_) => ErrorCode::RealtimeError,
            ApiError::Request(e) if e.is_timeout() => ErrorCode::Timeout,
            _ => ErrorCode::BackendError,
        };

        let suggestion = match code {
            ErrorCode::Unauthorized => Some("Sign in with `sow login` and export SOW_ACCESS_TOKEN"),
            ErrorCode::BackendError | ErrorCode::Timeout => {
                Some("Check your connection and try again")
            }
            _ => None,
        };

        let message = err.to_string();
        let mut out = Error::new(code, message).with_source(err);
        if let Some(s) = suggestion {
            out = out.with_suggestion(s);
        }
        out
    }
}
