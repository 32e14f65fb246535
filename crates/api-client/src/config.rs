//! Configuration for the Supabase gateway
//!
//! Credentials come from the environment; everything else has defaults that
//! can be overridden with the builder methods.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Photo bucket used by species reports
pub const DEFAULT_PHOTO_BUCKET: &str = "species_photos";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`
    pub supabase_url: String,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: String,
    /// Access token of a previously signed-in session
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Request timeout
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Storage bucket for report photos
    pub photo_bucket: String,
    /// Realtime heartbeat interval
    #[serde(with = "secs")]
    pub heartbeat: Duration,
}

mod secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            access_token: None,
            timeout: Duration::from_secs(30),
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            heartbeat: Duration::from_secs(25),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    ///
    /// Reads the following environment variables:
    /// - `SUPABASE_URL` (or `NEXT_PUBLIC_SUPABASE_URL`): project URL
    /// - `SUPABASE_ANON_KEY` (or `NEXT_PUBLIC_SUPABASE_ANON_KEY`): anon key
    /// - `SOW_ACCESS_TOKEN`: access token from `sow login` (optional)
    /// - `SOW_TIMEOUT_SECS`: request timeout in seconds (optional)
    pub fn from_env() -> ApiResult<Self> {
        let supabase_url = env::var("SUPABASE_URL")
            .or_else(|_| env::var("NEXT_PUBLIC_SUPABASE_URL"))
            .map_err(|_| ApiError::missing_env("SUPABASE_URL"))?;

        let anon_key = env::var("SUPABASE_ANON_KEY")
            .or_else(|_| env::var("NEXT_PUBLIC_SUPABASE_ANON_KEY"))
            .map_err(|_| ApiError::missing_env("SUPABASE_ANON_KEY"))?;

        let access_token = env::var("SOW_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());

        let timeout = env::var("SOW_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let config = Self {
            supabase_url,
            anon_key,
            access_token,
            timeout,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set the project URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.supabase_url = url.into();
        self
    }

    /// Builder-style method to set anon key
    #[must_use]
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = key.into();
        self
    }

    /// Builder-style method to set a stored access token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set the photo bucket
    #[must_use]
    pub fn with_photo_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.photo_bucket = bucket.into();
        self
    }

    /// Builder-style method to set the realtime heartbeat
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    fn base(&self) -> &str {
        self.supabase_url.trim_end_matches('/')
    }

    /// PostgREST root
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base())
    }

    /// Storage root
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.base())
    }

    /// GoTrue root
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base())
    }

    /// Realtime websocket endpoint, with the anon key as query parameter
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base().strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base().strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base().to_string()
        };
        format!("{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0", self.anon_key)
    }

    /// Public URL of an object in a public bucket
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.storage_url(), bucket, path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.supabase_url.is_empty() {
            return Err(ApiError::config("supabase_url cannot be empty"));
        }

        if !self.supabase_url.starts_with("http://") && !self.supabase_url.starts_with("https://") {
            return Err(ApiError::config("supabase_url must start with http:// or https://"));
        }

        if self.anon_key.trim().is_empty() {
            return Err(ApiError::config("anon_key cannot be empty"));
        }

        if self.timeout.is_zero() {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        if self.heartbeat.is_zero() {
            return Err(ApiError::config("heartbeat cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::default()
            .with_url("https://abcd.supabase.co/")
            .with_anon_key("anon")
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.photo_bucket, "species_photos");
        assert_eq!(config.heartbeat, Duration::from_secs(25));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = config();
        assert_eq!(config.rest_url(), "https://abcd.supabase.co/rest/v1");
        assert_eq!(config.auth_url(), "https://abcd.supabase.co/auth/v1");
        assert_eq!(
            config.public_object_url("species_photos", "1700000000000_ab12.jpg"),
            "https://abcd.supabase.co/storage/v1/object/public/species_photos/1700000000000_ab12.jpg"
        );
        assert_eq!(
            config.realtime_url(),
            "wss://abcd.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_local_realtime_is_plain_ws() {
        let config = config().with_url("http://127.0.0.1:54321");
        assert!(config.realtime_url().starts_with("ws://127.0.0.1:54321/realtime"));
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());
        assert!(config().with_url("").validate().is_err());
        assert!(config().with_url("ftp://x").validate().is_err());
        assert!(config().with_anon_key(" ").validate().is_err());
        assert!(config().with_timeout(Duration::ZERO).validate().is_err());
    }
}
