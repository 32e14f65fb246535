//! Configuration schema definitions
//!
//! Every section and key is optional; missing values take the defaults below.

use serde::{Deserialize, Serialize};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigSchema {
    /// Check-in gate
    #[serde(default)]
    pub checkin: CheckinConfig,

    /// Photo preprocessing
    #[serde(default)]
    pub image: ImageConfig,

    /// Feedback feed
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Leaderboard
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Check-in gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckinConfig {
    /// Maximum distance to the site in kilometres
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    /// How long the success confirmation stays up
    #[serde(default = "default_confirmation_secs")]
    pub confirmation_secs: u64,

    /// Timeout for single-shot position requests
    #[serde(default = "default_locate_timeout_secs")]
    pub locate_timeout_secs: u64,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
            confirmation_secs: default_confirmation_secs(),
            locate_timeout_secs: default_locate_timeout_secs(),
        }
    }
}

fn default_radius_km() -> f64 {
    1.0
}

fn default_confirmation_secs() -> u64 {
    3
}

fn default_locate_timeout_secs() -> u64 {
    10
}

/// Photo preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    /// Byte ceiling for uploaded photos
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Cap for the longer edge in pixels
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// First JPEG quality tried
    #[serde(default = "default_initial_quality")]
    pub initial_quality: u8,

    /// How long a photo-sourced coordinate is badged as such
    #[serde(default = "default_photo_badge_secs")]
    pub photo_badge_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_dimension: default_max_dimension(),
            initial_quality: default_initial_quality(),
            photo_badge_secs: default_photo_badge_secs(),
        }
    }
}

fn default_max_bytes() -> usize {
    200 * 1024
}

fn default_max_dimension() -> u32 {
    1200
}

fn default_initial_quality() -> u8 {
    70
}

fn default_photo_badge_secs() -> u64 {
    5
}

/// Feedback feed configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackConfig {
    /// Number of recent entries kept in the live list
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

fn default_window() -> usize {
    20
}

/// Leaderboard configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardConfig {
    /// Number of ranked volunteers shown
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
