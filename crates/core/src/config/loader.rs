//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result, ResultExt};
use crate::validation::Validator;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SOW_CONFIG";

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed values
    pub schema: ConfigSchema,
    /// File the values came from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from an explicit path, `SOW_CONFIG`, or the
    /// standard locations. Missing files in the standard locations fall back
    /// to defaults; a missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config_path = match explicit {
            Some(p) if !p.exists() => return Err(Error::config_not_found(&p)),
            Some(p) => Some(p),
            None => find_config_file(),
        };

        let schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        validate_schema(&schema)?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let schema: ConfigSchema = toml::from_str(content)?;
        validate_schema(&schema)?;
        Ok(Self { schema, path: None })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        ".sow-field.toml",
        "sow-field.toml",
        ".config/sow-field.toml",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("sow-field").join("config.toml"));
    }

    candidates.into_iter().find(|p| p.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {}", path.display()))
}

fn validate_schema(schema: &ConfigSchema) -> Result<()> {
    Validator::new()
        .range("checkin.radius_km", schema.checkin.radius_km, 0.01, 50.0)
        .range("checkin.locate_timeout_secs", schema.checkin.locate_timeout_secs, 1, 120)
        .range("image.max_bytes", schema.image.max_bytes, 10 * 1024, 20 * 1024 * 1024)
        .range("image.max_dimension", schema.image.max_dimension, 64, 8192)
        .range("image.initial_quality", schema.image.initial_quality, 1, 100)
        .range("feedback.window", schema.feedback.window, 1, 500)
        .range("leaderboard.limit", schema.leaderboard.limit, 1, 100)
        .validate()
        .to_result()
        .map_err(|e| Error::new(crate::ErrorCode::ConfigValidationError, e.message))
}
