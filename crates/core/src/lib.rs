//! Core types shared by the SOW field tools
//!
//! This crate provides shared functionality used by every flow and the CLI:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based tunables with defaults and validation
//! - **Validation**: fluent checks for registration, profile edits and passwords
//! - **Models**: row types for the backend tables
//! - **Vocabularies**: branches, groups and feedback prompts
//!
//! # Example
//!
//! ```rust,no_run
//! use sow_core::config::Config;
//!
//! let config = Config::load(None).expect("config");
//! println!("check-in radius: {} km", config.schema.checkin.radius_km);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod models;
pub mod validation;
pub mod vocab;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::models::{
        tables, CheckinRecord, DailyContribution, FeedbackEntry, Location, NewCheckin,
        NewFeedback, NewProfile, NewSpeciesReport, Profile, ProfileUpdate, RowId, SpeciesReport,
    };
    pub use crate::validation::{ValidationResult, Validator};
}
