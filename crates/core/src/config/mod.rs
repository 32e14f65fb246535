//! Configuration loading and schema definitions
//!
//! Tunables for the field flows live in a TOML file; backend credentials
//! come from the environment (see `sow-api-client`).

mod loader;
mod schema;

pub use loader::{Config, CONFIG_ENV};
pub use schema::*;
