//! Terminal presentation for the SOW field tools
//!
//! Provides shared CLI functionality:
//! - Status lines and headers
//! - Field-specific formatting (distances, check-in gate, heat-map cells)
//! - Width-aware table columns for CJK site and species names
//! - Spinners for backend calls and location fixes

#![warn(missing_docs)]

pub mod output;
pub mod progress;

pub use output::{Status, Table};
