//! Photo preprocessing for species reports.
//!
//! This crate provides:
//! - Format detection from magic bytes
//! - Header-only dimension extraction
//! - EXIF GPS extraction (photo-sourced coordinates)
//! - Compression under a byte ceiling with a capped longer edge
//! - Alpha flattening before JPEG encoding

#![warn(missing_docs)]

mod detect;
mod error;
pub mod exif;
mod metadata;

#[cfg(feature = "processing")]
mod compress;

#[cfg(feature = "processing")]
mod flatten;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use detect::{detect_format, ImageFormat};
pub use error::{ImageError, Result};
pub use exif::{extract_gps, has_exif};
pub use metadata::{extract_metadata, fit_within, ImageMetadata};

#[cfg(feature = "processing")]
pub use compress::{compress_image, CompressOptions, CompressedImage};

#[cfg(feature = "processing")]
pub use flatten::{flatten_alpha, has_alpha_channel};
