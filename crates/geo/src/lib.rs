//! Geospatial utilities for SOW field tools.
//!
//! This crate provides:
//! - Haversine distance between two coordinates (the check-in gate)
//! - Parsing and formatting of the `"lat, lng"` labels stored on reports
//! - Ranking of observation sites by distance from a position
//!
//! # Example
//!
//! ```
//! use sow_geo::{haversine_distance, Coordinate};
//!
//! let taipei_101 = Coordinate::new(25.0330, 121.5654);
//! let sample = Coordinate::new(25.0330, 121.5654);
//!
//! assert!(haversine_distance(&taipei_101, &sample) < 1e-9);
//! ```

mod error;
mod haversine;
mod label;
pub mod rank;

pub use error::{GeoError, GeoErrorCode, Result};
pub use haversine::{haversine_distance, haversine_distance_meters, EARTH_RADIUS_KM, EARTH_RADIUS_M};
pub use label::{format_coordinate_label, parse_coordinate_label};
pub use rank::{rank_by_distance, RankedSite};

/// A geographic coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true if both components are finite and in range.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Like [`Coordinate::new`] but rejects out-of-range or non-finite values.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self::new(latitude, longitude);
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GeoError::InvalidCoordinate(format!("{latitude}, {longitude}")))
        }
    }

    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_coordinate_label(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(Coordinate::checked(25.0330, 121.5654).is_ok());
        let err = Coordinate::checked(120.0, 0.0).unwrap_err();
        assert_eq!(err.code(), GeoErrorCode::InvalidCoordinate);
    }

    #[test]
    fn test_coordinate_from_tuple() {
        let coord: Coordinate = (25.0330, 121.5654).into();
        assert_eq!(coord.latitude, 25.0330);
        assert_eq!(coord.longitude, 121.5654);
    }

    #[test]
    fn test_display_uses_label_format() {
        let coord = Coordinate::new(25.033, 121.5654);
        assert_eq!(coord.to_string(), "25.033000, 121.565400");
    }
}
