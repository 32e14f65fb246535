//! Coordinate labels as stored in the `gps_location` column.
//!
//! Reports carry their position as a plain `"lat, lng"` string with six
//! decimals, e.g. `"25.033000, 121.565400"`.

use crate::{Coordinate, GeoError, Result};

/// Format a coordinate as a `"lat, lng"` label with six decimals.
///
/// # Example
/// ```
/// use sow_geo::{format_coordinate_label, Coordinate};
///
/// let label = format_coordinate_label(&Coordinate::new(25.033, 121.5654));
/// assert_eq!(label, "25.033000, 121.565400");
/// ```
pub fn format_coordinate_label(coord: &Coordinate) -> String {
    format!("{:.6}, {:.6}", coord.latitude, coord.longitude)
}

/// Parse a `"lat, lng"` label back into a coordinate.
///
/// Whitespace around either component is ignored. The result is range-checked.
pub fn parse_coordinate_label(label: &str) -> Result<Coordinate> {
    let label = label.trim();
    let (lat, lng) = label
        .split_once(',')
        .ok_or_else(|| GeoError::InvalidLabel(format!("Expected 'lat, lng', got: {}", label)))?;

    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| GeoError::InvalidLabel(format!("Invalid latitude: {}", lat.trim())))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| GeoError::InvalidLabel(format!("Invalid longitude: {}", lng.trim())))?;

    Coordinate::checked(lat, lng)
}
