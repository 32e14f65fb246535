//! Ranking observation sites by distance from a position.
//!
//! Used to order the site picker so the nearest sites come first and to tell
//! the volunteer which sites are currently inside the check-in radius.

use crate::{haversine_distance, Coordinate};
use serde::{Deserialize, Serialize};

/// A site annotated with its distance from the reference position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSite {
    /// Site name
    pub name: String,
    /// Distance in kilometers (Infinity if the site has no usable coordinate)
    pub distance_km: f64,
}

impl RankedSite {
    /// Whether the site lies within `radius_km` of the reference position.
    pub fn is_within(&self, radius_km: f64) -> bool {
        self.distance_km <= radius_km
    }
}

/// Rank sites by distance from `origin`, nearest first.
///
/// Sites without a valid coordinate get an infinite distance and sort last.
/// `max_results` truncates the output when set.
///
/// # Example
/// ```
/// use sow_geo::{rank_by_distance, Coordinate};
///
/// let sites = vec![
///     ("Far".to_string(), Some(Coordinate::new(24.0, 121.0))),
///     ("Near".to_string(), Some(Coordinate::new(25.03, 121.56))),
/// ];
/// let ranked = rank_by_distance(&Coordinate::new(25.0330, 121.5654), &sites, None);
/// assert_eq!(ranked[0].name, "Near");
/// ```
pub fn rank_by_distance(
    origin: &Coordinate,
    sites: &[(String, Option<Coordinate>)],
    max_results: Option<usize>,
) -> Vec<RankedSite> {
    let mut results: Vec<RankedSite> = sites
        .iter()
        .map(|(name, coord)| RankedSite {
            name: name.clone(),
            distance_km: site_distance(origin, coord.as_ref()),
        })
        .collect();

    results.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    if let Some(max) = max_results {
        results.truncate(max);
    }

    results
}

#[inline]
fn site_distance(origin: &Coordinate, site: Option<&Coordinate>) -> f64 {
    match site {
        Some(coord) if coord.is_valid() => haversine_distance(origin, coord),
        _ => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites() -> Vec<(String, Option<Coordinate>)> {
        vec![
            ("陽明山".to_string(), Some(Coordinate::new(25.1553, 121.5483))),
            ("大安森林公園".to_string(), Some(Coordinate::new(25.0298, 121.5355))),
            ("關渡自然公園".to_string(), Some(Coordinate::new(25.1186, 121.4705))),
            ("未定位樣點".to_string(), None),
        ]
    }

    #[test]
    fn test_ranked_nearest_first() {
        let origin = Coordinate::new(25.0330, 121.5654);
        let ranked = rank_by_distance(&origin, &sites(), None);

        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].name, "大安森林公園");
        for window in ranked.windows(2) {
            if window[1].distance_km.is_finite() {
                assert!(window[0].distance_km <= window[1].distance_km);
            }
        }
    }

    #[test]
    fn test_missing_coordinates_sort_last() {
        let origin = Coordinate::new(25.0330, 121.5654);
        let ranked = rank_by_distance(&origin, &sites(), None);
        let last = ranked.last().unwrap();
        assert_eq!(last.name, "未定位樣點");
        assert!(last.distance_km.is_infinite());
        assert!(!last.is_within(1.0));
    }

    #[test]
    fn test_max_results() {
        let origin = Coordinate::new(25.0330, 121.5654);
        let ranked = rank_by_distance(&origin, &sites(), Some(2));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_within_radius() {
        let origin = Coordinate::new(25.0330, 121.5654);
        let ranked = rank_by_distance(&origin, &sites(), None);
        let inside: Vec<_> = ranked.iter().filter(|s| s.is_within(5.0)).collect();
        assert_eq!(inside.len(), 1);
    }
}
