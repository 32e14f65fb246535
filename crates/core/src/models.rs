//! Row types for the backend tables.
//!
//! Field names match the column names so rows deserialize straight from
//! PostgREST responses and realtime payloads.

#![allow(missing_docs)]

use crate::vocab::{DEFAULT_FULL_NAME, UNSET};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend table, view, RPC and bucket names.
pub mod tables {
    /// Volunteer profiles
    pub const PROFILES: &str = "profiles";
    /// Observation sites
    pub const LOCATIONS: &str = "locations";
    /// One row per check-in
    pub const CHECKIN_RECORDS: &str = "checkin_records";
    /// Species sightings
    pub const SPECIES_REPORTS: &str = "species_reports";
    /// Daily feedback answers
    pub const DAILY_FEEDBACKS: &str = "daily_feedbacks";
    /// Per-day activity counts (view)
    pub const DAILY_CONTRIBUTIONS: &str = "daily_contributions";

    /// Like counter RPC for feedback entries
    pub const RPC_INCREMENT_LIKES: &str = "increment_likes";
    /// Like counter RPC for species reports
    pub const RPC_INCREMENT_SPECIES_LIKES: &str = "increment_species_likes";

    /// Storage bucket for report photos
    pub const SPECIES_PHOTOS_BUCKET: &str = "species_photos";
}

/// Primary key of a row. Tables use either bigint or uuid keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    /// Integer key
    Int(i64),
    /// Text/uuid key
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(id) => write!(f, "{}", id),
            RowId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        RowId::Int(id)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        // Numeric strings come from the command line
        id.parse::<i64>()
            .map(RowId::Int)
            .unwrap_or_else(|_| RowId::Text(id.to_string()))
    }
}

impl RowId {
    /// JSON form used in filters and RPC arguments.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            RowId::Int(id) => serde_json::Value::from(*id),
            RowId::Text(id) => serde_json::Value::from(id.as_str()),
        }
    }
}

/// A volunteer profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Auth user id
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub nature_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub volunteer_group: Option<String>,
    #[serde(default)]
    pub training_period: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub needs_password_reset: bool,
}

impl Profile {
    /// Nature name when set, otherwise the full name.
    pub fn display_name(&self) -> &str {
        non_empty(self.nature_name.as_deref())
            .or_else(|| non_empty(self.full_name.as_deref()))
            .unwrap_or(DEFAULT_FULL_NAME)
    }

    /// Branch, or the unset placeholder.
    pub fn branch_or_unset(&self) -> &str {
        non_empty(self.branch.as_deref()).unwrap_or(UNSET)
    }

    /// Volunteer group, or the unset placeholder.
    pub fn group_or_unset(&self) -> &str {
        non_empty(self.volunteer_group.as_deref()).unwrap_or(UNSET)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Profile row written on registration or first sign-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub full_name: String,
    pub nature_name: String,
    pub branch: String,
    pub volunteer_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Self-service profile edit. Only the set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nature_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volunteer_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.nature_name.is_none()
            && self.branch.is_none()
            && self.volunteer_group.is_none()
            && self.phone.is_none()
    }
}

/// An observation site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_name: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Location {
    /// Site coordinates as `(latitude, longitude)` when both are present.
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Check-in row as inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckin {
    pub user_id: String,
    pub location_name: String,
    pub branch: String,
    pub volunteer_group: String,
}

/// Check-in row as read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    #[serde(default)]
    pub id: Option<RowId>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub location_name: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub volunteer_group: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Species report as inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpeciesReport {
    pub user_id: String,
    pub species_name: String,
    pub description: String,
    /// `"lat, lng"` with six decimals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_location: Option<String>,
    pub image_url: String,
    pub reporter_nature_name: String,
    pub reporter_branch: String,
    pub reporter_group: String,
}

/// Species report as read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesReport {
    pub id: RowId,
    #[serde(default)]
    pub user_id: Option<String>,
    pub species_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gps_location: Option<String>,
    #[serde(default)]
    pub reporter_nature_name: Option<String>,
    #[serde(default)]
    pub reporter_branch: Option<String>,
    #[serde(default)]
    pub reporter_group: Option<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Feedback answer as inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub user_id: String,
    pub question: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub branch: String,
    pub volunteer_group: String,
    pub likes: i64,
}

/// Feedback answer as read back or received over realtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: RowId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub volunteer_group: Option<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of the `daily_contributions` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyContribution {
    #[serde(default)]
    pub user_id: Option<String>,
    pub contribution_date: NaiveDate,
    pub activity_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_untagged() {
        let int: RowId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(int, RowId::Int(42));
        let text: RowId = serde_json::from_value(json!("b7e2")).unwrap();
        assert_eq!(text, RowId::Text("b7e2".into()));
        assert_eq!(RowId::from("17"), RowId::Int(17));
        assert_eq!(RowId::Int(17).to_value(), json!(17));
    }

    #[test]
    fn test_display_name_fallback() {
        let mut profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "full_name": "林小華",
            "nature_name": ""
        }))
        .unwrap();
        assert_eq!(profile.display_name(), "林小華");
        assert_eq!(profile.branch_or_unset(), UNSET);

        profile.nature_name = Some("黑冠麻鷺".into());
        assert_eq!(profile.display_name(), "黑冠麻鷺");
    }

    #[test]
    fn test_feedback_entry_from_realtime_payload() {
        let entry: FeedbackEntry = serde_json::from_value(json!({
            "id": 9,
            "user_id": "u1",
            "question": "今日定觀的驚喜是？",
            "content": "看到領角鴞",
            "branch": "台北分會",
            "volunteer_group": "解說教育組",
            "created_at": "2024-05-01T10:00:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(entry.id, RowId::Int(9));
        assert_eq!(entry.likes, 0);
        assert!(entry.created_at.is_some());
    }

    #[test]
    fn test_new_feedback_omits_missing_location() {
        let row = NewFeedback {
            user_id: "u1".into(),
            question: "q".into(),
            content: "c".into(),
            location_name: None,
            branch: "台北分會".into(),
            volunteer_group: "解說教育組".into(),
            likes: 0,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("location_name").is_none());
        assert_eq!(value["likes"], 0);
    }

    #[test]
    fn test_profile_update_only_sends_set_fields() {
        let update = ProfileUpdate {
            phone: Some("0912345678".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"phone": "0912345678"}));
    }

    #[test]
    fn test_location_coordinates() {
        let loc: Location = serde_json::from_value(json!({
            "location_name": "關渡自然公園",
            "latitude": 25.1178,
            "longitude": 121.4686
        }))
        .unwrap();
        assert_eq!(loc.lat_lng(), Some((25.1178, 121.4686)));

        let missing: Location = serde_json::from_value(json!({"location_name": "x"})).unwrap();
        assert!(missing.lat_lng().is_none());
    }
}
