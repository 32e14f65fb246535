//! Check-in history and CSV export.

use crate::rows::decode_all;
use chrono::{FixedOffset, NaiveDate};
use sow_api_client::{Gateway, Query};
use sow_core::models::{tables, CheckinRecord};
use sow_core::{Error, Result};
use std::path::Path;

/// Column headers of the exported file.
pub const CSV_HEADERS: [&str; 3] = ["日期", "時間", "簽到地點"];

const BOM: char = '\u{FEFF}';

/// Inclusive day range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub start: Option<NaiveDate>,
    /// Last day included
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Range between two optional days; `start` may not follow `end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::validation(format!(
                    "Start date {} is after end date {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    fn apply(&self, mut query: Query) -> Query {
        if let Some(start) = self.start {
            query = query.gte("created_at", format!("{}T00:00:00", start));
        }
        if let Some(end) = self.end {
            query = query.lte("created_at", format!("{}T23:59:59", end));
        }
        query
    }

    /// Suggested export file name.
    pub fn file_name(&self, today: NaiveDate) -> String {
        let start = self
            .start
            .map(|d| d.to_string())
            .unwrap_or_else(|| "全部".to_string());
        format!("荒野足跡_{}_至_{}.csv", start, self.end.unwrap_or(today))
    }
}

/// A volunteer's check-ins in `range`, newest first.
pub async fn load_history(
    gateway: &dyn Gateway,
    user_id: &str,
    range: &DateRange,
) -> Result<Vec<CheckinRecord>> {
    let query = range.apply(
        Query::new()
            .select("created_at,location_name")
            .eq("user_id", user_id)
            .order_desc("created_at"),
    );
    let rows = gateway.query(tables::CHECKIN_RECORDS, &query).await?;
    Ok(decode_all(tables::CHECKIN_RECORDS, rows))
}

/// CSV text with a byte-order mark, dates rendered in `offset`.
pub fn to_csv(records: &[CheckinRecord], offset: &FixedOffset) -> String {
    let mut out = String::new();
    out.push(BOM);
    out.push_str(&CSV_HEADERS.join(","));
    for record in records {
        let local = record.created_at.with_timezone(offset);
        out.push('\n');
        out.push_str(&local.format("%Y/%-m/%-d").to_string());
        out.push(',');
        out.push_str(&local.format("%H:%M:%S").to_string());
        out.push(',');
        out.push_str(&csv_field(&record.location_name));
    }
    out
}

/// Write the CSV export. Refuses an empty history.
pub fn write_csv(path: &Path, records: &[CheckinRecord], offset: &FixedOffset) -> Result<()> {
    if records.is_empty() {
        return Err(Error::validation("No check-ins to export"));
    }
    std::fs::write(path, to_csv(records, offset))?;
    tracing::info!(path = %path.display(), rows = records.len(), "History exported");
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, FakeGateway};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn taipei() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn record(name: &str, at: chrono::DateTime<Utc>) -> CheckinRecord {
        CheckinRecord {
            id: None,
            user_id: None,
            location_name: name.to_string(),
            branch: None,
            volunteer_group: None,
            created_at: at,
        }
    }

    #[test]
    fn test_csv_has_bom_headers_and_local_time() {
        let records = [record(
            "大安森林公園",
            Utc.with_ymd_and_hms(2026, 5, 3, 23, 30, 5).unwrap(),
        )];
        let csv = to_csv(&records, &taipei());

        assert!(csv.starts_with('\u{FEFF}'));
        let lines: Vec<_> = csv.trim_start_matches('\u{FEFF}').lines().collect();
        assert_eq!(lines[0], "日期,時間,簽到地點");
        assert_eq!(lines[1], "2026/5/4,07:30:05,大安森林公園");
    }

    #[test]
    fn test_csv_quotes_commas() {
        let records = [record("河口, 北岸", Utc.with_ymd_and_hms(2026, 5, 3, 1, 0, 0).unwrap())];
        assert!(to_csv(&records, &taipei()).ends_with("\"河口, 北岸\""));
    }

    #[test]
    fn test_empty_export_is_refused() {
        let dir = std::env::temp_dir().join("sow-history-empty.csv");
        assert!(write_csv(&dir, &[], &taipei()).is_err());
    }

    #[test]
    fn test_range_validation_and_file_name() {
        assert!(DateRange::new(Some(day("2026-05-10")), Some(day("2026-05-01"))).is_err());

        let open = DateRange::default();
        assert_eq!(open.file_name(day("2026-05-10")), "荒野足跡_全部_至_2026-05-10.csv");

        let range = DateRange::new(Some(day("2026-05-01")), Some(day("2026-05-07"))).unwrap();
        assert_eq!(range.file_name(day("2026-05-10")), "荒野足跡_2026-05-01_至_2026-05-07.csv");
    }

    #[tokio::test]
    async fn test_load_history_filters_range_newest_first() {
        let fake = FakeGateway::new();
        fake.seed(
            tables::CHECKIN_RECORDS,
            vec![
                json!({"user_id": "u1", "location_name": "A", "created_at": "2026-04-30T10:00:00Z"}),
                json!({"user_id": "u1", "location_name": "B", "created_at": "2026-05-02T10:00:00Z"}),
                json!({"user_id": "u1", "location_name": "C", "created_at": "2026-05-05T10:00:00Z"}),
                json!({"user_id": "u2", "location_name": "D", "created_at": "2026-05-03T10:00:00Z"}),
            ],
        );
        let range = DateRange::new(Some(day("2026-05-01")), Some(day("2026-05-31"))).unwrap();

        let history = load_history(&fake, "u1", &range).await.unwrap();
        let names: Vec<_> = history.iter().map(|r| r.location_name.as_str()).collect();
        assert_eq!(names, ["C", "B"]);

        let params = &fake.calls_of(CallKind::Query)[0].payload;
        assert_eq!(params["created_at"], "lte.2026-05-31T23:59:59");
    }
}
