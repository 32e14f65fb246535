//! Contribution leaderboard.
//!
//! A volunteer's score is check-ins plus species reports, both counted by
//! the backend through embedded `count` aggregates on the profiles read.

use serde::Serialize;
use serde_json::Value;
use sow_api_client::{Gateway, Query};
use sow_core::models::tables;
use sow_core::vocab::{DEFAULT_FULL_NAME, UNSET};
use sow_core::Result;
use tracing::debug;

/// Columns and aggregates read for ranking.
pub const LEADERBOARD_SELECT: &str = "nature_name,full_name,branch,volunteer_group,\
checkin_count:checkin_records(count),report_count:species_reports(count)";

/// Which volunteers compete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// Everyone
    #[default]
    All,
    /// One branch
    Branch(String),
    /// One volunteer group
    Group(String),
}

impl Scope {
    /// Scope from a filter kind and value; an empty value means everyone.
    pub fn from_filter(branch: Option<&str>, group: Option<&str>) -> Self {
        let non_empty = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        match (non_empty(branch), non_empty(group)) {
            (Some(b), _) => Scope::Branch(b),
            (None, Some(g)) => Scope::Group(g),
            (None, None) => Scope::All,
        }
    }

    fn apply(&self, query: Query) -> Query {
        match self {
            Scope::All => query,
            Scope::Branch(branch) => query.eq("branch", branch.as_str()),
            Scope::Group(group) => query.eq("volunteer_group", group.as_str()),
        }
    }
}

/// One ranked volunteer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    /// Nature name, else full name
    pub name: String,
    /// Branch
    pub branch: String,
    /// Volunteer group
    pub group: String,
    /// Check-ins
    pub checkins: u64,
    /// Species reports
    pub reports: u64,
    /// Score
    pub total: u64,
}

/// Top `limit` volunteers in `scope`.
pub async fn load_leaderboard(
    gateway: &dyn Gateway,
    scope: &Scope,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>> {
    let query = scope.apply(Query::new().select(LEADERBOARD_SELECT));
    let rows = gateway.query(tables::PROFILES, &query).await?;
    debug!(profiles = rows.len(), ?scope, "Ranking profiles");
    Ok(rank_profiles(&rows, limit))
}

/// Rank profile rows by total, highest first. Ties keep backend order.
pub fn rank_profiles(rows: &[Value], limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = rows
        .iter()
        .map(|row| {
            let checkins = embedded_count(&row["checkin_count"]);
            let reports = embedded_count(&row["report_count"]);
            LeaderboardEntry {
                rank: 0,
                name: text(row, "nature_name")
                    .or_else(|| text(row, "full_name"))
                    .unwrap_or(DEFAULT_FULL_NAME)
                    .to_string(),
                branch: text(row, "branch").unwrap_or(UNSET).to_string(),
                group: text(row, "volunteer_group").unwrap_or(UNSET).to_string(),
                checkins,
                reports,
                total: checkins + reports,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total.cmp(&a.total));
    entries.truncate(limit);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

fn text<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `[{"count": n}]` as PostgREST embeds it; a bare number is accepted too.
fn embedded_count(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, FakeGateway};
    use serde_json::json;

    fn row(name: &str, branch: &str, checkins: u64, reports: u64) -> Value {
        json!({
            "nature_name": name,
            "full_name": format!("{name} 本名"),
            "branch": branch,
            "volunteer_group": "解說教育組",
            "checkin_count": [{"count": checkins}],
            "report_count": [{"count": reports}],
        })
    }

    #[test]
    fn test_rank_by_total() {
        let rows = vec![
            row("大冠鷲", "台北分會", 3, 1),
            row("樹蛙", "台中分會", 10, 2),
            row("領角鴞", "台北分會", 0, 5),
        ];
        let ranked = rank_profiles(&rows, 10);

        let names: Vec<_> = ranked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["樹蛙", "領角鴞", "大冠鷲"]);
        assert_eq!(ranked[0].total, 12);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_ties_keep_order_and_limit_applies() {
        let rows: Vec<_> = (0..15).map(|i| row(&format!("v{i}"), "台北分會", 1, 0)).collect();
        let ranked = rank_profiles(&rows, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].name, "v0");
        assert_eq!(ranked[9].name, "v9");
    }

    #[test]
    fn test_name_falls_back_to_full_name() {
        let rows = vec![json!({"nature_name": "", "full_name": "陳大文", "checkin_count": [], "report_count": []})];
        let ranked = rank_profiles(&rows, 10);
        assert_eq!(ranked[0].name, "陳大文");
        assert_eq!(ranked[0].total, 0);
        assert_eq!(ranked[0].branch, UNSET);
    }

    #[test]
    fn test_scope_from_filter() {
        assert_eq!(Scope::from_filter(None, None), Scope::All);
        assert_eq!(Scope::from_filter(Some(""), None), Scope::All);
        assert_eq!(Scope::from_filter(Some("台北分會"), None), Scope::Branch("台北分會".into()));
        assert_eq!(Scope::from_filter(None, Some("棲地工作組")), Scope::Group("棲地工作組".into()));
    }

    #[tokio::test]
    async fn test_branch_scope_filters_query() {
        let fake = FakeGateway::new();
        fake.seed(
            tables::PROFILES,
            vec![row("大冠鷲", "台北分會", 3, 1), row("樹蛙", "台中分會", 10, 2)],
        );

        let ranked = load_leaderboard(&fake, &Scope::Branch("台北分會".into()), 10)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "大冠鷲");

        let call = &fake.calls_of(CallKind::Query)[0];
        assert_eq!(call.payload["select"], LEADERBOARD_SELECT);
    }
}
