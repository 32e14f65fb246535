//! Personal contribution statistics.

use crate::rows::decode_all;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use sow_api_client::{Gateway, Query};
use sow_core::models::{tables, DailyContribution};
use sow_core::Result;
use std::collections::BTreeMap;

/// Highest heat-map intensity.
pub const MAX_HEAT_LEVEL: u8 = 4;

/// Totals, streak and per-day counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContributionStats {
    /// All contributions ever
    pub total: i64,
    /// Consecutive active days ending today or yesterday
    pub streak: u32,
    /// Activity per day
    pub days: BTreeMap<NaiveDate, i64>,
}

impl ContributionStats {
    /// Heat-map level for a day.
    pub fn level_on(&self, date: NaiveDate) -> u8 {
        heat_level(self.days.get(&date).copied().unwrap_or(0))
    }

    /// Heat-map grid: seven rows (Sunday first), `weeks` columns, the last
    /// column holding `end`. Days after `end` are `None`.
    pub fn heat_grid(&self, end: NaiveDate, weeks: usize) -> Vec<Vec<Option<u8>>> {
        let weeks = weeks.max(1);
        let last_sunday = end - Duration::days(i64::from(end.weekday().num_days_from_sunday()));
        let first_sunday = last_sunday - Duration::weeks(weeks as i64 - 1);

        (0..7)
            .map(|weekday| {
                (0..weeks)
                    .map(|week| {
                        let date = first_sunday + Duration::days((week * 7 + weekday) as i64);
                        (date <= end).then(|| self.level_on(date))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Intensity 0–4 for a day's activity count.
pub fn heat_level(count: i64) -> u8 {
    count.clamp(0, i64::from(MAX_HEAT_LEVEL)) as u8
}

/// Fold view rows into stats as of `today`.
pub fn summarize(rows: &[DailyContribution], today: NaiveDate) -> ContributionStats {
    let mut days = BTreeMap::new();
    for row in rows {
        *days.entry(row.contribution_date).or_insert(0) += row.activity_count;
    }
    ContributionStats {
        total: days.values().sum(),
        streak: current_streak(&days, today),
        days,
    }
}

/// Consecutive active days ending today, or ending yesterday when today has
/// no activity yet.
pub fn current_streak(days: &BTreeMap<NaiveDate, i64>, today: NaiveDate) -> u32 {
    let active = |date: NaiveDate| days.get(&date).is_some_and(|count| *count > 0);

    let mut cursor = if active(today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if active(yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while active(cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    streak
}

/// Load and summarise a volunteer's contributions.
pub async fn load_stats(
    gateway: &dyn Gateway,
    user_id: &str,
    today: NaiveDate,
) -> Result<ContributionStats> {
    let query = Query::new()
        .select("contribution_date,activity_count")
        .eq("user_id", user_id);
    let rows = gateway.query(tables::DAILY_CONTRIBUTIONS, &query).await?;
    let rows: Vec<DailyContribution> = decode_all(tables::DAILY_CONTRIBUTIONS, rows);
    Ok(summarize(&rows, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGateway;
    use proptest::prelude::*;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn contribution(date: &str, count: i64) -> DailyContribution {
        DailyContribution {
            user_id: Some("u1".into()),
            contribution_date: day(date),
            activity_count: count,
        }
    }

    #[test]
    fn test_streak_ending_today() {
        let rows = [
            contribution("2026-05-10", 1),
            contribution("2026-05-09", 2),
            contribution("2026-05-08", 1),
            contribution("2026-05-06", 4),
        ];
        let stats = summarize(&rows, day("2026-05-10"));
        assert_eq!(stats.streak, 3);
        assert_eq!(stats.total, 8);
    }

    #[test]
    fn test_streak_ending_yesterday() {
        let rows = [contribution("2026-05-09", 1), contribution("2026-05-08", 1)];
        assert_eq!(summarize(&rows, day("2026-05-10")).streak, 2);
    }

    #[test]
    fn test_streak_broken() {
        let rows = [contribution("2026-05-08", 1)];
        assert_eq!(summarize(&rows, day("2026-05-10")).streak, 0);
        assert_eq!(summarize(&[], day("2026-05-10")).streak, 0);
    }

    #[test]
    fn test_same_day_rows_are_summed() {
        let rows = [contribution("2026-05-10", 1), contribution("2026-05-10", 2)];
        let stats = summarize(&rows, day("2026-05-10"));
        assert_eq!(stats.days[&day("2026-05-10")], 3);
        assert_eq!(stats.level_on(day("2026-05-10")), 3);
    }

    #[test]
    fn test_heat_levels() {
        assert_eq!(heat_level(0), 0);
        assert_eq!(heat_level(2), 2);
        assert_eq!(heat_level(9), MAX_HEAT_LEVEL);
        assert_eq!(heat_level(-1), 0);
    }

    #[test]
    fn test_heat_grid_shape() {
        // 2026-05-13 is a Wednesday
        let rows = [contribution("2026-05-13", 5), contribution("2026-05-03", 1)];
        let stats = summarize(&rows, day("2026-05-13"));
        let grid = stats.heat_grid(day("2026-05-13"), 2);

        assert_eq!(grid.len(), 7);
        assert!(grid.iter().all(|row| row.len() == 2));
        assert_eq!(grid[3][1], Some(4));
        assert_eq!(grid[4][1], None);
        assert_eq!(grid[0][0], Some(1));
    }

    #[tokio::test]
    async fn test_load_stats_reads_own_rows() {
        let fake = FakeGateway::new();
        fake.seed(
            tables::DAILY_CONTRIBUTIONS,
            vec![
                json!({"user_id": "u1", "contribution_date": "2026-05-10", "activity_count": 2}),
                json!({"user_id": "u2", "contribution_date": "2026-05-10", "activity_count": 7}),
            ],
        );

        let stats = load_stats(&fake, "u1", day("2026-05-10")).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.streak, 1);
    }

    proptest! {
        #[test]
        fn prop_streak_never_exceeds_active_days(offsets in proptest::collection::btree_set(0i64..60, 0..40)) {
            let today = day("2026-05-10");
            let rows: Vec<_> = offsets
                .iter()
                .map(|o| DailyContribution {
                    user_id: None,
                    contribution_date: today - Duration::days(*o),
                    activity_count: 1,
                })
                .collect();
            let stats = summarize(&rows, today);
            prop_assert!(stats.streak as usize <= offsets.len());
            prop_assert_eq!(stats.total, offsets.len() as i64);
        }
    }
}
