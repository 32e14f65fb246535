//! The species wall: latest sightings, live, with likes.

use crate::likes::{Applied, LikeTarget, LiveWindow};
use crate::rows::decode_all;
use sow_api_client::{Gateway, Query, Subscription};
use sow_core::models::{tables, RowId, SpeciesReport};
use sow_core::Result;
use sow_telemetry::{metrics, names};
use std::sync::Arc;

/// Number of reports on the wall.
pub const WALL_SIZE: usize = 10;

/// Latest species reports, newest first.
pub struct SpeciesWall {
    gateway: Arc<dyn Gateway>,
    reports: LiveWindow<SpeciesReport>,
    subscription: Option<Subscription>,
}

impl SpeciesWall {
    /// Empty wall.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            reports: LiveWindow::new(tables::SPECIES_REPORTS, WALL_SIZE),
            subscription: None,
        }
    }

    /// Load the latest reports.
    pub async fn load(&mut self) -> Result<&[SpeciesReport]> {
        let query = Query::new().order_desc("created_at").limit(WALL_SIZE);
        let rows = self.gateway.query(tables::SPECIES_REPORTS, &query).await?;
        self.reports
            .replace(decode_all(tables::SPECIES_REPORTS, rows));
        Ok(self.reports.items())
    }

    /// Follow new and updated reports.
    pub async fn subscribe(&mut self) -> Result<()> {
        self.subscription = Some(self.gateway.subscribe(tables::SPECIES_REPORTS).await?);
        Ok(())
    }

    /// Wait for and apply the next change event.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.subscription.as_mut()?.next().await?;
        metrics().increment(names::REALTIME_EVENTS);
        Some(self.reports.apply(&event))
    }

    /// Reports on the wall.
    pub fn reports(&self) -> &[SpeciesReport] {
        self.reports.items()
    }

    /// Optimistically like a report. Returns the shown count.
    pub async fn like(&mut self, id: &RowId) -> Result<i64> {
        self.reports
            .like(self.gateway.as_ref(), LikeTarget::Species, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, FakeGateway};
    use serde_json::json;
    use sow_api_client::ChangeEvent;

    fn report(id: i64, day: u32) -> serde_json::Value {
        json!({
            "id": id,
            "species_name": format!("species {id}"),
            "likes": 0,
            "created_at": format!("2026-04-{day:02}T09:00:00Z"),
        })
    }

    #[tokio::test]
    async fn test_wall_shows_latest_ten() {
        let fake = Arc::new(FakeGateway::new());
        fake.seed(tables::SPECIES_REPORTS, (1..=15).map(|i| report(i, i as u32)));

        let mut wall = SpeciesWall::new(fake.clone());
        let reports = wall.load().await.unwrap();
        assert_eq!(reports.len(), WALL_SIZE);
        assert_eq!(reports[0].id, RowId::Int(15));
        assert_eq!(reports[9].id, RowId::Int(6));
    }

    #[tokio::test]
    async fn test_species_like_uses_species_rpc() {
        let fake = Arc::new(FakeGateway::new());
        fake.seed(tables::SPECIES_REPORTS, vec![report(1, 1)]);
        let mut wall = SpeciesWall::new(fake.clone());
        wall.load().await.unwrap();

        assert_eq!(wall.like(&RowId::Int(1)).await.unwrap(), 1);
        assert_eq!(fake.calls_of(CallKind::Rpc)[0].target, "increment_species_likes");
        assert_eq!(fake.rows(tables::SPECIES_REPORTS)[0]["likes"], 1);
    }

    #[tokio::test]
    async fn test_new_report_appears_on_top() {
        let fake = Arc::new(FakeGateway::new());
        fake.seed(tables::SPECIES_REPORTS, (1..=10).map(|i| report(i, i as u32)));
        let mut wall = SpeciesWall::new(fake.clone());
        wall.load().await.unwrap();
        wall.subscribe().await.unwrap();

        fake.push_event(ChangeEvent::Insert {
            table: tables::SPECIES_REPORTS.into(),
            record: report(11, 20),
        });
        assert_eq!(wall.next_event().await, Some(Applied::Inserted));
        assert_eq!(wall.reports().len(), WALL_SIZE);
        assert_eq!(wall.reports()[0].id, RowId::Int(11));
    }
}
