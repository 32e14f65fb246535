//! Daily feedback: a random prompt, the volunteer's answer, and a live feed
//! of recent answers that can be liked.

use crate::likes::{Applied, LikeTarget, LiveWindow};
use crate::rows::{decode, decode_all};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use sow_api_client::{ChangeEvent, Gateway, Query, Subscription};
use sow_core::config::FeedbackConfig;
use sow_core::models::{tables, FeedbackEntry, NewFeedback, Profile, RowId};
use sow_core::vocab::FEEDBACK_QUESTIONS;
use sow_core::{Error, Result};
use sow_telemetry::{metrics, names};
use std::sync::Arc;
use tracing::{info, instrument};

/// Feedback composer plus live feed.
pub struct FeedbackFlow {
    gateway: Arc<dyn Gateway>,
    profile: Profile,
    rng: StdRng,
    question: &'static str,
    draft: String,
    location_label: Option<String>,
    feed: LiveWindow<FeedbackEntry>,
    subscription: Option<Subscription>,
}

impl FeedbackFlow {
    /// Composer for `profile` with a freshly rolled prompt.
    pub fn new(gateway: Arc<dyn Gateway>, profile: Profile, config: &FeedbackConfig) -> Self {
        Self::with_rng(gateway, profile, config, StdRng::from_os_rng())
    }

    /// Same, with a seeded prompt sequence.
    pub fn with_seed(
        gateway: Arc<dyn Gateway>,
        profile: Profile,
        config: &FeedbackConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(gateway, profile, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        gateway: Arc<dyn Gateway>,
        profile: Profile,
        config: &FeedbackConfig,
        mut rng: StdRng,
    ) -> Self {
        let question = pick_question(&mut rng);
        Self {
            gateway,
            profile,
            rng,
            question,
            draft: String::new(),
            location_label: None,
            feed: LiveWindow::new(tables::DAILY_FEEDBACKS, config.window),
            subscription: None,
        }
    }

    /// Prompt currently shown.
    pub fn question(&self) -> &'static str {
        self.question
    }

    /// Roll a new prompt, uniformly from the full set.
    pub fn reroll(&mut self) -> &'static str {
        self.question = pick_question(&mut self.rng);
        self.question
    }

    /// Answer being composed.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the answer being composed.
    pub fn set_draft(&mut self, content: impl Into<String>) {
        self.draft = content.into();
    }

    /// Tag submissions with where they were written (e.g. the check-in site).
    pub fn set_location_label(&mut self, label: Option<String>) {
        self.location_label = label.filter(|l| !l.trim().is_empty());
    }

    /// Send the draft. On success the draft is cleared, the entry shows up
    /// in the feed and a new prompt is rolled; on failure the draft is kept.
    #[instrument(skip(self), fields(user_id = %self.profile.id))]
    pub async fn submit(&mut self) -> Result<FeedbackEntry> {
        let content = self.draft.trim();
        if content.is_empty() {
            return Err(Error::validation("Write an answer before sending"));
        }

        let record = NewFeedback {
            user_id: self.profile.id.clone(),
            question: self.question.to_string(),
            content: content.to_string(),
            location_name: self.location_label.clone(),
            branch: self.profile.branch_or_unset().to_string(),
            volunteer_group: self.profile.group_or_unset().to_string(),
            likes: 0,
        };

        let row = self
            .gateway
            .insert(tables::DAILY_FEEDBACKS, serde_json::to_value(&record)?)
            .await
            .map_err(|e| Error::from(e).with_context("Feedback was not sent"))?;

        self.feed.apply(&ChangeEvent::Insert {
            table: tables::DAILY_FEEDBACKS.to_string(),
            record: row.clone(),
        });
        let entry: FeedbackEntry = decode(row)?;

        metrics().increment(names::FEEDBACK_SUBMITTED);
        info!(id = %entry.id, "Feedback sent");
        self.draft.clear();
        self.reroll();
        Ok(entry)
    }

    /// Load the newest entries into the feed.
    pub async fn load_recent(&mut self) -> Result<&[FeedbackEntry]> {
        let query = Query::new()
            .order_desc("created_at")
            .limit(self.feed.capacity());
        let rows = self.gateway.query(tables::DAILY_FEEDBACKS, &query).await?;
        self.feed.replace(decode_all(tables::DAILY_FEEDBACKS, rows));
        Ok(self.feed.items())
    }

    /// Start receiving inserts and updates.
    pub async fn subscribe(&mut self) -> Result<()> {
        self.subscription = Some(self.gateway.subscribe(tables::DAILY_FEEDBACKS).await?);
        Ok(())
    }

    /// Stop receiving change events.
    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }

    /// Wait for and apply the next change event. `None` when not subscribed
    /// or the feed has ended.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.subscription.as_mut()?.next().await?;
        Some(self.apply(&event))
    }

    /// Apply every event already delivered. Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.apply(&event);
            count += 1;
        }
        count
    }

    /// Fold one change event into the feed.
    pub fn apply(&mut self, event: &ChangeEvent) -> Applied {
        metrics().increment(names::REALTIME_EVENTS);
        self.feed.apply(event)
    }

    /// Feed entries, newest first.
    pub fn entries(&self) -> &[FeedbackEntry] {
        self.feed.items()
    }

    /// Optimistically like an entry in the feed. Returns the shown count.
    pub async fn like(&mut self, id: &RowId) -> Result<i64> {
        self.feed
            .like(self.gateway.as_ref(), LikeTarget::Feedback, id)
            .await
    }
}

fn pick_question(rng: &mut StdRng) -> &'static str {
    FEEDBACK_QUESTIONS
        .choose(rng)
        .copied()
        .unwrap_or(FEEDBACK_QUESTIONS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, FakeGateway};
    use serde_json::json;

    fn profile() -> Profile {
        serde_json::from_value(json!({
            "id": "u1",
            "full_name": "林小明",
            "branch": "台北分會",
            "volunteer_group": "解說教育組",
        }))
        .unwrap()
    }

    fn flow(fake: &Arc<FakeGateway>) -> FeedbackFlow {
        FeedbackFlow::with_seed(fake.clone(), profile(), &FeedbackConfig::default(), 7)
    }

    #[tokio::test]
    async fn test_questions_come_from_fixed_set() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        for _ in 0..50 {
            assert!(FEEDBACK_QUESTIONS.contains(&flow.reroll()));
        }
    }

    #[tokio::test]
    async fn test_reroll_visits_several_prompts() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        let mut seen: Vec<&str> = (0..100).map(|_| flow.reroll()).collect();
        seen.sort();
        seen.dedup();
        assert!(seen.len() > 5);
    }

    #[tokio::test]
    async fn test_empty_draft_is_rejected() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        flow.set_draft("   ");

        assert!(flow.submit().await.is_err());
        assert!(fake.calls_of(CallKind::Insert).is_empty());
    }

    #[tokio::test]
    async fn test_submit_writes_tagged_entry() {
        let fake = Arc::new(FakeGateway::new());
        let mut flow = flow(&fake);
        let question = flow.question();
        flow.set_location_label(Some("大安森林公園".into()));
        flow.set_draft("看到五色鳥！");

        let entry = flow.submit().await.unwrap();
        assert_eq!(entry.question, question);
        assert_eq!(entry.likes, 0);
        assert!(flow.draft().is_empty());
        assert_eq!(flow.entries().len(), 1);

        let row = &fake.rows(tables::DAILY_FEEDBACKS)[0];
        assert_eq!(row["branch"], "台北分會");
        assert_eq!(row["volunteer_group"], "解說教育組");
        assert_eq!(row["location_name"], "大安森林公園");
        assert_eq!(row["content"], "看到五色鳥！");
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_draft() {
        let fake = Arc::new(FakeGateway::new());
        fake.fail_next(CallKind::Insert);
        let mut flow = flow(&fake);
        flow.set_draft("看到五色鳥！");
        let question = flow.question();

        let err = flow.submit().await.unwrap_err();
        assert_eq!(err.code, sow_core::ErrorCode::BackendError);
        assert_eq!(flow.draft(), "看到五色鳥！");
        assert_eq!(flow.question(), question);
    }

    #[tokio::test]
    async fn test_live_feed_follows_events() {
        let fake = Arc::new(FakeGateway::new());
        fake.seed(
            tables::DAILY_FEEDBACKS,
            (1..=3).map(|i| json!({"id": i, "question": "q", "content": format!("c{i}"), "likes": 0, "created_at": format!("2026-05-0{i}T08:00:00Z")})),
        );
        let mut flow = flow(&fake);
        flow.load_recent().await.unwrap();
        assert_eq!(flow.entries()[0].id, RowId::Int(3));

        flow.subscribe().await.unwrap();
        fake.push_event(ChangeEvent::Insert {
            table: tables::DAILY_FEEDBACKS.into(),
            record: json!({"id": 4, "question": "q", "content": "c4", "likes": 0}),
        });
        fake.push_event(ChangeEvent::Update {
            table: tables::DAILY_FEEDBACKS.into(),
            record: json!({"id": 2, "likes": 9}),
            old_record: None,
        });

        assert_eq!(flow.next_event().await, Some(Applied::Inserted));
        assert_eq!(flow.drain_events(), 1);
        assert_eq!(flow.entries().len(), 4);
        assert_eq!(flow.entries()[0].id, RowId::Int(4));
        assert_eq!(flow.entries().iter().find(|e| e.id == RowId::Int(2)).unwrap().likes, 9);

        flow.unsubscribe();
        assert_eq!(fake.subscriber_count(tables::DAILY_FEEDBACKS), 0);
    }

    #[tokio::test]
    async fn test_like_then_failure_reverts() {
        let fake = Arc::new(FakeGateway::new());
        fake.seed(
            tables::DAILY_FEEDBACKS,
            vec![json!({"id": 1, "question": "q", "content": "c", "likes": 0})],
        );
        let mut flow = flow(&fake);
        flow.load_recent().await.unwrap();

        fake.fail_next(CallKind::Rpc);
        assert!(flow.like(&RowId::Int(1)).await.is_err());
        assert_eq!(flow.entries()[0].likes, 0);

        assert_eq!(flow.like(&RowId::Int(1)).await.unwrap(), 1);
    }
}
