//! Live windows over recent rows and optimistic likes.
//!
//! A [`LiveWindow`] holds the newest rows of one table and folds realtime
//! change events into them. Likes are applied locally first and recorded in
//! a [`LikeLog`]; the backend call settles the pending delta or reverts it.
//!
//! Merge rules for update events:
//! - columns present in the payload overwrite the held values
//! - the like count comes from the payload when present, plus any pending
//!   local delta, and never drops below the count already shown
//! - rows outside the window are ignored

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sow_api_client::{ChangeEvent, Gateway};
use sow_core::models::{tables, FeedbackEntry, RowId, SpeciesReport};
use sow_core::{Error, Result};
use sow_telemetry::{metrics, names};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A row that can be shown in a live window and liked.
pub trait FeedItem: Serialize + DeserializeOwned + Clone {
    /// Primary key.
    fn id(&self) -> &RowId;
    /// Like count as shown.
    fn likes(&self) -> i64;
    /// Replace the like count.
    fn set_likes(&mut self, likes: i64);
}

impl FeedItem for FeedbackEntry {
    fn id(&self) -> &RowId {
        &self.id
    }

    fn likes(&self) -> i64 {
        self.likes
    }

    fn set_likes(&mut self, likes: i64) {
        self.likes = likes;
    }
}

impl FeedItem for SpeciesReport {
    fn id(&self) -> &RowId {
        &self.id
    }

    fn likes(&self) -> i64 {
        self.likes
    }

    fn set_likes(&mut self, likes: i64) {
        self.likes = likes;
    }
}

/// What can be liked, and through which RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    /// A daily feedback entry
    Feedback,
    /// A species report
    Species,
}

impl LikeTarget {
    /// Increment function on the backend.
    pub fn rpc(&self) -> &'static str {
        match self {
            LikeTarget::Feedback => tables::RPC_INCREMENT_LIKES,
            LikeTarget::Species => tables::RPC_INCREMENT_SPECIES_LIKES,
        }
    }

    /// Table holding the counter.
    pub fn table(&self) -> &'static str {
        match self {
            LikeTarget::Feedback => tables::DAILY_FEEDBACKS,
            LikeTarget::Species => tables::SPECIES_REPORTS,
        }
    }
}

/// Ask the backend to increment a like counter by one.
pub async fn send_like(gateway: &dyn Gateway, target: LikeTarget, id: &RowId) -> Result<()> {
    gateway
        .rpc(target.rpc(), json!({ "row_id": id.to_value() }))
        .await
        .map(|_| ())
        .map_err(|e| Error::from(e).with_context(format!("Like on {} {}", target.table(), id)))
}

/// Like increments applied locally but not yet confirmed.
#[derive(Debug, Default, Clone)]
pub struct LikeLog {
    pending: HashMap<RowId, i64>,
}

impl LikeLog {
    /// Record an in-flight delta.
    pub fn record(&mut self, id: &RowId, delta: i64) {
        *self.pending.entry(id.clone()).or_insert(0) += delta;
    }

    /// Remove a delta once its call has finished, either way.
    pub fn settle(&mut self, id: &RowId, delta: i64) {
        if let Some(total) = self.pending.get_mut(id) {
            *total -= delta;
            if *total == 0 {
                self.pending.remove(id);
            }
        }
    }

    /// Sum of in-flight deltas for a row.
    pub fn pending(&self, id: &RowId) -> i64 {
        self.pending.get(id).copied().unwrap_or(0)
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of applying one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New row prepended
    Inserted,
    /// Insert for a row already shown
    Duplicate,
    /// Update merged into a shown row
    Merged,
    /// Update for a row not in the window
    OutOfWindow,
    /// Other table, or a payload that does not describe a row
    Ignored,
}

/// The newest rows of one table, newest first.
#[derive(Debug, Clone)]
pub struct LiveWindow<T> {
    table: &'static str,
    capacity: usize,
    items: Vec<T>,
    likes: LikeLog,
}

impl<T: FeedItem> LiveWindow<T> {
    /// Empty window over `table` holding at most `capacity` rows.
    pub fn new(table: &'static str, capacity: usize) -> Self {
        Self {
            table,
            capacity,
            items: Vec::with_capacity(capacity),
            likes: LikeLog::default(),
        }
    }

    /// Table this window follows.
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Maximum rows held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shown rows, newest first.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Shown row by id.
    pub fn get(&self, id: &RowId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// In-flight likes.
    pub fn like_log(&self) -> &LikeLog {
        &self.likes
    }

    /// Replace the contents with a fresh load (newest first).
    pub fn replace(&mut self, mut items: Vec<T>) {
        items.truncate(self.capacity);
        self.items = items;
    }

    /// Fold a change event into the window.
    pub fn apply(&mut self, event: &ChangeEvent) -> Applied {
        if event.table() != self.table {
            return Applied::Ignored;
        }
        let applied = match event {
            ChangeEvent::Insert { record, .. } => self.insert(record),
            ChangeEvent::Update { record, .. } => self.merge(record),
        };
        debug!(table = self.table, ?applied, "Change event applied");
        applied
    }

    fn insert(&mut self, record: &Value) -> Applied {
        let item: T = match serde_json::from_value(record.clone()) {
            Ok(item) => item,
            Err(e) => {
                warn!(table = self.table, error = %e, "Insert payload is not a row");
                return Applied::Ignored;
            }
        };
        if self.get(item.id()).is_some() {
            return Applied::Duplicate;
        }
        self.items.insert(0, item);
        self.items.truncate(self.capacity);
        Applied::Inserted
    }

    fn merge(&mut self, record: &Value) -> Applied {
        let Some(id) = record
            .get("id")
            .and_then(|v| serde_json::from_value::<RowId>(v.clone()).ok())
        else {
            return Applied::Ignored;
        };
        let Some(pos) = self.items.iter().position(|item| item.id() == &id) else {
            return Applied::OutOfWindow;
        };

        let held_likes = self.items[pos].likes();
        let Ok(Value::Object(mut fields)) = serde_json::to_value(&self.items[pos]) else {
            return Applied::Ignored;
        };
        if let Value::Object(patch) = record {
            for (column, value) in patch.iter().filter(|(column, _)| *column != "likes") {
                fields.insert(column.clone(), value.clone());
            }
        }
        let mut merged: T = match serde_json::from_value(Value::Object(fields)) {
            Ok(item) => item,
            Err(e) => {
                warn!(table = self.table, %id, error = %e, "Update payload does not fit the row");
                return Applied::Ignored;
            }
        };

        let likes = match record.get("likes").and_then(Value::as_i64) {
            Some(backend) => match self.likes.pending(&id) {
                0 => backend,
                pending => (backend + pending).max(held_likes),
            },
            None => held_likes,
        };
        merged.set_likes(likes);
        self.items[pos] = merged;
        Applied::Merged
    }

    /// Show a like immediately and record it as pending. Returns the new
    /// count.
    pub fn begin_like(&mut self, id: &RowId) -> Result<i64> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| Error::not_found(format!("entry {}", id)))?;
        let likes = item.likes() + 1;
        item.set_likes(likes);
        self.likes.record(id, 1);
        Ok(likes)
    }

    /// Settle a like started with [`begin_like`](Self::begin_like); on
    /// failure the local increment is taken back. Returns the shown count.
    pub fn finish_like(&mut self, id: &RowId, confirmed: bool) -> Option<i64> {
        self.likes.settle(id, 1);
        let item = self.items.iter_mut().find(|item| item.id() == id)?;
        if !confirmed {
            item.set_likes((item.likes() - 1).max(0));
            metrics().increment(names::LIKES_REVERTED);
        }
        Some(item.likes())
    }

    /// Optimistic like: local increment, backend increment, revert on
    /// failure.
    pub async fn like(&mut self, gateway: &dyn Gateway, target: LikeTarget, id: &RowId) -> Result<i64> {
        let shown = self.begin_like(id)?;
        metrics().increment(names::LIKES_SENT);
        let result = send_like(gateway, target, id).await;
        let count = self.finish_like(id, result.is_ok()).unwrap_or(shown);
        match result {
            Ok(()) => Ok(count),
            Err(e) => {
                warn!(%id, error = %e, "Like failed, reverted");
                Err(e)
            }
        }
    }
}
