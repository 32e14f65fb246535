//! The remote data gateway seam.
//!
//! Flows depend on [`Gateway`] rather than on HTTP, so they can run against
//! the Supabase implementation or an in-memory fake.

use crate::error::ApiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Filter on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column >= value`
    Gte(String, Value),
    /// `column <= value`
    Lte(String, Value),
}

impl Filter {
    /// Column the filter applies to.
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) => c,
        }
    }

    /// PostgREST query parameter `(column, "op.value")`.
    pub fn to_param(&self) -> (String, String) {
        let (op, value) = match self {
            Filter::Eq(_, v) => ("eq", v),
            Filter::Gte(_, v) => ("gte", v),
            Filter::Lte(_, v) => ("lte", v),
        };
        (self.column().to_string(), format!("{op}.{}", scalar(value)))
    }

    /// Whether a row satisfies the filter. Used by in-memory gateways.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(actual) = row.get(self.column()) else {
            return false;
        };
        match self {
            Filter::Eq(_, v) => actual == v || scalar(actual) == scalar(v),
            Filter::Gte(_, v) => compare(actual, v).is_some_and(|o| o.is_ge()),
            Filter::Lte(_, v) => compare(actual, v).is_some_and(|o| o.is_le()),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        // ISO timestamps and dates order lexically
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Column to sort by
    pub column: String,
    /// Ascending when true
    pub ascending: bool,
}

/// A read against one table or view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Column list / embedded resources, `*` when unset
    pub select: Option<String>,
    /// Filters, all of which must hold
    pub filters: Vec<Filter>,
    /// Sort keys in priority order
    pub order: Vec<Order>,
    /// Maximum rows returned
    pub limit: Option<usize>,
}

impl Query {
    /// Select every column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the select clause.
    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    /// Add a lower bound.
    #[must_use]
    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    /// Add an upper bound.
    #[must_use]
    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    /// Sort ascending by `column`.
    #[must_use]
    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending: true,
        });
        self
    }

    /// Sort descending by `column`.
    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending: false,
        });
        self
    }

    /// Cap the number of rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// PostgREST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// A row change pushed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A row was inserted
    Insert {
        /// Table name
        table: String,
        /// The new row
        record: Value,
    },
    /// A row was updated; `record` may carry only some columns
    Update {
        /// Table name
        table: String,
        /// New column values
        record: Value,
        /// Previous values, when the table publishes them
        old_record: Option<Value>,
    },
}

impl ChangeEvent {
    /// Table the event belongs to.
    pub fn table(&self) -> &str {
        match self {
            ChangeEvent::Insert { table, .. } | ChangeEvent::Update { table, .. } => table,
        }
    }

    /// The new row values.
    pub fn record(&self) -> &Value {
        match self {
            ChangeEvent::Insert { record, .. } | ChangeEvent::Update { record, .. } => record,
        }
    }
}

/// Live change feed for one table.
///
/// Events arrive in backend order. Dropping the subscription stops the
/// background reader and leaves the channel.
pub struct Subscription {
    table: String,
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver, optionally owning the task that feeds it.
    pub fn new(
        table: impl Into<String>,
        events: mpsc::Receiver<ChangeEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            table: table.into(),
            events,
            task,
        }
    }

    /// Table this subscription listens to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Wait for the next event. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(table = %self.table, "Realtime subscription released");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("table", &self.table)
            .field("owns_task", &self.task.is_some())
            .finish()
    }
}

/// The authenticated user behind a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    /// User id, also the profile id
    pub id: String,
    /// Sign-in email
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata from the identity provider
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    /// `full_name` (or `name`) from the identity metadata.
    pub fn metadata_full_name(&self) -> Option<&str> {
        ["full_name", "name"]
            .iter()
            .find_map(|key| self.user_metadata.get(*key).and_then(Value::as_str))
            .filter(|name| !name.trim().is_empty())
    }
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for authenticated calls
    pub access_token: String,
    /// Token for refreshing the session
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, as issued
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// The user
    pub user: AuthUser,
}

/// Remote data gateway: tables, RPC, realtime, storage and auth.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, record: Value) -> ApiResult<Value>;

    /// Read rows.
    async fn query(&self, table: &str, query: &Query) -> ApiResult<Vec<Value>>;

    /// Patch every row matching `filters`; returns the updated rows.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> ApiResult<Vec<Value>>;

    /// Call a database function.
    async fn rpc(&self, function: &str, args: Value) -> ApiResult<Value>;

    /// Subscribe to inserts and updates on a table.
    async fn subscribe(&self, table: &str) -> ApiResult<Subscription>;

    /// Upload an object and return its public URL.
    async fn upload_file(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String>;

    /// Delete an object.
    async fn remove_file(&self, bucket: &str, path: &str) -> ApiResult<()>;

    /// The current session, if any.
    async fn session(&self) -> ApiResult<Option<Session>>;

    /// Password sign-in.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<Session>;

    /// End the current session.
    async fn sign_out(&self) -> ApiResult<()>;

    /// Change the signed-in user's password.
    async fn update_password(&self, new_password: &str) -> ApiResult<()>;

    /// Session changes: a new value on every sign-in and sign-out.
    fn on_auth_state_change(&self) -> watch::Receiver<Option<Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_params() {
        let q = Query::new()
            .select("location_name, latitude, longitude")
            .eq("branch", "台北分會")
            .order_asc("location_name");

        assert_eq!(
            q.to_params(),
            vec![
                ("select".to_string(), "location_name, latitude, longitude".to_string()),
                ("branch".to_string(), "eq.台北分會".to_string()),
                ("order".to_string(), "location_name.asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_range_and_limit() {
        let params = Query::new()
            .gte("created_at", "2024-05-01T00:00:00")
            .lte("created_at", "2024-05-31T23:59:59")
            .order_desc("created_at")
            .limit(20)
            .to_params();

        assert!(params.contains(&("created_at".into(), "gte.2024-05-01T00:00:00".into())));
        assert!(params.contains(&("created_at".into(), "lte.2024-05-31T23:59:59".into())));
        assert!(params.contains(&("order".into(), "created_at.desc".into())));
        assert!(params.contains(&("limit".into(), "20".into())));
    }

    #[test]
    fn test_filter_matches() {
        let row = json!({"id": 3, "branch": "台北分會", "created_at": "2024-05-02T08:00:00+00:00"});
        assert!(Filter::Eq("id".into(), json!(3)).matches(&row));
        assert!(Filter::Eq("id".into(), json!("3")).matches(&row));
        assert!(!Filter::Eq("branch".into(), json!("花蓮分會")).matches(&row));
        assert!(Filter::Gte("created_at".into(), json!("2024-05-02T00:00:00")).matches(&row));
        assert!(!Filter::Lte("created_at".into(), json!("2024-05-01T23:59:59")).matches(&row));
        assert!(!Filter::Eq("missing".into(), json!(1)).matches(&row));
    }

    #[test]
    fn test_metadata_full_name() {
        let user = AuthUser {
            id: "u1".into(),
            email: None,
            user_metadata: json!({"name": "Lin"}),
        };
        assert_eq!(user.metadata_full_name(), Some("Lin"));

        let blank = AuthUser {
            user_metadata: json!({"full_name": " "}),
            ..user
        };
        assert_eq!(blank.metadata_full_name(), None);
    }

    #[tokio::test]
    async fn test_subscription_delivers_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new("daily_feedbacks", rx, None);
        tx.send(ChangeEvent::Insert {
            table: "daily_feedbacks".into(),
            record: json!({"id": 1}),
        })
        .await
        .unwrap();
        tx.send(ChangeEvent::Update {
            table: "daily_feedbacks".into(),
            record: json!({"id": 1, "likes": 2}),
            old_record: None,
        })
        .await
        .unwrap();
        drop(tx);

        assert!(matches!(sub.next().await, Some(ChangeEvent::Insert { .. })));
        assert_eq!(sub.next().await.unwrap().record()["likes"], 2);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_aborts_reader() {
        let (_tx, rx) = mpsc::channel::<ChangeEvent>(1);
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive_tx;
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        let sub = Subscription::new("daily_feedbacks", rx, Some(task));

        drop(sub);
        // The reader's future is dropped on abort, closing the oneshot
        assert!(alive_rx.await.is_err());
    }
}
