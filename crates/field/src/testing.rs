//! In-memory gateway for exercising flows without a backend.
//!
//! Tables are vectors of JSON rows. Every call is recorded, any call kind can
//! be told to fail next, and tests push change events to subscribers.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sow_api_client::{
    ApiError, ApiResult, AuthUser, ChangeEvent, Filter, Gateway, Query, Session, Subscription,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

const FAKE_STORAGE_URL: &str = "https://fake.supabase.local/storage/v1/object/public";

/// Gateway operation, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CallKind {
    Insert,
    Query,
    Update,
    Rpc,
    Subscribe,
    Upload,
    Remove,
    Session,
    SignIn,
    SignOut,
    UpdatePassword,
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Operation
    pub kind: CallKind,
    /// Table, function, object path or email
    pub target: String,
    /// Row, patch or arguments sent
    pub payload: Value,
}

#[derive(Default)]
struct FakeState {
    tables: HashMap<String, Vec<Value>>,
    calls: Vec<Call>,
    failures: HashMap<CallKind, usize>,
    subscribers: HashMap<String, Vec<mpsc::Sender<ChangeEvent>>>,
    objects: BTreeMap<String, Vec<u8>>,
    users: HashMap<String, (String, AuthUser)>,
    next_id: i64,
}

/// In-memory [`Gateway`].
pub struct FakeGateway {
    state: Mutex<FakeState>,
    session: watch::Sender<Option<Session>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGateway {
    /// Empty tables, no users, signed out.
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            state: Mutex::new(FakeState {
                next_id: 1000,
                ..FakeState::default()
            }),
            session,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append rows to a table.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls of one kind, in order.
    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Make the next call of `kind` fail with a 503.
    pub fn fail_next(&self, kind: CallKind) {
        *self.lock().failures.entry(kind).or_default() += 1;
    }

    /// Deliver a change event to the table's subscribers. Returns how many
    /// subscribers received it.
    pub fn push_event(&self, event: ChangeEvent) -> usize {
        let mut state = self.lock();
        let Some(subscribers) = state.subscribers.get_mut(event.table()) else {
            return 0;
        };
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.try_send(event.clone()).is_ok())
            .count()
    }

    /// Number of live subscribers on a table.
    pub fn subscriber_count(&self, table: &str) -> usize {
        self.lock()
            .subscribers
            .get(table)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Stored object paths as `bucket/path`.
    pub fn objects(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Register an account for password sign-in.
    pub fn add_user(&self, email: &str, password: &str, user: AuthUser) {
        self.lock()
            .users
            .insert(email.to_string(), (password.to_string(), user));
    }

    /// Start a session for `user` without going through sign-in.
    pub fn sign_in_as(&self, user: AuthUser) -> Session {
        let session = fake_session(user);
        self.session.send_replace(Some(session.clone()));
        session
    }

    /// Password currently stored for an account.
    pub fn password_of(&self, email: &str) -> Option<String> {
        self.lock().users.get(email).map(|(pw, _)| pw.clone())
    }

    fn begin(&self, kind: CallKind, target: &str, payload: Value) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(Call {
            kind,
            target: target.to_string(),
            payload,
        });
        if let Some(pending) = state.failures.get_mut(&kind) {
            if *pending > 0 {
                *pending -= 1;
                return Err(ApiError::api_response(
                    503,
                    format!("injected {:?} failure", kind),
                ));
            }
        }
        Ok(state)
    }
}

/// An auth user with the given id and display name in its metadata.
pub fn auth_user(id: &str, full_name: Option<&str>) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        email: Some(format!("{id}@example.org")),
        user_metadata: full_name
            .map(|name| json!({ "full_name": name }))
            .unwrap_or_else(|| json!({})),
    }
}

fn fake_session(user: AuthUser) -> Session {
    Session {
        access_token: format!("token-{}", user.id),
        refresh_token: None,
        expires_in: Some(3600),
        user,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn rpc_table(function: &str) -> Option<&'static str> {
    match function {
        sow_core::models::tables::RPC_INCREMENT_LIKES => {
            Some(sow_core::models::tables::DAILY_FEEDBACKS)
        }
        sow_core::models::tables::RPC_INCREMENT_SPECIES_LIKES => {
            Some(sow_core::models::tables::SPECIES_REPORTS)
        }
        _ => None,
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn insert(&self, table: &str, record: Value) -> ApiResult<Value> {
        let mut state = self.begin(CallKind::Insert, table, record.clone())?;
        let Value::Object(mut row) = record else {
            return Err(ApiError::api_response(400, "row must be an object"));
        };
        if !row.contains_key("id") {
            state.next_id += 1;
            row.insert("id".into(), Value::from(state.next_id));
        }
        row.entry("created_at")
            .or_insert_with(|| Value::from(chrono::Utc::now().to_rfc3339()));
        let row = Value::Object(row);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn query(&self, table: &str, query: &Query) -> ApiResult<Vec<Value>> {
        let payload = Value::from(
            query
                .to_params()
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect::<Map<_, _>>(),
        );
        let state = self.begin(CallKind::Query, table, payload)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(&query.filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|key| {
                    let ord = compare(&a[&key.column], &b[&key.column]);
                    if key.ascending { ord } else { ord.reverse() }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> ApiResult<Vec<Value>> {
        let mut state = self.begin(CallKind::Update, table, patch.clone())?;
        let Value::Object(patch) = patch else {
            return Err(ApiError::api_response(400, "patch must be an object"));
        };
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches_all(filters, row)) {
                if let Value::Object(fields) = row {
                    for (k, v) in &patch {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn rpc(&self, function: &str, args: Value) -> ApiResult<Value> {
        let mut state = self.begin(CallKind::Rpc, function, args.clone())?;
        if let Some(table) = rpc_table(function) {
            let row_id = args.get("row_id").cloned().unwrap_or(Value::Null);
            let row = state
                .tables
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|row| row["id"] == row_id));
            match row {
                Some(Value::Object(fields)) => {
                    let likes = fields.get("likes").and_then(Value::as_i64).unwrap_or(0);
                    fields.insert("likes".into(), Value::from(likes + 1));
                }
                _ => return Err(ApiError::api_response(404, "row not found")),
            }
        }
        Ok(Value::Null)
    }

    async fn subscribe(&self, table: &str) -> ApiResult<Subscription> {
        let mut state = self.begin(CallKind::Subscribe, table, Value::Null)?;
        let (tx, rx) = mpsc::channel(64);
        state
            .subscribers
            .entry(table.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(table, rx, None))
    }

    async fn upload_file(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        let key = format!("{bucket}/{path}");
        let mut state = self.begin(
            CallKind::Upload,
            &key,
            json!({ "content_type": content_type, "size": bytes.len() }),
        )?;
        if state.objects.contains_key(&key) {
            return Err(ApiError::api_response(409, "The resource already exists"));
        }
        state.objects.insert(key.clone(), bytes);
        Ok(format!("{FAKE_STORAGE_URL}/{key}"))
    }

    async fn remove_file(&self, bucket: &str, path: &str) -> ApiResult<()> {
        let key = format!("{bucket}/{path}");
        let mut state = self.begin(CallKind::Remove, &key, Value::Null)?;
        match state.objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(ApiError::api_response(404, "Object not found")),
        }
    }

    async fn session(&self) -> ApiResult<Option<Session>> {
        drop(self.begin(CallKind::Session, "", Value::Null)?);
        Ok(self.session.borrow().clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<Session> {
        let state = self.begin(CallKind::SignIn, email, Value::Null)?;
        let user = match state.users.get(email) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => return Err(ApiError::api_response(400, "Invalid login credentials")),
        };
        drop(state);
        Ok(self.sign_in_as(user))
    }

    async fn sign_out(&self) -> ApiResult<()> {
        drop(self.begin(CallKind::SignOut, "", Value::Null)?);
        self.session.send_replace(None);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> ApiResult<()> {
        let mut state = self.begin(CallKind::UpdatePassword, "", Value::Null)?;
        let Some(user_id) = self.session.borrow().as_ref().map(|s| s.user.id.clone()) else {
            return Err(ApiError::NotSignedIn);
        };
        for (password, user) in state.users.values_mut() {
            if user.id == user_id {
                *password = new_password.to_string();
            }
        }
        Ok(())
    }

    fn on_auth_state_change(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let fake = FakeGateway::new();
        fake.seed(
            "locations",
            vec![
                json!({"location_name": "b", "branch": "台北分會"}),
                json!({"location_name": "a", "branch": "台北分會"}),
                json!({"location_name": "c", "branch": "台中分會"}),
            ],
        );

        let rows = fake
            .query("locations", &Query::new().eq("branch", "台北分會").order_asc("location_name").limit(5))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["location_name"].as_str().unwrap()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_fail_next_fails_once() {
        let fake = FakeGateway::new();
        fake.fail_next(CallKind::Insert);

        assert!(fake.insert("t", json!({"x": 1})).await.is_err());
        assert!(fake.insert("t", json!({"x": 1})).await.is_ok());
        assert_eq!(fake.calls_of(CallKind::Insert).len(), 2);
        assert_eq!(fake.rows("t").len(), 1);
    }

    #[tokio::test]
    async fn test_rpc_increments_likes() {
        let fake = FakeGateway::new();
        fake.seed("daily_feedbacks", vec![json!({"id": 7, "likes": 2})]);

        fake.rpc("increment_likes", json!({"row_id": 7})).await.unwrap();
        assert_eq!(fake.rows("daily_feedbacks")[0]["likes"], 3);
        assert!(fake.rpc("increment_likes", json!({"row_id": 8})).await.is_err());
    }

    #[tokio::test]
    async fn test_push_event_reaches_subscriber() {
        let fake = FakeGateway::new();
        let mut sub = fake.subscribe("daily_feedbacks").await.unwrap();

        let delivered = fake.push_event(ChangeEvent::Insert {
            table: "daily_feedbacks".into(),
            record: json!({"id": 1}),
        });
        assert_eq!(delivered, 1);
        assert!(sub.next().await.is_some());

        drop(sub);
        assert_eq!(fake.subscriber_count("daily_feedbacks"), 0);
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let fake = FakeGateway::new();
        fake.add_user("a@example.org", "secret", auth_user("u1", None));

        assert!(fake.sign_in_with_password("a@example.org", "wrong").await.is_err());
        let session = fake.sign_in_with_password("a@example.org", "secret").await.unwrap();
        assert_eq!(session.user.id, "u1");
        assert!(fake.session().await.unwrap().is_some());

        fake.update_password("changed").await.unwrap();
        assert_eq!(fake.password_of("a@example.org").as_deref(), Some("changed"));
    }
}
