//! Realtime change feed over the Phoenix channel protocol.
//!
//! One websocket per subscription: join `realtime:public:<table>` asking for
//! `postgres_changes`, heartbeat every `ClientConfig::heartbeat`, and forward
//! insert/update payloads onto the subscription channel.

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{ChangeEvent, Subscription};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

/// Buffered events per subscription before the reader waits on the flow.
const CHANNEL_CAPACITY: usize = 64;

const JOIN_REF: &str = "1";

/// A Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    /// Channel topic
    pub topic: String,
    /// Event name (`phx_join`, `phx_reply`, `postgres_changes`, ...)
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub payload: Value,
    /// Message reference, echoed in replies
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    /// Reference of the join this message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Channel topic for a public table.
pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{table}")
}

/// `phx_join` asking for every change on `table`.
pub fn join_message(table: &str, access_token: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic_for(table),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token
        }),
        reference: Some(JOIN_REF.to_string()),
        join_ref: Some(JOIN_REF.to_string()),
    }
}

/// Connection-level heartbeat.
pub fn heartbeat_message(reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
        join_ref: None,
    }
}

/// Extract an insert/update from a channel frame.
///
/// Handles both the `postgres_changes` envelope and the older per-event
/// (`INSERT`/`UPDATE`) frames. Deletes and control frames yield `None`.
pub fn parse_change(message: &PhoenixMessage) -> Option<ChangeEvent> {
    let data = match message.event.as_str() {
        "postgres_changes" => message.payload.get("data")?,
        "INSERT" | "UPDATE" => &message.payload,
        _ => return None,
    };

    let table = data
        .get("table")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| message.topic.rsplit(':').next().map(str::to_string))?;
    let record = data.get("record").cloned()?;

    match data.get("type").and_then(Value::as_str)? {
        "INSERT" => Some(ChangeEvent::Insert { table, record }),
        "UPDATE" => Some(ChangeEvent::Update {
            table,
            record,
            old_record: data.get("old_record").cloned().filter(|v| !v.is_null()),
        }),
        _ => None,
    }
}

/// Open a websocket, join the table's channel and start the reader.
pub async fn subscribe(config: &ClientConfig, table: &str, access_token: &str) -> ApiResult<Subscription> {
    let (mut ws, _) = tokio_tungstenite::connect_async(config.realtime_url())
        .await
        .map_err(|e| ApiError::Realtime(format!("connect failed: {e}")))?;

    let join = serde_json::to_string(&join_message(table, access_token))?;
    ws.send(Message::Text(join))
        .await
        .map_err(|e| ApiError::Realtime(format!("join failed: {e}")))?;

    debug!(table, "Joined realtime channel");

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(run_channel(ws, tx, config.heartbeat, table.to_string()));
    Ok(Subscription::new(table, rx, Some(task)))
}

/// Read frames until the socket closes, the join is refused, or the
/// subscription is dropped.
async fn run_channel<S>(ws: S, tx: mpsc::Sender<ChangeEvent>, heartbeat: Duration, table: String)
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let mut ticker = tokio::time::interval(heartbeat);
    // The first tick completes immediately
    ticker.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = match serde_json::to_string(&heartbeat_message(next_ref)) {
                    Ok(frame) => frame,
                    Err(_) => break,
                };
                next_ref += 1;
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    warn!(%table, error = %e, "Realtime heartbeat failed");
                    break;
                }
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(%table, error = %e, "Realtime socket error");
                        break;
                    }
                };

                let Ok(message) = serde_json::from_str::<PhoenixMessage>(&text) else {
                    debug!(%table, "Ignoring unparseable realtime frame");
                    continue;
                };

                if is_refused_join(&message) {
                    warn!(%table, payload = %message.payload, "Realtime join refused");
                    break;
                }
                if matches!(message.event.as_str(), "phx_error" | "phx_close") {
                    warn!(%table, event = %message.event, "Realtime channel closed by server");
                    break;
                }

                if let Some(event) = parse_change(&message) {
                    if tx.send(event).await.is_err() {
                        // Subscription dropped
                        break;
                    }
                }
            }
        }
    }

    debug!(%table, "Realtime reader finished");
}

fn is_refused_join(message: &PhoenixMessage) -> bool {
    message.event == "phx_reply"
        && message.reference.as_deref() == Some(JOIN_REF)
        && message.payload.get("status").and_then(Value::as_str) != Some("ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_message_shape() {
        let join = join_message("daily_feedbacks", "token");
        let value = serde_json::to_value(&join).unwrap();
        assert_eq!(value["topic"], "realtime:public:daily_feedbacks");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0]["table"],
            "daily_feedbacks"
        );
        assert_eq!(value["payload"]["access_token"], "token");
    }

    #[test]
    fn test_heartbeat_message() {
        let value = serde_json::to_value(heartbeat_message(7)).unwrap();
        assert_eq!(value["topic"], "phoenix");
        assert_eq!(value["event"], "heartbeat");
        assert_eq!(value["ref"], "7");
        assert!(value.get("join_ref").is_none());
    }

    #[test]
    fn test_parse_postgres_changes_insert() {
        let frame: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:public:daily_feedbacks",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "INSERT",
                    "table": "daily_feedbacks",
                    "schema": "public",
                    "record": {"id": 5, "content": "白鷺鷥", "likes": 0}
                },
                "ids": [1]
            },
            "ref": null
        }))
        .unwrap();

        match parse_change(&frame) {
            Some(ChangeEvent::Insert { table, record }) => {
                assert_eq!(table, "daily_feedbacks");
                assert_eq!(record["id"], 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_legacy_update() {
        let frame: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:public:daily_feedbacks",
            "event": "UPDATE",
            "payload": {
                "type": "UPDATE",
                "record": {"id": 5, "likes": 3},
                "old_record": {"id": 5}
            },
            "ref": null
        }))
        .unwrap();

        match parse_change(&frame) {
            Some(ChangeEvent::Update { table, record, old_record }) => {
                assert_eq!(table, "daily_feedbacks");
                assert_eq!(record["likes"], 3);
                assert!(old_record.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_control_frames_are_not_changes() {
        let reply: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:public:daily_feedbacks",
            "event": "phx_reply",
            "payload": {"status": "ok", "response": {}},
            "ref": "1"
        }))
        .unwrap();
        assert!(parse_change(&reply).is_none());
        assert!(!is_refused_join(&reply));

        let refused = PhoenixMessage {
            payload: json!({"status": "error", "response": {"reason": "unauthorized"}}),
            ..reply
        };
        assert!(is_refused_join(&refused));
    }

    #[test]
    fn test_delete_is_ignored() {
        let frame: PhoenixMessage = serde_json::from_value(json!({
            "topic": "realtime:public:species_reports",
            "event": "postgres_changes",
            "payload": {"data": {"type": "DELETE", "table": "species_reports", "old_record": {"id": 1}}}
        }))
        .unwrap();
        assert!(parse_change(&frame).is_none());
    }
}
