//! Realtime change listener.
//!
//! Opens the project's Phoenix websocket, joins one `postgres_changes`
//! channel per table and republishes every change into the client's
//! [`ChangeFeed`]. The connection is re-established after a fixed delay when
//! it drops; a [`ChangeKind::Resync`](crate::backend::ChangeKind::Resync) is
//! broadcast each time, since events may have been missed in between.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::SupabaseClient;
use crate::backend::{BackendError, ChangeFeed, ChangeKind, TableChange};

/// Phoenix closes idle sockets after 60 seconds without a heartbeat.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const PROTOCOL_VERSION: &str = "1.0.0";

/// A Phoenix channel frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

/// Websocket endpoint for a project URL.
///
/// # Errors
///
/// Returns `BackendError::InvalidRequest` if the URL cannot be rewritten to
/// a websocket scheme.
pub fn websocket_url(base_url: &Url, anon_key: &str) -> Result<Url, BackendError> {
    let mut url = base_url
        .join("realtime/v1/websocket")
        .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| BackendError::InvalidRequest(format!("cannot use {scheme} for {url}")))?;
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", PROTOCOL_VERSION);
    Ok(url)
}

fn topic(table: &str) -> String {
    format!("realtime:public:{table}")
}

fn join_message(table: &str, anon_key: &str, reference: usize) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic(table),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": anon_key,
        }),
        reference: Some(reference.to_string()),
    }
}

fn heartbeat_message(reference: usize) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Decode a `postgres_changes` frame.
///
/// Returns `None` for replies, heartbeats, presence and anything else that
/// is not a row change.
fn parse_change(message: &PhoenixMessage) -> Option<TableChange> {
    if message.event != "postgres_changes" {
        return None;
    }
    let data = message.payload.get("data")?;
    let table = data.get("table")?.as_str()?;
    let kind = match data.get("type")?.as_str()? {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        _ => return None,
    };
    let non_empty = |key: &str| {
        data.get(key)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .cloned()
    };

    Some(TableChange {
        table: table.to_string(),
        kind,
        record: non_empty("record"),
        old_record: non_empty("old_record"),
    })
}

/// Keep a realtime connection open for `tables`, forever.
pub fn spawn_listener(client: &SupabaseClient, tables: &[&str]) -> JoinHandle<()> {
    let base_url = client.base_url().clone();
    let anon_key = client.anon_key().expose_secret().to_string();
    let feed = client.changes().clone();
    let tables: Vec<String> = tables.iter().map(ToString::to_string).collect();

    tokio::spawn(async move {
        loop {
            match run_connection(&base_url, &anon_key, &tables, &feed).await {
                Ok(()) => tracing::info!("Realtime connection closed"),
                Err(e) => tracing::warn!(error = %e, "Realtime connection failed"),
            }
            feed.resync_all();
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn run_connection(
    base_url: &Url,
    anon_key: &str,
    tables: &[String],
    feed: &ChangeFeed,
) -> Result<(), BackendError> {
    let url = websocket_url(base_url, anon_key)?;
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| BackendError::Realtime(e.to_string()))?;
    let (mut sink, mut stream) = socket.split();

    let mut reference = 0usize;
    for table in tables {
        reference += 1;
        let frame = serde_json::to_string(&join_message(table, anon_key, reference))?;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| BackendError::Realtime(e.to_string()))?;
    }
    tracing::info!(tables = ?tables, "Realtime channels joined");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                reference += 1;
                let frame = serde_json::to_string(&heartbeat_message(reference))?;
                sink.send(Message::Text(frame))
                    .await
                    .map_err(|e| BackendError::Realtime(e.to_string()))?;
            }
            frame = stream.next() => match frame {
                None | Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Err(e)) => return Err(BackendError::Realtime(e.to_string())),
                Some(Ok(Message::Text(text))) => handle_frame(&text, feed),
                Some(Ok(_)) => {}
            }
        }
    }
}

fn handle_frame(text: &str, feed: &ChangeFeed) {
    let message: PhoenixMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable realtime frame");
            return;
        }
    };

    if message.event == "phx_error" || message.event == "system" {
        tracing::warn!(topic = %message.topic, payload = %message.payload, "Realtime channel notice");
    }

    if let Some(change) = parse_change(&message) {
        tracing::debug!(table = %change.table, kind = ?change.kind, "Realtime change");
        feed.publish(change);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn frame(value: Value) -> PhoenixMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_websocket_url() {
        let base = Url::parse("https://abcd.supabase.co/").unwrap();
        assert_eq!(
            websocket_url(&base, "key").unwrap().as_str(),
            "wss://abcd.supabase.co/realtime/v1/websocket?apikey=key&vsn=1.0.0"
        );

        let local = Url::parse("http://localhost:54321/").unwrap();
        assert_eq!(websocket_url(&local, "key").unwrap().scheme(), "ws");
    }

    #[test]
    fn test_join_message_shape() {
        let value = serde_json::to_value(join_message("products", "key", 1)).unwrap();
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0]["table"],
            "products"
        );
    }

    #[test]
    fn test_parse_insert() {
        let message = frame(json!({
            "topic": "realtime:public:products",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "products",
                    "type": "INSERT",
                    "record": { "id": "p1", "name": "Catan" },
                    "old_record": {}
                },
                "ids": [1]
            },
            "ref": null
        }));
        let change = parse_change(&message).unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.record.unwrap()["name"], "Catan");
        assert!(change.old_record.is_none());
    }

    #[test]
    fn test_parse_delete_carries_old_key() {
        let message = frame(json!({
            "topic": "realtime:public:products",
            "event": "postgres_changes",
            "payload": { "data": {
                "table": "products",
                "type": "DELETE",
                "old_record": { "id": "p1" }
            }}
        }));
        let change = parse_change(&message).unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert!(change.record.is_none());
        assert_eq!(change.old_record.unwrap()["id"], "p1");
    }

    #[test]
    fn test_ignores_non_change_frames() {
        let reply = frame(json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": { "status": "ok", "response": {} },
            "ref": "2"
        }));
        assert!(parse_change(&reply).is_none());
    }

    #[tokio::test]
    async fn test_handle_frame_publishes() {
        let feed = ChangeFeed::new();
        let mut products = feed.subscribe("products");
        handle_frame(
            r#"{"topic":"realtime:public:products","event":"postgres_changes","payload":{"data":{"table":"products","type":"UPDATE","record":{"id":"p1"},"old_record":{"id":"p1"}}},"ref":null}"#,
            &feed,
        );
        handle_frame("not json", &feed);
        let change = products.next().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
    }
}
