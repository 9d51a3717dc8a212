//! End-to-end tests against the real router over WebSocket.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use watchparty_server::config::{HubSettings, SessionSettings};
use watchparty_server::hub::{Hub, HubHandle};

const TIMEOUT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn boot_with(settings: SessionSettings) -> (String, HubHandle) {
    let hub = Hub::spawn(HubSettings::default());
    let app = watchparty_server::app(hub.clone(), settings, None);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    (format!("ws://{addr}/ws"), hub)
}

async fn boot() -> (String, HubHandle) {
    boot_with(SessionSettings::default()).await
}

async fn join(url: &str, name: &str) -> Client {
    let (mut ws, _) = connect_async(url).await.unwrap();
    ws.send(WsMessage::Text(name.into())).await.unwrap();
    ws
}

async fn send_json(ws: &mut Client, v: Value) {
    ws.send(WsMessage::Text(v.to_string())).await.unwrap();
}

/// Read frames until one decodes to JSON matching `pred`; everything
/// skipped on the way is returned alongside it.
async fn next_matching(ws: &mut Client, pred: impl Fn(&Value) -> bool) -> (Value, Vec<Value>) {
    timeout(TIMEOUT, async {
        let mut skipped = Vec::new();
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let v: Value = serde_json::from_str(&text).unwrap();
                    if pred(&v) {
                        return (v, skipped);
                    }
                    skipped.push(v);
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting: {other:?}"),
            }
        }
    })
    .await
    .expect("no matching message in time")
}

async fn wait_until<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(TIMEOUT, async {
        while !cond().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// True once the server side has ended the connection.
async fn closed_by_server(ws: &mut Client) -> bool {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .unwrap_or(false)
}

fn has_type(v: &Value, kind: &str) -> bool {
    v["type"] == kind
}

fn roster(v: &Value) -> Vec<String> {
    let mut users: Vec<String> = v["users"]
        .as_array()
        .map(|a| a.iter().filter_map(|u| u.as_str().map(String::from)).collect())
        .unwrap_or_default();
    users.sort();
    users
}

#[tokio::test]
async fn newcomer_receives_default_playback_state() {
    let (url, _hub) = boot().await;
    let mut alice = join(&url, "alice").await;

    let (video, _) = next_matching(&mut alice, |v| has_type(v, "video")).await;
    assert_eq!(video["videoUrl"], "");
    assert_eq!(video["playbackState"], "pause");
    assert_eq!(video["currentTime"], 0.0);
}

#[tokio::test]
async fn presence_lists_everyone_to_everyone() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    wait_until(|| async { hub.member_count().await == 1 }).await;
    let mut bob = join(&url, "bob").await;

    let both = |v: &Value| has_type(v, "presence") && roster(v).len() == 2;
    for ws in [&mut alice, &mut bob] {
        let (presence, _) = next_matching(ws, both).await;
        assert_eq!(roster(&presence), vec!["alice", "bob"]);
    }

    // zero seeds follow the roster
    let (seed, _) = next_matching(&mut bob, |v| has_type(v, "watchHours") && v["sender"] == "alice").await;
    assert_eq!(seed["watchHours"], 0.0);
}

#[tokio::test]
async fn stopped_video_is_served_paused_on_sync() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;
    wait_until(|| async { hub.member_count().await == 2 }).await;

    send_json(
        &mut alice,
        json!({"type": "video", "videoUrl": "x", "playbackState": "stop", "currentTime": 12.5}),
    )
    .await;
    wait_until(|| async { hub.playback().await.video_url.as_deref() == Some("x") }).await;

    send_json(&mut bob, json!({"type": "sync", "timestamp": 1})).await;
    let (state, _) = next_matching(&mut bob, |v| has_type(v, "video") && v["videoUrl"] == "x").await;
    assert_eq!(state["playbackState"], "pause");
    assert_eq!(state["currentTime"], 12.5);
    assert_eq!(state["sender"], "alice");

    // neither the update nor the sync reply is echoed to alice
    send_json(&mut bob, json!({"type": "message", "content": "marker"})).await;
    let (_, skipped) = next_matching(&mut alice, |v| has_type(v, "message")).await;
    assert!(skipped.iter().all(|v| !(has_type(v, "video") && v["videoUrl"] == "x")));
}

#[tokio::test]
async fn watch_hours_reach_every_session_once() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;
    wait_until(|| async { hub.member_count().await == 2 }).await;

    send_json(&mut alice, json!({"type": "watchHours", "watchHours": 3.5})).await;

    let real = |v: &Value| has_type(v, "watchHours") && v["watchHours"] == 3.5;
    for ws in [&mut alice, &mut bob] {
        let (update, _) = next_matching(ws, real).await;
        assert_eq!(update["sender"], "alice");
    }
    assert_eq!(hub.watch_hours("alice").await, Some(3.5));
    assert_eq!(hub.watch_hours("bob").await, None);

    send_json(&mut alice, json!({"type": "message", "content": "marker"})).await;
    let (_, skipped) = next_matching(&mut bob, |v| has_type(v, "message")).await;
    assert!(!skipped.iter().any(real), "watch hours must not be delivered twice");
}

#[tokio::test]
async fn chat_is_relayed_with_server_assigned_sender() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;
    wait_until(|| async { hub.member_count().await == 2 }).await;

    send_json(&mut alice, json!({"type": "message", "sender": "mallory", "content": "hi"})).await;
    for ws in [&mut alice, &mut bob] {
        let (chat, _) = next_matching(ws, |v| has_type(v, "message")).await;
        assert_eq!(chat["sender"], "alice");
        assert_eq!(chat["content"], "hi");
        assert!(chat.get("videoUrl").is_none());
    }

    send_json(&mut bob, json!({"type": "typing"})).await;
    let (typing, _) = next_matching(&mut alice, |v| has_type(v, "typing")).await;
    assert_eq!(typing["sender"], "bob");
}

#[tokio::test]
async fn malformed_message_ends_only_that_session() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;
    wait_until(|| async { hub.member_count().await == 2 }).await;

    alice.send(WsMessage::Text("not json".into())).await.unwrap();
    assert!(closed_by_server(&mut alice).await);

    let (presence, _) = next_matching(&mut bob, |v| has_type(v, "presence") && roster(v) == ["bob"]).await;
    assert_eq!(roster(&presence), vec!["bob"]);
    assert_eq!(hub.member_names().await, vec!["bob".to_string()]);
}

#[tokio::test]
async fn oversized_message_ends_session() {
    let (url, hub) = boot().await;
    let mut alice = join(&url, "alice").await;
    wait_until(|| async { hub.member_count().await == 1 }).await;

    let content = "x".repeat(2048);
    let _ = alice
        .send(WsMessage::Text(json!({"type": "message", "content": content}).to_string()))
        .await;
    assert!(closed_by_server(&mut alice).await);
    wait_until(|| async { hub.member_count().await == 0 }).await;
}

#[tokio::test]
async fn silent_client_is_dropped_at_handshake() {
    let settings = SessionSettings { handshake_timeout: Duration::from_millis(200), ..SessionSettings::default() };
    let (url, hub) = boot_with(settings).await;

    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    assert!(closed_by_server(&mut ws).await);
    assert_eq!(hub.member_count().await, 0);
}

#[tokio::test]
async fn disconnect_updates_presence() {
    let (url, hub) = boot().await;
    let alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;
    wait_until(|| async { hub.member_count().await == 2 }).await;

    drop(alice);

    next_matching(&mut bob, |v| has_type(v, "presence") && roster(v) == ["bob"]).await;
    wait_until(|| async { hub.member_count().await == 1 }).await;
}
