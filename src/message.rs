//! Wire record exchanged with clients.
//!
//! A single flat JSON object discriminated by `type`; every other field is
//! optional and left out of the encoding when absent.

use serde::{Deserialize, Serialize};

pub const STATE_PAUSE: &str = "pause";
pub const STATE_STOP: &str = "stop";

/// The `type` tag. Unknown tags are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Message,
    Presence,
    Video,
    Sync,
    WatchHours,
    Other(String),
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "message" => MessageKind::Message,
            "presence" => MessageKind::Presence,
            "video" => MessageKind::Video,
            "sync" => MessageKind::Sync,
            "watchHours" => MessageKind::WatchHours,
            _ => MessageKind::Other(tag),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Message => "message".into(),
            MessageKind::Presence => "presence".into(),
            MessageKind::Video => "video".into(),
            MessageKind::Sync => "sync".into(),
            MessageKind::WatchHours => "watchHours".into(),
            MessageKind::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_hours: Option<f64>,
}

impl Message {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            sender: None,
            content: None,
            users: None,
            video_url: None,
            playback_state: None,
            current_time: None,
            queue: None,
            index: None,
            watch_hours: None,
        }
    }

    /// Playback state before anyone has pushed a `video` update.
    pub fn initial_playback() -> Self {
        Self {
            video_url: Some(String::new()),
            playback_state: Some(STATE_PAUSE.into()),
            current_time: Some(0.0),
            queue: Some(Vec::new()),
            index: Some(0),
            ..Self::new(MessageKind::Video)
        }
    }

    pub fn presence(users: Vec<String>) -> Self {
        Self { users: Some(users), ..Self::new(MessageKind::Presence) }
    }

    pub fn watch_hours(sender: &str, hours: f64) -> Self {
        Self {
            sender: Some(sender.to_string()),
            watch_hours: Some(hours),
            ..Self::new(MessageKind::WatchHours)
        }
    }

    /// `stop` is never stored; it collapses to `pause`.
    pub fn normalize_playback(&mut self) {
        if self.playback_state.as_deref() == Some(STATE_STOP) {
            self.playback_state = Some(STATE_PAUSE.into());
        }
    }

    pub fn decode(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn absent_fields_are_omitted() {
        let msg = Message::presence(vec!["alice".into()]);
        let v: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v, json!({"type": "presence", "users": ["alice"]}));
    }

    #[test]
    fn decodes_minimal_and_ignores_unknown_fields() {
        let msg = Message::decode(br#"{"type":"sync","timestamp":1700000000000}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Sync);
        assert!(msg.sender.is_none());
    }

    #[test]
    fn camel_case_video_fields() {
        let raw = br#"{"type":"video","videoUrl":"x","playbackState":"play","currentTime":12.5,"queue":["a","b"],"index":1}"#;
        let msg = Message::decode(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Video);
        assert_eq!(msg.video_url.as_deref(), Some("x"));
        assert_eq!(msg.current_time, Some(12.5));
        assert_eq!(msg.queue.as_ref().map(Vec::len), Some(2));
        assert_eq!(msg.index, Some(1));
    }

    #[test]
    fn unknown_type_round_trips_verbatim() {
        let msg = Message::decode(br#"{"type":"typing","content":"..."}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Other("typing".into()));
        let v: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "typing");
    }

    #[test]
    fn watch_hours_tag_is_camel_case() {
        let v: Value = serde_json::to_value(Message::watch_hours("bob", 0.0)).unwrap();
        assert_eq!(v, json!({"type": "watchHours", "sender": "bob", "watchHours": 0.0}));
    }

    #[test]
    fn stop_normalizes_to_pause() {
        let mut msg = Message::initial_playback();
        msg.playback_state = Some("stop".into());
        msg.normalize_playback();
        assert_eq!(msg.playback_state.as_deref(), Some("pause"));

        msg.playback_state = Some("play".into());
        msg.normalize_playback();
        assert_eq!(msg.playback_state.as_deref(), Some("play"));
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(Message::decode(br#"{"content":"hi"}"#).is_err());
        assert!(Message::decode(b"not json").is_err());
    }
}
