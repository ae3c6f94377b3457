use chrono::{DateTime, Local};
use std::fmt;

const PREVIEW_CHARS: usize = 40;

/// A message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    pub topic: String,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if self.content.chars().count() > PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        write!(
            f,
            "{} - {}: {}{}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.topic,
            preview,
            ellipsis
        )
    }
}

impl MQTTMessage {
    pub fn from_topic(topic: impl Into<String>, content: impl Into<String>) -> Self {
        MQTTMessage {
            topic: topic.into(),
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    /// Builds a message from a raw publish payload; invalid UTF-8 is replaced.
    pub fn from_payload(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self::from_topic(topic, String::from_utf8_lossy(payload).into_owned())
    }

    /// Multi-line rendering: header line plus the payload, pretty-printed when
    /// it is JSON.
    pub fn render(&self) -> String {
        let body = serde_json::from_str::<serde_json::Value>(&self.content)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| self.content.clone());
        format!(
            "{}: {}\n{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.topic,
            body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_truncates_long_payloads() {
        let msg = MQTTMessage::from_topic("ozw/node/add", "x".repeat(100));
        let shown = msg.to_string();
        assert!(shown.contains("ozw/node/add"));
        assert!(shown.ends_with(&format!("{}...", "x".repeat(40))));
    }

    #[test]
    fn display_keeps_short_payloads_intact() {
        let msg = MQTTMessage::from_topic("t", "ok");
        assert!(msg.to_string().ends_with("t: ok"));
    }

    #[test]
    fn render_pretty_prints_json() {
        let msg = MQTTMessage::from_payload("ozw/action/return", br#"{"payload":{"rc":0}}"#);
        let rendered = msg.render();
        assert!(rendered.contains("ozw/action/return\n{"));
        assert!(rendered.contains("\"rc\": 0"));
    }

    #[test]
    fn render_falls_back_to_raw_text() {
        let msg = MQTTMessage::from_payload("raw", b"not json");
        assert!(rendered_ends_with(&msg, "not json"));
    }

    fn rendered_ends_with(msg: &MQTTMessage, tail: &str) -> bool {
        msg.render().ends_with(tail)
    }
}
