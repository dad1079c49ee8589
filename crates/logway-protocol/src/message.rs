/// Log message wire types and the two accepted ingestion shapes.
///
/// Agents either POST a full envelope (`{id?, agentId, messages: [...]}`)
/// or a bare array of messages. Bare strings inside either shape are
/// lifted to INFO-level messages from an unknown source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a single log message. Serialized uppercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log message as submitted by an agent and as forwarded to an
/// analyzer. The dispatch wire form always carries a timestamp; the
/// gateway fills it at ingest when the agent omitted one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message source must not be empty")]
    EmptySource,
    #[error("message body must not be empty")]
    EmptyMessage,
}

impl LogMessage {
    /// Field validation applied at the ingress boundary. The level is
    /// already enforced by the type; unknown levels fail to parse.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.source.trim().is_empty() {
            return Err(MessageError::EmptySource);
        }
        if self.message.trim().is_empty() {
            return Err(MessageError::EmptyMessage);
        }
        Ok(())
    }

    /// Fill the timestamp with the current wall clock if absent.
    pub fn fill_timestamp(&mut self) {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }
}

/// A message element inside a submission: either structured or a bare
/// string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Structured(LogMessage),
    Text(String),
}

impl IncomingMessage {
    /// Lift bare strings to `{level: INFO, source: "unknown"}`.
    pub fn into_message(self) -> LogMessage {
        match self {
            Self::Structured(msg) => msg,
            Self::Text(text) => LogMessage {
                id: None,
                timestamp: None,
                level: LogLevel::Info,
                source: "unknown".to_string(),
                message: text,
                metadata: None,
            },
        }
    }
}

/// Envelope form of a submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    pub agent_id: String,
    pub messages: Vec<IncomingMessage>,
}

/// The two accepted bodies of `POST /logs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LogSubmission {
    Envelope(LogEnvelope),
    Batch(Vec<IncomingMessage>),
}

impl LogSubmission {
    /// Client-supplied packet id, when the envelope form carried one.
    /// Ids are opaque; no uniqueness check is performed.
    pub fn packet_id(&self) -> Option<&str> {
        match self {
            Self::Envelope(env) => env.id.as_deref(),
            Self::Batch(_) => None,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Envelope(env) => Some(&env.agent_id),
            Self::Batch(_) => None,
        }
    }

    /// Flatten into plain messages, lifting bare strings.
    pub fn into_messages(self) -> Vec<LogMessage> {
        let raw = match self {
            Self::Envelope(env) => env.messages,
            Self::Batch(batch) => batch,
        };
        raw.into_iter().map(IncomingMessage::into_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_form_parses() {
        let body = r#"{
            "id": "pkt-7",
            "agentId": "agent-1",
            "messages": [
                {"level": "ERROR", "source": "db", "message": "connection lost"},
                "plain text line"
            ]
        }"#;
        let sub: LogSubmission = serde_json::from_str(body).unwrap();
        assert_eq!(sub.packet_id(), Some("pkt-7"));
        assert_eq!(sub.agent_id(), Some("agent-1"));

        let messages = sub.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].level, LogLevel::Error);
        assert_eq!(messages[0].source, "db");
        // Lifted string
        assert_eq!(messages[1].level, LogLevel::Info);
        assert_eq!(messages[1].source, "unknown");
        assert_eq!(messages[1].message, "plain text line");
    }

    #[test]
    fn bare_array_form_parses() {
        let body = r#"[
            {"level": "WARN", "source": "cache", "message": "evicting"},
            "hello"
        ]"#;
        let sub: LogSubmission = serde_json::from_str(body).unwrap();
        assert_eq!(sub.packet_id(), None);
        let messages = sub.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].level, LogLevel::Warn);
        assert_eq!(messages[1].message, "hello");
    }

    #[test]
    fn unknown_level_is_rejected() {
        let body = r#"[{"level": "TRACE", "source": "x", "message": "y"}]"#;
        assert!(serde_json::from_str::<LogSubmission>(body).is_err());
    }

    #[test]
    fn missing_agent_id_rejects_envelope() {
        let body = r#"{"messages": [{"level": "INFO", "source": "x", "message": "y"}]}"#;
        assert!(serde_json::from_str::<LogSubmission>(body).is_err());
    }

    #[test]
    fn validation_rejects_empty_fields() {
        let mut msg = LogMessage {
            id: None,
            timestamp: None,
            level: LogLevel::Info,
            source: "app".to_string(),
            message: "ok".to_string(),
            metadata: None,
        };
        assert!(msg.validate().is_ok());

        msg.source = "  ".to_string();
        assert_eq!(msg.validate(), Err(MessageError::EmptySource));

        msg.source = "app".to_string();
        msg.message = String::new();
        assert_eq!(msg.validate(), Err(MessageError::EmptyMessage));
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let msg = LogMessage {
            id: Some("m-1".to_string()),
            timestamp: Some("2026-03-01T12:00:00Z".parse().unwrap()),
            level: LogLevel::Fatal,
            source: "kernel".to_string(),
            message: "panic".to_string(),
            metadata: Some(serde_json::json!({"host": "node-3", "pid": 42})),
        };
        let wire = serde_json::to_string(&msg).unwrap();
        let back: LogMessage = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn levels_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Debug).unwrap(), "\"DEBUG\"");
        assert_eq!(serde_json::to_string(&LogLevel::Fatal).unwrap(), "\"FATAL\"");
    }

    #[test]
    fn fill_timestamp_only_when_absent() {
        let fixed: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let mut msg = LogMessage {
            id: None,
            timestamp: Some(fixed),
            level: LogLevel::Info,
            source: "a".to_string(),
            message: "b".to_string(),
            metadata: None,
        };
        msg.fill_timestamp();
        assert_eq!(msg.timestamp, Some(fixed));

        msg.timestamp = None;
        msg.fill_timestamp();
        assert!(msg.timestamp.is_some());
    }
}
