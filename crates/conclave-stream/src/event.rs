//! Lifecycle events on the SSE wire.

use serde::Serialize;
use uuid::Uuid;

/// One server-sent event in a request's lifecycle stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First event of a combined submit+stream call.
    Init {
        /// The freshly assigned request id.
        request_id: Uuid,
    },
    /// Lifecycle status notification.
    Status(String),
    /// Content chunk; concatenation over a stream is a prefix of the
    /// final decision content.
    Message(String),
    /// Terminal failure with a human-readable reason.
    Error(String),
    /// Terminal success marker.
    Done,
}

#[derive(Serialize)]
struct InitPayload {
    #[serde(rename = "requestId")]
    request_id: Uuid,
}

impl StreamEvent {
    /// The `event:` field name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Status(_) => "status",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Done => "done",
        }
    }

    /// The JSON `data:` payload.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Init { request_id } => {
                serde_json::to_value(InitPayload {
                    request_id: *request_id,
                })
                .unwrap_or(serde_json::Value::Null)
            }
            Self::Status(status) => serde_json::Value::String(status.clone()),
            Self::Message(content) => serde_json::Value::String(content.clone()),
            Self::Error(reason) => serde_json::Value::String(reason.clone()),
            Self::Done => serde_json::Value::String("Request completed".to_string()),
        }
    }

    /// Whether the event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Done)
    }

    /// The full wire frame: `event: <name>\ndata: <json>\n\n`.
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data())
    }
}
