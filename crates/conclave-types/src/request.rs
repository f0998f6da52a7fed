//! Submitted requests and their bounded conversation context.

use crate::error::ValidationError;
use crate::sanitize::sanitize_query;
use crate::{UserId, MAX_CONTEXT_TOKENS, MAX_QUERY_LENGTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user message.
    User,
    /// A previous consensus answer.
    Assistant,
    /// System framing.
    System,
}

/// One message of prior conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    /// Who produced the message.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Token count as estimated by the session store.
    pub tokens: u32,
}

/// Bounded conversation context attached to a request.
///
/// The token total never exceeds [`MAX_CONTEXT_TOKENS`]; oldest messages
/// are dropped first when the budget is exceeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Messages in chronological order.
    pub messages: Vec<ContextMessage>,
    /// Sum of `tokens` across `messages`.
    pub token_total: u32,
}

impl SessionContext {
    /// Creates an empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a context from messages, truncating oldest-first to fit
    /// the token budget.
    pub fn bounded(messages: Vec<ContextMessage>) -> Self {
        let mut kept: Vec<ContextMessage> = Vec::new();
        let mut total: u32 = 0;
        for msg in messages.into_iter().rev() {
            if total + msg.tokens > MAX_CONTEXT_TOKENS {
                break;
            }
            total += msg.tokens;
            kept.push(msg);
        }
        kept.reverse();
        Self {
            messages: kept,
            token_total: total,
        }
    }

    /// True when no context is attached.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Opaque tool definition forwarded to providers when tool use is enabled.
///
/// Tool execution is out of scope; this is the pass-through contract only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the tool parameters.
    pub parameters: serde_json::Value,
}

/// A validated, sanitized user request ready for orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    /// Immutable request identifier (UUIDv4, assigned at submit).
    pub id: Uuid,
    /// Authenticated submitter.
    pub user_id: UserId,
    /// Sanitized query text.
    pub query: String,
    /// Optional session the request belongs to.
    pub session_id: Option<Uuid>,
    /// Bounded conversation context.
    #[serde(default)]
    pub context: SessionContext,
    /// Optional preset naming the council to use.
    pub preset: Option<String>,
    /// Whether the client declared streaming intent.
    pub streaming: bool,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl UserRequest {
    /// Constructs a request from a raw query, sanitizing and validating it.
    ///
    /// The query is sanitized first; emptiness and length are judged on
    /// the sanitized text.
    pub fn new(user_id: impl Into<UserId>, raw_query: &str) -> Result<Self, ValidationError> {
        let query = sanitize_query(raw_query);
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if query.chars().count() > MAX_QUERY_LENGTH {
            return Err(ValidationError::QueryTooLong(query.chars().count()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            query,
            session_id: None,
            context: SessionContext::empty(),
            preset: None,
            streaming: false,
            created_at: Utc::now(),
        })
    }

    /// Sets the session id.
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Sets the preset name.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Sets the streaming intent flag.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Attaches conversation context.
    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_sanitizes() {
        let req = UserRequest::new("alice", "hel\0lo").unwrap();
        assert_eq!(req.query, "hello");
        assert_eq!(req.user_id, "alice");
        assert!(!req.streaming);
    }

    #[test]
    fn test_new_request_rejects_empty_after_sanitize() {
        let err = UserRequest::new("alice", "\0\u{0001}").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyQuery));
    }

    #[test]
    fn test_new_request_rejects_too_long() {
        let long = "a".repeat(MAX_QUERY_LENGTH + 1);
        let err = UserRequest::new("alice", &long).unwrap_err();
        assert!(matches!(err, ValidationError::QueryTooLong(_)));
    }

    #[test]
    fn test_max_length_boundary_accepted() {
        let exact = "a".repeat(MAX_QUERY_LENGTH);
        assert!(UserRequest::new("alice", &exact).is_ok());
    }

    #[test]
    fn test_unique_ids() {
        let a = UserRequest::new("alice", "q").unwrap();
        let b = UserRequest::new("alice", "q").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_context_truncates_oldest_first() {
        let msg = |tokens| ContextMessage {
            role: MessageRole::User,
            content: "x".to_string(),
            tokens,
        };
        let ctx = SessionContext::bounded(vec![msg(3000), msg(1500), msg(1000)]);
        // The 3000-token oldest message does not fit.
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.token_total, 2500);
    }

    #[test]
    fn test_context_within_budget_kept_whole() {
        let msg = |tokens| ContextMessage {
            role: MessageRole::Assistant,
            content: "y".to_string(),
            tokens,
        };
        let ctx = SessionContext::bounded(vec![msg(100), msg(200)]);
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.token_total, 300);
    }
}
