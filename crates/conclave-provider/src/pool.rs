//! The provider pool contract.

use crate::error::ProviderError;
use async_trait::async_trait;
use conclave_types::{CouncilMember, MessageRole, SessionContext, ToolDefinition};
use serde::{Deserialize, Serialize};

/// One message of a provider prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Speaker role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl PromptMessage {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// A system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// An assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A prompt sent to one council member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Ordered prompt messages.
    pub messages: Vec<PromptMessage>,
    /// Tool definitions forwarded opaquely when tool use is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    /// Builds the round-0 prompt: prior context followed by the query.
    pub fn from_query(query: &str, context: &SessionContext) -> Self {
        let mut messages: Vec<PromptMessage> = context
            .messages
            .iter()
            .map(|m| PromptMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        messages.push(PromptMessage::user(query));
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    /// Attaches tool definitions.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A successful provider reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// Model output text.
    pub content: String,
    /// Prompt tokens billed.
    pub prompt_tokens: u32,
    /// Completion tokens billed.
    pub completion_tokens: u32,
    /// Cost of the call in USD.
    pub cost_usd: f64,
}

/// Sends prompts to council members.
///
/// Implementations hold the per-provider HTTP clients and credentials;
/// they are expected to be thread-safe. One call maps to one provider
/// attempt — retries and timeouts live in [`crate::call_member`], not
/// here.
#[async_trait]
pub trait ProviderPool: Send + Sync {
    /// Sends one prompt to one member and returns its reply.
    async fn complete(
        &self,
        member: &CouncilMember,
        request: &ProviderRequest,
    ) -> Result<ProviderReply, ProviderError>;
}
