//! Provider trait: the abstraction over the hosted LLM service.
//!
//! A Provider is two things to the rest of the system: a stateless token
//! counting service and a chat transport. Conversation state lives with the
//! caller and is sent along with every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gemini-2.5-pro")
    pub model: String,

    /// System instruction sent alongside the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// The conversation messages, oldest first
    pub messages: Vec<Message>,

    /// Sampling temperature; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the request, including system instruction and history
    pub prompt_tokens: u32,
    /// Tokens in the generated answer
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// The core Provider trait.
///
/// The session and accounting code call `complete()` and `count_tokens()`
/// without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Count the tokens `text` occupies for `model`.
    ///
    /// Default implementation returns an error indicating counting isn't supported.
    async fn count_tokens(&self, model: &str, text: &str) -> std::result::Result<u32, ProviderError> {
        let _ = (model, text);
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support token counting",
            self.name()
        )))
    }
}
