//! Chat client over a [`Provider`].
//!
//! The provider is stateless, so a [`ChatSession`] keeps the conversation and
//! resends it, with the system prompt, on every turn.

use refchat_config::AppConfig;
use refchat_core::error::ProviderError;
use refchat_core::message::{Conversation, Message};
use refchat_core::provider::{Provider, ProviderRequest, Usage};
use std::sync::Arc;
use tracing::debug;

/// The answer to one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Opens chat sessions and counts tokens for one model.
#[derive(Clone)]
pub struct ChatClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl ChatClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            ..Self::new(provider, config.model.clone())
        }
    }

    /// Start a conversation governed by `system_prompt`.
    pub fn open_session(&self, system_prompt: impl Into<String>) -> ChatSession {
        ChatSession {
            client: self.clone(),
            system_prompt: system_prompt.into(),
            history: Conversation::new(),
        }
    }

    pub async fn count_tokens(&self, text: &str) -> Result<u32, ProviderError> {
        self.provider.count_tokens(&self.model, text).await
    }
}

/// One ongoing conversation.
pub struct ChatSession {
    client: ChatClient,
    system_prompt: String,
    history: Conversation,
}

impl ChatSession {
    pub fn history(&self) -> &Conversation {
        &self.history
    }

    /// Send `message` and record the exchange.
    ///
    /// On failure the history is left as it was, so the turn can be retried.
    pub async fn send(&mut self, message: &str) -> Result<TurnReply, ProviderError> {
        let user = Message::user(message);
        let mut messages = self.history.messages.clone();
        messages.push(user.clone());

        let request = ProviderRequest {
            model: self.client.model.clone(),
            system_instruction: Some(self.system_prompt.clone()),
            messages,
            temperature: self.client.temperature,
            max_tokens: self.client.max_output_tokens,
        };

        debug!(
            provider = self.client.provider.name(),
            model = %self.client.model,
            history = self.history.len(),
            "Sending chat turn"
        );
        let response = self.client.provider.complete(request).await?;

        let reply = TurnReply {
            text: response.message.content.clone(),
            usage: response.usage,
        };
        self.history.push(user);
        self.history.push(response.message);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use refchat_core::message::Role;

    #[tokio::test]
    async fn session_resends_history_with_system_prompt() {
        let provider = Arc::new(ScriptedProvider::with_replies(vec![
            Ok("first answer".into()),
            Ok("second answer".into()),
        ]));
        let client = ChatClient::new(provider.clone(), "gemini-2.5-pro");
        let mut session = client.open_session("SYSTEM");

        let reply = session.send("q1").await.unwrap();
        assert_eq!(reply.text, "first answer");
        assert!(reply.usage.is_some());
        session.send("q2").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].system_instruction.as_deref(), Some("SYSTEM"));
        let roles: Vec<Role> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn failed_turn_leaves_history_untouched() {
        let provider = Arc::new(ScriptedProvider::with_replies(vec![
            Err(ProviderError::Timeout("slow".into())),
            Ok("recovered".into()),
        ]));
        let client = ChatClient::new(provider, "m");
        let mut session = client.open_session("S");

        assert!(session.send("q").await.is_err());
        assert!(session.history().is_empty());

        let reply = session.send("q").await.unwrap();
        assert_eq!(reply.text, "recovered");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn generation_settings_come_from_config() {
        let provider = Arc::new(ScriptedProvider::char_counter());
        let mut config = AppConfig::default();
        config.temperature = Some(0.3);
        config.max_output_tokens = Some(512);
        let client = ChatClient::from_config(provider.clone(), &config);
        client.open_session("S").send("hi").await.unwrap();

        let requests = provider.requests();
        let request = &requests[0];
        assert_eq!(request.model, config.model);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[tokio::test]
    async fn count_tokens_delegates_to_provider() {
        let provider = Arc::new(ScriptedProvider::char_counter());
        let client = ChatClient::new(provider, "m");
        assert_eq!(client.count_tokens("hello").await.unwrap(), 5);
    }
}
