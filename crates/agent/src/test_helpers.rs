//! Shared test helpers.

use crate::context::tables::parse_csv;
use refchat_core::error::ProviderError;
use refchat_core::message::Message;
use refchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use refchat_core::table::TableSet;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider with a character-counting tokenizer and scripted replies.
///
/// `complete` pops the next scripted reply; once the script is exhausted it
/// answers `"ok"`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    count_calls: Mutex<usize>,
    fail_counts_after: Option<usize>,
}

impl ScriptedProvider {
    pub fn char_counter() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            count_calls: Mutex::new(0),
            fail_counts_after: None,
        }
    }

    pub fn with_replies(replies: Vec<Result<String, ProviderError>>) -> Self {
        let provider = Self::char_counter();
        *provider.replies.lock().unwrap() = replies.into();
        provider
    }

    /// Let the first `n` count calls succeed and fail every later one.
    pub fn fail_counts_after(mut self, n: usize) -> Self {
        self.fail_counts_after = Some(n);
        self
    }

    pub fn count_calls(&self) -> usize {
        *self.count_calls.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| m.content.chars().count() as u32)
            .sum::<u32>();
        self.requests.lock().unwrap().push(request);

        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".into()))?;
        let completion_tokens = text.chars().count() as u32;

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model,
        })
    }

    async fn count_tokens(&self, _model: &str, text: &str) -> Result<u32, ProviderError> {
        let mut calls = self.count_calls.lock().unwrap();
        *calls += 1;
        if self.fail_counts_after.is_some_and(|n| *calls > n) {
            return Err(ProviderError::Network("connection refused".into()));
        }
        Ok(text.chars().count() as u32)
    }
}

/// Build a table set from `(name, csv text)` pairs, in the given order.
pub fn table_set(tables: &[(&str, &str)]) -> TableSet {
    let mut set = TableSet::new();
    for (name, csv) in tables {
        set.push(parse_csv(name, csv).unwrap());
    }
    set
}
