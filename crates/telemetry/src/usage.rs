//! Running token totals for one chat session.

use refchat_core::provider::Usage;
use serde::Serialize;

/// Accumulated usage across the turns of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionUsage {
    pub turns: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// `total_tokens` of the latest turn, i.e. the size of the whole history
    /// the model saw last.
    pub last_total: u64,
}

impl SessionUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one successful turn. Turns without usage still count as turns.
    pub fn record(&mut self, usage: Option<&Usage>) {
        self.turns += 1;
        if let Some(usage) = usage {
            self.prompt_tokens += u64::from(usage.prompt_tokens);
            self.completion_tokens += u64::from(usage.completion_tokens);
            self.last_total = u64::from(usage.total_tokens);
        }
    }
}

impl std::fmt::Display for SessionUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} turns, {} input + {} output tokens",
            self.turns, self.prompt_tokens, self.completion_tokens
        )
    }
}
