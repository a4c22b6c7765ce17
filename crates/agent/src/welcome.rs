//! Welcome message selection.

use rand::Rng;
use refchat_core::error::Error;
use std::path::Path;
use tracing::error;

/// Greeting used when the message store cannot be read.
pub const FALLBACK_WELCOME: &str = "Hello! How can I help you today?";

/// Candidate greetings, one picked at random per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WelcomeMessages {
    messages: Vec<String>,
}

impl WelcomeMessages {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// Read a JSON array of strings from `path`.
    ///
    /// A missing, malformed or empty store is [`Error::DataUnavailable`].
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::data_unavailable(format!(
                "Could not read welcome messages at {}: {e}",
                path.display()
            ))
        })?;
        let messages: Vec<String> = serde_json::from_str(&content).map_err(|e| {
            Error::data_unavailable(format!(
                "Welcome messages at {} are not a JSON string array: {e}",
                path.display()
            ))
        })?;
        if messages.is_empty() {
            return Err(Error::data_unavailable(format!(
                "Welcome messages at {} are empty",
                path.display()
            )));
        }
        Ok(Self::new(messages))
    }

    /// [`load`](Self::load), logging the failure and falling back to no messages.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            error!(error = %e, "Could not load welcome messages");
            Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Pick one message uniformly at random, or the fallback when there are none.
    pub fn pick(&self) -> &str {
        if self.messages.is_empty() {
            return FALLBACK_WELCOME;
        }
        let idx = rand::rng().random_range(0..self.messages.len());
        &self.messages[idx]
    }
}
