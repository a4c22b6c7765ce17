//! Prompt assembly and chat sessions for refchat.
//!
//! A session runs in four steps:
//!
//! 1. **Load** the reference tables and the instruction document
//! 2. **Enrich** the instructions and **assemble** the final system prompt
//! 3. **Count** the prompt with the provider's tokenizer
//! 4. **Chat**: every turn resends the history under that system prompt

pub mod client;
pub mod context;
pub mod session;
pub mod welcome;

#[cfg(test)]
mod test_helpers;

pub use client::{ChatClient, ChatSession, TurnReply};
pub use context::{
    Enrichment, FinalPrompt, InstructionDocument, PromptAssembler, PromptEnricher, TableTokens,
    TokenAccountant, TokenReport,
};
pub use session::{
    Notice, NoticeLevel, SessionContext, SessionDeps, TurnOutcome, UNAVAILABLE_MESSAGE,
    load_tables_or_empty,
};
pub use welcome::{FALLBACK_WELCOME, WelcomeMessages};
