//! Per-session state for an interactive chat.
//!
//! A [`SessionContext`] is created once per interactive run and owns
//! everything that run needs: the assembled prompt, the open chat, the
//! displayed transcript and any notices raised while starting up. All
//! logging inside a session carries its `session_id` span field.

use crate::client::{ChatClient, ChatSession};
use crate::context::assembler::{FinalPrompt, PromptAssembler};
use crate::context::document::{PromptEnricher, load_instructions};
use crate::context::tables::load_tables;
use crate::welcome::WelcomeMessages;
use refchat_config::AppConfig;
use refchat_core::error::{Error, TableError};
use refchat_core::message::{Conversation, Message, SessionId};
use refchat_core::provider::Usage;
use refchat_core::table::TableSet;
use refchat_telemetry::SessionUsage;
use std::path::{Path, PathBuf};
use tracing::{Instrument, Span, error, info, info_span, warn};

/// Shown when a turn is attempted without an open chat.
pub const UNAVAILABLE_MESSAGE: &str =
    "The chat session is not available. Please check your API key and instruction file.";

/// Everything needed to start a session.
pub struct SessionDeps {
    pub client: ChatClient,
    pub instructions: PathBuf,
    pub enricher: PromptEnricher,
    pub tables_dir: PathBuf,
    pub table_extension: String,
    pub assembler: PromptAssembler,
    /// Where to write the final prompt; `None` skips the dump.
    pub prompt_dump: Option<PathBuf>,
    pub welcome_messages: PathBuf,
}

impl SessionDeps {
    pub fn from_config(config: &AppConfig, client: ChatClient) -> Self {
        Self {
            client,
            instructions: config.instructions_path(),
            enricher: PromptEnricher::from_config(&config.enrichments),
            tables_dir: config.tables_dir(),
            table_extension: config.data.table_extension.clone(),
            assembler: PromptAssembler::from_config(&config.data),
            prompt_dump: Some(config.prompt_dump_path()),
            welcome_messages: config.welcome_messages_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A user-visible message raised during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Load tables, degrading to an empty set on failure.
///
/// A missing directory yields a warning notice, any other failure an error
/// notice.
pub fn load_tables_or_empty(dir: &Path, extension: &str) -> (TableSet, Option<Notice>) {
    match load_tables(dir, extension) {
        Ok(tables) => {
            info!(count = tables.len(), "Loaded reference tables");
            (tables, None)
        }
        Err(e @ TableError::DirectoryMissing(_)) => {
            warn!(error = %e, "Proceeding without table data");
            let notice = Notice::warning(format!("{e}. Proceeding without table data."));
            (TableSet::new(), Some(notice))
        }
        Err(e) => {
            error!(error = %e, "Error loading table data");
            let notice = Notice::error(format!("Error loading table data: {e}"));
            (TableSet::new(), Some(notice))
        }
    }
}

/// The result of one user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Reply { text: String, usage: Option<Usage> },
    /// The model could not be reached or answered with an error. The session
    /// stays usable.
    Failed(String),
    /// Startup failed; there is no chat to talk to.
    Unavailable,
}

pub struct SessionContext {
    id: SessionId,
    span: Span,
    chat: Option<ChatSession>,
    prompt: Option<FinalPrompt>,
    initial_tokens: Option<u64>,
    transcript: Conversation,
    notices: Vec<Notice>,
    failure: Option<Error>,
    usage: SessionUsage,
}

impl SessionContext {
    /// Start a session: build the prompt, count it, open the chat and greet.
    ///
    /// Never fails outright. A failed startup leaves the session unavailable
    /// with the reason in [`failure`](Self::failure) and [`notices`](Self::notices).
    pub async fn start(deps: SessionDeps) -> Self {
        let id = SessionId::new();
        let span = info_span!("session", session_id = %id);

        let mut ctx = Self {
            id,
            span: span.clone(),
            chat: None,
            prompt: None,
            initial_tokens: None,
            transcript: Conversation::new(),
            notices: Vec::new(),
            failure: None,
            usage: SessionUsage::new(),
        };
        ctx.initialize(deps).instrument(span).await;
        ctx
    }

    async fn initialize(&mut self, deps: SessionDeps) {
        info!("New session started");

        match self.open_chat(&deps).await {
            Ok(chat) => {
                self.chat = Some(chat);
                info!("Chat session initialized");
            }
            Err(e) => {
                error!(error = %e, "Session initialization failed");
                self.notices.push(Notice::error(format!("Initialization failed: {e}")));
                self.failure = Some(e);
            }
        }

        let welcome = WelcomeMessages::load_or_default(&deps.welcome_messages);
        self.transcript.push(Message::assistant(welcome.pick()));
    }

    async fn open_chat(&mut self, deps: &SessionDeps) -> Result<ChatSession, Error> {
        let base = load_instructions(&deps.instructions)?;
        let instructions = deps.enricher.enrich(&base)?;
        let (tables, notice) = load_tables_or_empty(&deps.tables_dir, &deps.table_extension);
        self.notices.extend(notice);

        let prompt = deps.assembler.assemble(&instructions, &tables)?;
        if let Some(path) = &deps.prompt_dump {
            prompt.write_dump_or_warn(path);
        }

        let count = deps.client.count_tokens(prompt.as_str()).await?;
        info!(count, format = %prompt.format(), tables = prompt.table_count(), "Initial prompt token count");
        self.initial_tokens = Some(u64::from(count));

        let chat = deps.client.open_session(prompt.as_str());
        self.prompt = Some(prompt);
        Ok(chat)
    }

    pub fn is_available(&self) -> bool {
        self.chat.is_some()
    }

    /// Why startup failed, if it did.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn prompt(&self) -> Option<&FinalPrompt> {
        self.prompt.as_ref()
    }

    /// Token count of the final prompt, measured at startup.
    pub fn initial_tokens(&self) -> Option<u64> {
        self.initial_tokens
    }

    /// Everything shown to the user so far, starting with the welcome message.
    pub fn transcript(&self) -> &Conversation {
        &self.transcript
    }

    pub fn welcome(&self) -> Option<&str> {
        self.transcript.messages.first().map(|m| m.content.as_str())
    }

    pub fn usage(&self) -> &SessionUsage {
        &self.usage
    }

    /// Handle one user question.
    pub async fn handle_turn(&mut self, question: &str) -> TurnOutcome {
        let span = self.span.clone();
        self.turn(question).instrument(span).await
    }

    async fn turn(&mut self, question: &str) -> TurnOutcome {
        self.transcript.push(Message::user(question));

        let Some(chat) = self.chat.as_mut() else {
            warn!("Turn attempted without an open chat");
            return TurnOutcome::Unavailable;
        };

        info!(payload = %question, "User request");
        refchat_telemetry::log_request(&self.id.to_string(), question.chars().count());

        match chat.send(question).await {
            Ok(reply) => {
                match &reply.usage {
                    Some(usage) => info!(payload = %reply.text, usage = %usage, "LLM response"),
                    None => info!(payload = %reply.text, "LLM response"),
                }
                self.usage.record(reply.usage.as_ref());
                self.transcript.push(Message::assistant(reply.text.clone()));
                TurnOutcome::Reply {
                    text: reply.text,
                    usage: reply.usage,
                }
            }
            Err(e) => {
                error!(error = %e, "Error communicating with the model");
                TurnOutcome::Failed(format!(
                    "An error occurred while communicating with the model: {e}"
                ))
            }
        }
    }

    /// Close the session. Dropping the context releases the chat and prompt.
    pub fn end(self) {
        info!(
            parent: &self.span,
            turns = self.usage.turns,
            input_tokens = self.usage.prompt_tokens,
            output_tokens = self.usage.completion_tokens,
            "Session ended"
        );
    }
}
