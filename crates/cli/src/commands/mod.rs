//! Subcommand implementations.

pub mod chat;
pub mod prompt;
pub mod tokens;

use refchat_agent::context::{PromptEnricher, load_instructions};
use refchat_agent::{Notice, NoticeLevel, load_tables_or_empty};
use refchat_config::{API_KEY_ENV, AppConfig};
use refchat_core::error::Error;
use refchat_core::table::TableSet;

/// Enriched instructions and reference tables, loaded for one command.
pub(crate) struct PromptInputs {
    pub instructions: String,
    pub tables: TableSet,
}

/// Load and enrich the instructions, then load the tables.
///
/// Table problems are reported on stderr and degrade to an empty set; an
/// unusable instruction document is an error.
pub(crate) fn load_inputs(config: &AppConfig) -> Result<PromptInputs, Error> {
    let base = load_instructions(&config.instructions_path())?;
    let instructions = PromptEnricher::from_config(&config.enrichments).enrich(&base)?;

    let (tables, notice) = load_tables_or_empty(&config.tables_dir(), &config.data.table_extension);
    if let Some(notice) = notice {
        print_notice(&notice);
    }

    Ok(PromptInputs {
        instructions,
        tables,
    })
}

pub(crate) fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Warning => eprintln!("  [Warning] {}", notice.message),
        NoticeLevel::Error => eprintln!("  [Error] {}", notice.message),
    }
}

/// Explain how to provide an API key.
pub(crate) fn print_api_key_help(config: &AppConfig) {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set the environment variable (or put it in a .env file):");
    eprintln!("    {API_KEY_ENV}=...");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!(
        "    {}",
        config.base_dir().join(refchat_config::DEFAULT_CONFIG_FILE).display()
    );
    eprintln!();
}
