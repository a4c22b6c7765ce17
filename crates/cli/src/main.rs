//! refchat CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive chat or single-message mode
//! - `tokens` : Token usage breakdown of the prompt components
//! - `prompt` : Assemble the final prompt and write or print it

use clap::{Parser, Subcommand, ValueEnum};
use refchat_config::AppConfig;
use refchat_core::table::DataFormat;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "refchat",
    about = "refchat: chat with Gemini over your reference tables",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./refchat.toml)
    #[arg(short, long, global = true, env = "REFCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show how many tokens each prompt component takes
    Tokens {
        /// Question to count as the user turn (default: report.sample_question)
        #[arg(short, long)]
        question: Option<String>,

        /// Table rendering to measure (default: data.format)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assemble the final prompt
    Prompt {
        /// Write to this path instead of data.prompt_dump
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the prompt instead of writing it
        #[arg(long)]
        stdout: bool,

        /// Also count the prompt's tokens
        #[arg(long)]
        count: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for DataFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => DataFormat::Json,
            FormatArg::Markdown => DataFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    let _log_guards =
        refchat_telemetry::init_logging(&config.logging, &config.log_dir(), cli.verbose);
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Chat { message } => commands::chat::run(&config, message).await?,
        Commands::Tokens {
            question,
            format,
            json,
        } => commands::tokens::run(&config, question, format.map(Into::into), json).await?,
        Commands::Prompt {
            output,
            stdout,
            count,
        } => commands::prompt::run(&config, output, stdout, count).await?,
    }

    Ok(())
}
