//! `refchat chat`: Interactive or single-message chat mode.

use super::{print_api_key_help, print_notice};
use refchat_agent::{ChatClient, SessionContext, SessionDeps, TurnOutcome, UNAVAILABLE_MESSAGE};
use refchat_config::AppConfig;
use refchat_core::provider::Usage;
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub async fn run(config: &AppConfig, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        print_api_key_help(config);
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = refchat_providers::build_from_config(config)?;
    let client = ChatClient::from_config(provider, config);

    eprint!("  Preparing session...");
    let mut session = SessionContext::start(SessionDeps::from_config(config, client)).await;
    eprint!("\r                      \r");

    for notice in session.notices() {
        print_notice(notice);
    }
    if let Some(tokens) = session.initial_tokens() {
        eprintln!(
            "--- INITIAL PROMPT TOKEN COUNT ({}): {tokens} ---",
            config.data.format
        );
    }

    if let Some(msg) = message {
        // Single message mode
        if !session.is_available() {
            session.end();
            return Err(UNAVAILABLE_MESSAGE.into());
        }
        let outcome = session.handle_turn(&msg).await;
        session.end();
        return match outcome {
            TurnOutcome::Reply { text, usage } => {
                println!("{text}");
                if let Some(usage) = usage {
                    print_usage(&usage);
                }
                Ok(())
            }
            TurnOutcome::Failed(e) => Err(e.into()),
            TurnOutcome::Unavailable => Err(UNAVAILABLE_MESSAGE.into()),
        };
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          refchat — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Data:      {}", config.tables_dir().display());
    println!("  Format:    {}", config.data.format);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    if let Some(welcome) = session.welcome() {
        print_assistant(welcome);
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt_user()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt_user()?;
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        eprint!("  ...");
        let outcome = session.handle_turn(line).await;
        eprint!("\r     \r");

        match outcome {
            TurnOutcome::Reply { text, usage } => {
                println!();
                print_assistant(&text);
                if let Some(usage) = usage {
                    print_usage(&usage);
                }
            }
            TurnOutcome::Failed(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
            TurnOutcome::Unavailable => {
                eprintln!("  [Error] {UNAVAILABLE_MESSAGE}");
                println!();
            }
        }

        prompt_user()?;
    }

    let usage = *session.usage();
    session.end();

    println!();
    if usage.turns > 0 {
        println!("  Session: {usage}");
    }
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt_user() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_assistant(text: &str) {
    for line in text.lines() {
        println!("  Assistant > {line}");
    }
    println!();
}

fn print_usage(usage: &Usage) {
    eprintln!("--- CURRENT TURN TOKEN USAGE ---");
    eprintln!("  - Input (Question): {} tokens", usage.prompt_tokens);
    eprintln!("  - Output (Answer): {} tokens", usage.completion_tokens);
    eprintln!("  - Total History (so far): {} tokens", usage.total_tokens);
    eprintln!("----------------------------");
}
