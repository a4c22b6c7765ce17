//! `refchat prompt`: Assemble the final prompt for inspection.

use super::{load_inputs, print_api_key_help};
use refchat_agent::{ChatClient, PromptAssembler};
use refchat_config::AppConfig;
use std::path::PathBuf;

pub async fn run(
    config: &AppConfig,
    output: Option<PathBuf>,
    stdout: bool,
    count: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = load_inputs(config)?;
    let prompt = PromptAssembler::from_config(&config.data).assemble(&inputs.instructions, &inputs.tables)?;

    if stdout {
        print!("{prompt}");
    } else {
        let path = output.unwrap_or_else(|| config.prompt_dump_path());
        prompt.write_dump(&path)?;
        eprintln!(
            "  Saved final prompt to {} ({} bytes, {} tables, {})",
            path.display(),
            prompt.len(),
            prompt.table_count(),
            prompt.format()
        );
    }

    if count {
        if !config.has_api_key() {
            print_api_key_help(config);
            return Err("No API key found. See above for setup instructions.".into());
        }
        let provider = refchat_providers::build_from_config(config)?;
        let tokens = ChatClient::from_config(provider, config)
            .count_tokens(prompt.as_str())
            .await?;
        eprintln!("  Prompt tokens ({}): {tokens}", config.model);
    }

    Ok(())
}
