//! `refchat tokens`: Token usage breakdown of one request.

use super::{load_inputs, print_api_key_help};
use refchat_agent::TokenAccountant;
use refchat_config::AppConfig;
use refchat_core::table::DataFormat;

pub async fn run(
    config: &AppConfig,
    question: Option<String>,
    format: Option<DataFormat>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Starting token usage analysis...");

    if !config.has_api_key() {
        print_api_key_help(config);
        return Ok(());
    }

    eprintln!("Loading prompt components...");
    let inputs = load_inputs(config).map_err(|e| {
        eprintln!("Failed to load the instructions. Aborting.");
        e
    })?;
    if inputs.tables.is_empty() {
        eprintln!("No table data found or failed to load. Analysis will be incomplete.");
    }

    let question = question.unwrap_or_else(|| config.report.sample_question.clone());
    let format = format.unwrap_or(config.data.format);

    eprintln!("Analyzing token counts with {}...", config.model);
    let provider = refchat_providers::build_from_config(config)?;
    let accountant = TokenAccountant::new(provider, config.model.clone());
    let report = accountant
        .report(&inputs.instructions, &question, &inputs.tables, format)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token report failed");
            eprintln!("\nERROR: {e}");
            e
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{report}");
        println!();
    }

    Ok(())
}
