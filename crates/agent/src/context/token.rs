//! Token accounting against the provider's tokenizer.
//!
//! Counts always go to the provider; nothing is cached, so counting the same
//! text twice makes two calls. A report is all-or-nothing: the first failed
//! count aborts it.

use crate::context::serializer;
use refchat_core::error::{Error, ProviderError};
use refchat_core::provider::Provider;
use refchat_core::table::{DataFormat, TableSet};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

/// Token count for one table's rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTokens {
    pub table: String,
    pub tokens: u64,
}

/// Per-component token breakdown for one request.
///
/// Totals are derived in [`TokenReport::new`], so
/// `grand_total == system_prompt_base + user_question + csv_data_total` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenReport {
    system_prompt_base: u64,
    user_question: u64,
    #[serde(serialize_with = "breakdown_as_map")]
    csv_data_breakdown: Vec<TableTokens>,
    csv_data_total: u64,
    grand_total: u64,
}

impl TokenReport {
    pub fn new(system_prompt_base: u64, user_question: u64, breakdown: Vec<TableTokens>) -> Self {
        let csv_data_total: u64 = breakdown.iter().map(|t| t.tokens).sum();
        Self {
            system_prompt_base,
            user_question,
            csv_data_breakdown: breakdown,
            csv_data_total,
            grand_total: system_prompt_base + user_question + csv_data_total,
        }
    }

    pub fn system_prompt_base(&self) -> u64 {
        self.system_prompt_base
    }

    pub fn user_question(&self) -> u64 {
        self.user_question
    }

    pub fn csv_data_breakdown(&self) -> &[TableTokens] {
        &self.csv_data_breakdown
    }

    pub fn csv_data_total(&self) -> u64 {
        self.csv_data_total
    }

    pub fn grand_total(&self) -> u64 {
        self.grand_total
    }
}

/// Table name → tokens, in load order.
fn breakdown_as_map<S: Serializer>(breakdown: &[TableTokens], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(breakdown.len()))?;
    for entry in breakdown {
        map.serialize_entry(&entry.table, &entry.tokens)?;
    }
    map.end()
}

impl std::fmt::Display for TokenReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Token Usage Report ---")?;
        writeln!(f, "- Base System Prompt: {} tokens", self.system_prompt_base)?;
        writeln!(f, "- Sample User Question: {} tokens", self.user_question)?;
        writeln!(f)?;
        writeln!(f, "--- CSV Data Breakdown ---")?;
        for entry in &self.csv_data_breakdown {
            writeln!(f, "  - {}: {} tokens", entry.table, entry.tokens)?;
        }
        writeln!(f, "--------------------------")?;
        writeln!(f, "- Total for CSV data: {} tokens", self.csv_data_total)?;
        writeln!(f, "==========================")?;
        writeln!(f, "GRAND TOTAL (for one request): {} tokens", self.grand_total)?;
        write!(f, "--------------------------")
    }
}

/// Counts tokens for a fixed model through a provider.
#[derive(Clone)]
pub struct TokenAccountant {
    provider: Arc<dyn Provider>,
    model: String,
}

impl TokenAccountant {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Count the tokens in `text`.
    pub async fn count(&self, text: &str) -> Result<u64, ProviderError> {
        let tokens = self.provider.count_tokens(&self.model, text).await?;
        debug!(model = %self.model, bytes = text.len(), tokens, "Counted tokens");
        Ok(u64::from(tokens))
    }

    /// Build a full breakdown for one request.
    ///
    /// Oracle failures surface as [`Error::Provider`]; no partial report is
    /// ever returned.
    ///
    /// Each table is counted on its own rendering in `format`, the same text
    /// [`serializer::render`] embeds for it.
    pub async fn report(
        &self,
        base_prompt: &str,
        question: &str,
        tables: &TableSet,
        format: DataFormat,
    ) -> Result<TokenReport, Error> {
        let system_prompt_base = self.count(base_prompt).await?;
        let user_question = self.count(question).await?;

        let mut breakdown = Vec::with_capacity(tables.len());
        for table in tables {
            let rendered = serializer::render_table(table, format)?;
            breakdown.push(TableTokens {
                table: table.name().to_string(),
                tokens: self.count(&rendered).await?,
            });
        }

        Ok(TokenReport::new(system_prompt_base, user_question, breakdown))
    }
}
