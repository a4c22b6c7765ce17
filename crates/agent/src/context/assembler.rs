//! Final prompt assembly.
//!
//! The system instruction sent to the model is
//! `enriched instructions + reference header + serialized tables`. Assembly is
//! deterministic: the same instructions, tables and format always produce the
//! same text.

use crate::context::serializer;
use refchat_config::DataConfig;
use refchat_core::error::Error;
use refchat_core::table::{DataFormat, TableSet};
use std::path::Path;
use tracing::{info, warn};

/// The complete system instruction for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalPrompt {
    text: String,
    format: DataFormat,
    table_count: usize,
}

impl FinalPrompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn table_count(&self) -> usize {
        self.table_count
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Write the exact prompt text to `path` for inspection.
    ///
    /// Failures come back as [`Error::Persistence`]; callers log them and
    /// carry on.
    pub fn write_dump(&self, path: &Path) -> Result<(), Error> {
        let persist_err = |e: std::io::Error| Error::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
        std::fs::write(path, &self.text).map_err(persist_err)?;
        info!(path = %path.display(), bytes = self.text.len(), "Saved final prompt");
        Ok(())
    }

    /// [`write_dump`](Self::write_dump), logging instead of returning the failure.
    pub fn write_dump_or_warn(&self, path: &Path) {
        if let Err(e) = self.write_dump(path) {
            warn!(error = %e, "Failed to save final prompt");
        }
    }
}

impl std::fmt::Display for FinalPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Joins enriched instructions with serialized reference data.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    header: String,
    format: DataFormat,
}

impl PromptAssembler {
    pub fn new(header: impl Into<String>, format: DataFormat) -> Self {
        Self {
            header: header.into(),
            format,
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.reference_header(), config.format)
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn assemble(&self, instructions: &str, tables: &TableSet) -> Result<FinalPrompt, Error> {
        let data = serializer::render(tables, self.format)?;

        let mut text = String::with_capacity(instructions.len() + self.header.len() + data.len());
        text.push_str(instructions);
        text.push_str(&self.header);
        text.push_str(&data);

        Ok(FinalPrompt {
            text,
            format: self.format,
            table_count: tables.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::table_set;

    #[test]
    fn assembles_instructions_header_and_data() {
        let assembler = PromptAssembler::new("\n\n---\n# Reference Data (JSON Format)\n\n", DataFormat::Json);
        let tables = table_set(&[("a.csv", "id\n1\n")]);
        let prompt = assembler.assemble("Be helpful.", &tables).unwrap();

        assert_eq!(
            prompt.as_str(),
            "Be helpful.\n\n---\n# Reference Data (JSON Format)\n\n{\"a.csv\":[{\"id\":1}]}"
        );
        assert_eq!(prompt.table_count(), 1);
        assert_eq!(prompt.format(), DataFormat::Json);
    }

    #[test]
    fn empty_tables_still_carry_the_header() {
        let config = DataConfig {
            format: DataFormat::Markdown,
            ..DataConfig::default()
        };
        let assembler = PromptAssembler::from_config(&config);
        let prompt = assembler.assemble("Rules", &TableSet::new()).unwrap();
        assert_eq!(prompt.to_string(), format!("Rules{}", config.reference_header()));
    }

    #[test]
    fn assembly_is_deterministic() {
        let assembler = PromptAssembler::new("\n---\n", DataFormat::Markdown);
        let tables = table_set(&[("a.csv", "k,v\nx,1\n"), ("b.csv", "k\ny\n")]);
        let first = assembler.assemble("I", &tables).unwrap();
        let second = assembler.assemble("I", &tables).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dump_writes_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("final_prompt.md");
        let prompt = PromptAssembler::new("|", DataFormat::Json)
            .assemble("Привіт", &TableSet::new())
            .unwrap();

        prompt.write_dump(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Привіт|{}");
    }

    #[test]
    fn dump_failure_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = PromptAssembler::new("", DataFormat::Json)
            .assemble("x", &TableSet::new())
            .unwrap();

        // A directory cannot be overwritten with a file.
        let err = prompt.write_dump(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(err.is_recoverable());
    }
}
