//! Reference table loading.
//!
//! Every file in the tables directory whose name ends in `.<ext>` becomes one
//! [`Table`], keyed by its full file name. Files are loaded in lexicographic
//! name order so the rendered prompt is stable across runs.

use refchat_core::error::TableError;
use refchat_core::table::{Table, TableSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load every matching table in `dir`.
///
/// A missing directory is reported as [`TableError::DirectoryMissing`] so the
/// caller can degrade to an empty set. Any other failure aborts the load.
pub fn load_tables(dir: &Path, extension: &str) -> Result<TableSet, TableError> {
    if !dir.is_dir() {
        return Err(TableError::DirectoryMissing(dir.to_path_buf()));
    }

    let read_err = |e: std::io::Error| TableError::Read {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let suffix = format!(".{extension}");
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.ends_with(&suffix) {
            files.push((name, entry.path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut set = TableSet::new();
    for (name, path) in files {
        let table = load_table(&name, &path)?;
        debug!(
            table = %name,
            rows = table.row_count(),
            columns = table.columns().len(),
            "Loaded table"
        );
        set.push(table);
    }
    Ok(set)
}

/// Parse one CSV file into a typed table named `name`.
pub fn load_table(name: &str, path: &Path) -> Result<Table, TableError> {
    let content = std::fs::read_to_string(path).map_err(|e| TableError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_csv(name, &content)
}

/// Parse CSV text with a header row.
///
/// Records are read flexibly so that a short or long row is reported as
/// [`TableError::RaggedRow`] with its position rather than a generic error.
pub fn parse_csv(name: &str, content: &str) -> Result<Table, TableError> {
    let parse_err = |e: csv::Error| TableError::Parse {
        table: name.to_string(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(TableError::Parse {
            table: name.to_string(),
            reason: "no header row".to_string(),
        });
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Table::from_records(name, headers, records)
}
