//! Renders loaded tables as prompt text.
//!
//! Two formats are supported:
//! - **JSON**: one minified object, `{"<table>": [{"<column>": value, ...}, ...], ...}`.
//!   Keys keep table and column order; non-ASCII text is written verbatim.
//! - **Markdown**: one pipe table per table, each under a `## <table>` heading.

use refchat_core::table::{DataFormat, Table, TableSet, Value};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Render every table in `tables`.
///
/// An empty set renders as `{}` in JSON and as an empty string in markdown.
pub fn render(tables: &TableSet, format: DataFormat) -> Result<String, serde_json::Error> {
    match format {
        DataFormat::Json => serde_json::to_string(&JsonTables(tables)),
        DataFormat::Markdown => Ok(tables
            .iter()
            .map(|table| format!("\n\n## {}\n\n{}", table.name(), pipe_table(table)))
            .collect()),
    }
}

/// Render a single table the way [`render`] embeds it, without the heading.
pub fn render_table(table: &Table, format: DataFormat) -> Result<String, serde_json::Error> {
    match format {
        DataFormat::Json => serde_json::to_string(&JsonRecords(table)),
        DataFormat::Markdown => Ok(pipe_table(table)),
    }
}

struct JsonTables<'a>(&'a TableSet);

impl Serialize for JsonTables<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for table in self.0 {
            map.serialize_entry(table.name(), &JsonRecords(table))?;
        }
        map.end()
    }
}

struct JsonRecords<'a>(&'a Table);

impl Serialize for JsonRecords<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let table = self.0;
        let mut seq = serializer.serialize_seq(Some(table.row_count()))?;
        for row in table.rows() {
            seq.serialize_element(&JsonRecord { table, row })?;
        }
        seq.end()
    }
}

struct JsonRecord<'a> {
    table: &'a Table,
    row: &'a [Value],
}

impl Serialize for JsonRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.len()))?;
        for (column, value) in self.table.columns().iter().zip(self.row) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

const MIN_CELL_WIDTH: usize = 3;

/// Render `table` as a padded pipe table.
///
/// Numeric columns are right-aligned, everything else left-aligned. There is
/// no row-number column; rows are identified by their own fields.
fn pipe_table(table: &Table) -> String {
    let columns = table.columns();
    let headers: Vec<String> = columns.iter().map(|c| escape_cell(&c.name)).collect();
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| escape_cell(&v.to_string())).collect())
        .collect();

    let widths: Vec<usize> = (0..columns.len())
        .map(|i| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(headers[i].chars().count()))
                .max()
                .unwrap_or(0)
                .max(MIN_CELL_WIDTH)
        })
        .collect();
    let right: Vec<bool> = columns.iter().map(|c| c.kind.is_numeric()).collect();

    let format_row = |row: &[String]| -> String {
        let padded: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if right[i] {
                    format!("{cell:>width$}", width = widths[i])
                } else {
                    format!("{cell:<width$}", width = widths[i])
                }
            })
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let rule: Vec<String> = widths
        .iter()
        .zip(&right)
        .map(|(width, right)| {
            let dashes = "-".repeat(width + 1);
            if *right {
                format!("{dashes}:")
            } else {
                format!(":{dashes}")
            }
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(format_row(&headers));
    lines.push(format!("|{}|", rule.join("|")));
    lines.extend(cells.iter().map(|row| format_row(row)));
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_records(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn set(tables: Vec<Table>) -> TableSet {
        let mut set = TableSet::new();
        for t in tables {
            set.push(t);
        }
        set
    }

    #[test]
    fn empty_set_renders_empty_object_and_empty_string() {
        let empty = TableSet::new();
        assert_eq!(render(&empty, DataFormat::Json).unwrap(), "{}");
        assert_eq!(render(&empty, DataFormat::Markdown).unwrap(), "");
    }

    #[test]
    fn json_is_minified_and_ordered() {
        let tables = set(vec![
            table("b.csv", &["Name", "Weight"], &[&["kpi_b", "2"]]),
            table("a.csv", &["z", "a"], &[&["1.5", "true"], &["", "false"]]),
        ]);
        let out = render(&tables, DataFormat::Json).unwrap();
        assert_eq!(
            out,
            r#"{"b.csv":[{"Name":"kpi_b","Weight":2}],"a.csv":[{"z":1.5,"a":true},{"z":null,"a":false}]}"#
        );
    }

    #[test]
    fn json_keeps_non_ascii_verbatim() {
        let tables = set(vec![table("uk.csv", &["Назва"], &[&["Продажі"]])]);
        let out = render(&tables, DataFormat::Json).unwrap();
        assert_eq!(out, r#"{"uk.csv":[{"Назва":"Продажі"}]}"#);
    }

    #[test]
    fn markdown_pipe_table() {
        let t = table(
            "cnfg.kpi.csv",
            &["Name", "Weight"],
            &[&["kpi_a", "1"], &["kpi_long", "250"]],
        );
        let expected = "\
| Name     | Weight |
|:---------|-------:|
| kpi_a    |      1 |
| kpi_long |    250 |";
        assert_eq!(render_table(&t, DataFormat::Markdown).unwrap(), expected);

        let out = render(&set(vec![t]), DataFormat::Markdown).unwrap();
        assert_eq!(out, format!("\n\n## cnfg.kpi.csv\n\n{expected}"));
    }

    #[test]
    fn markdown_escapes_pipes_and_newlines() {
        let t = table("t.csv", &["formula"], &[&["a|b\nc"], &[""]]);
        let out = render_table(&t, DataFormat::Markdown).unwrap();
        assert_eq!(out, "| formula |\n|:--------|\n| a\\|b c  |\n|         |");
    }

    #[test]
    fn markdown_counts_width_in_characters() {
        let t = table("t.csv", &["x"], &[&["Дані"]]);
        let out = render_table(&t, DataFormat::Markdown).unwrap();
        assert_eq!(out, "| x    |\n|:-----|\n| Дані |");
    }

    #[test]
    fn render_table_json_is_the_record_array() {
        let t = table("t.csv", &["id"], &[&["1"], &["2"]]);
        assert_eq!(render_table(&t, DataFormat::Json).unwrap(), r#"[{"id":1},{"id":2}]"#);
    }

    #[test]
    fn json_keeps_integers_wider_than_i64_exact() {
        let tables = set(vec![table("ids.csv", &["id"], &[&["12345678901234567890"]])]);
        assert_eq!(
            render(&tables, DataFormat::Json).unwrap(),
            r#"{"ids.csv":[{"id":"12345678901234567890"}]}"#
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let tables = set(vec![
            table("a.csv", &["k", "v"], &[&["x", "1"], &["y", "2"]]),
            table("b.csv", &["k"], &[&["z"]]),
        ]);
        for format in [DataFormat::Json, DataFormat::Markdown] {
            assert_eq!(render(&tables, format).unwrap(), render(&tables, format).unwrap());
        }
    }
}
