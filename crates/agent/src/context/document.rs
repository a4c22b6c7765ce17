//! Instruction document enrichment.
//!
//! The base instructions are split into an ordered list of sections, each
//! opened by one of the markers an enrichment refers to. Replacing a section
//! or inserting text after a marker is then a structural edit on that list;
//! rendering the sections back gives exactly the text that plain string
//! surgery would have produced.
//!
//! ```text
//! "X\n## Sec\nold\n## Next\nY"
//!   preamble: "X\n"
//!   "## Sec":  "\nold\n"
//!   "## Next": "\nY"
//! ```
//!
//! Markers must match exactly and occur exactly once. Anything else is an
//! error rather than a best-effort edit.

use refchat_config::EnrichmentConfig;
use refchat_core::error::DocumentError;
use std::path::Path;

/// Read the base instruction document.
pub fn load_instructions(path: &Path) -> Result<String, DocumentError> {
    std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// One edit to the instruction document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    /// Replace `start` and everything up to `end` with `text`; `end` and
    /// what follows are kept.
    ReplaceSection {
        start: String,
        end: String,
        text: String,
    },
    /// Insert `text` immediately after `marker`.
    InsertAfter { marker: String, text: String },
}

impl From<&EnrichmentConfig> for Enrichment {
    fn from(config: &EnrichmentConfig) -> Self {
        match config {
            EnrichmentConfig::ReplaceSection { start, end, text } => Self::ReplaceSection {
                start: start.clone(),
                end: end.clone(),
                text: text.clone(),
            },
            EnrichmentConfig::InsertAfter { marker, text } => Self::InsertAfter {
                marker: marker.clone(),
                text: text.clone(),
            },
        }
    }
}

impl Enrichment {
    /// Apply this edit, producing a new text.
    pub fn apply(&self, text: &str) -> Result<String, DocumentError> {
        match self {
            Self::ReplaceSection { start, end, text: new } => {
                let mut doc = InstructionDocument::split(text, &[start, end])?;
                if doc.position(end) < doc.position(start) {
                    return Err(DocumentError::MarkersOutOfOrder {
                        start: start.clone(),
                        end: end.clone(),
                    });
                }
                doc.replace_section(start, new);
                Ok(doc.render())
            }
            Self::InsertAfter { marker, text: extra } => {
                if extra.is_empty() {
                    return Ok(text.to_string());
                }
                let mut doc = InstructionDocument::split(text, &[marker])?;
                doc.insert_after(marker, extra);
                Ok(doc.render())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    /// The marker opening this section; `None` for the preamble or for
    /// replaced content.
    marker: Option<String>,
    body: String,
}

/// An instruction text split at a set of markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDocument {
    sections: Vec<Section>,
}

impl InstructionDocument {
    /// Split `text` at each of `markers`.
    ///
    /// Every marker must occur exactly once and no two marker occurrences may
    /// overlap.
    pub fn split(text: &str, markers: &[&String]) -> Result<Self, DocumentError> {
        let mut located: Vec<(usize, &str)> = Vec::with_capacity(markers.len());
        for marker in markers {
            let marker = marker.as_str();
            match text.matches(marker).count() {
                0 => return Err(DocumentError::MarkerMissing(marker.to_string())),
                1 => {}
                count => {
                    return Err(DocumentError::MarkerRepeated {
                        marker: marker.to_string(),
                        count,
                    });
                }
            }
            if let Some(pos) = text.find(marker) {
                located.push((pos, marker));
            }
        }
        located.sort_by_key(|(pos, _)| *pos);

        for pair in located.windows(2) {
            let (first_pos, first) = pair[0];
            let (second_pos, second) = pair[1];
            if first_pos + first.len() > second_pos {
                return Err(DocumentError::MarkersOverlap {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }

        let mut sections = Vec::with_capacity(located.len() + 1);
        let mut cursor = 0;
        let mut open: Option<String> = None;
        for (pos, marker) in located {
            sections.push(Section {
                marker: open.take(),
                body: text[cursor..pos].to_string(),
            });
            open = Some(marker.to_string());
            cursor = pos + marker.len();
        }
        sections.push(Section {
            marker: open,
            body: text[cursor..].to_string(),
        });

        Ok(Self { sections })
    }

    /// Keys of the marked sections, in document order.
    pub fn markers(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter_map(|s| s.marker.as_deref())
            .collect()
    }

    fn position(&self, marker: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.marker.as_deref() == Some(marker))
    }

    /// Swap the section opened by `marker` (marker included) for `text`.
    fn replace_section(&mut self, marker: &str, text: &str) {
        if let Some(idx) = self.position(marker) {
            self.sections[idx] = Section {
                marker: None,
                body: text.to_string(),
            };
        }
    }

    fn insert_after(&mut self, marker: &str, text: &str) {
        if let Some(idx) = self.position(marker) {
            self.sections[idx].body.insert_str(0, text);
        }
    }

    /// Concatenate the sections back into one text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if let Some(marker) = &section.marker {
                out.push_str(marker);
            }
            out.push_str(&section.body);
        }
        out
    }
}

/// Applies a configured list of enrichments in order.
#[derive(Debug, Clone, Default)]
pub struct PromptEnricher {
    enrichments: Vec<Enrichment>,
}

impl PromptEnricher {
    pub fn new(enrichments: Vec<Enrichment>) -> Self {
        Self { enrichments }
    }

    pub fn from_config(configs: &[EnrichmentConfig]) -> Self {
        Self::new(configs.iter().map(Enrichment::from).collect())
    }

    pub fn len(&self) -> usize {
        self.enrichments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enrichments.is_empty()
    }

    /// Run every enrichment, each on the previous one's output.
    pub fn enrich(&self, text: &str) -> Result<String, DocumentError> {
        let mut current = text.to_string();
        for enrichment in &self.enrichments {
            current = enrichment.apply(&current)?;
        }
        Ok(current)
    }
}
