//! Prompt context pipeline.
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`tables`] | tables directory | [`TableSet`](refchat_core::TableSet) |
//! | [`document`] | instruction file + enrichments | enriched instructions |
//! | [`serializer`] | tables + format | JSON or markdown text |
//! | [`assembler`] | instructions + header + data | [`FinalPrompt`] |
//! | [`token`] | any of the above | [`TokenReport`] |

pub mod assembler;
pub mod document;
pub mod serializer;
pub mod tables;
pub mod token;

pub use assembler::{FinalPrompt, PromptAssembler};
pub use document::{Enrichment, InstructionDocument, PromptEnricher, load_instructions};
pub use serializer::{render, render_table};
pub use tables::load_tables;
pub use token::{TableTokens, TokenAccountant, TokenReport};
