//! # refchat core
//!
//! Domain types, traits, and error definitions for the refchat
//! reference-data assistant. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! The external LLM service is defined as a trait here ([`Provider`]) and
//! implemented in `refchat-providers`. This enables:
//! - Swapping the backend via configuration
//! - Easy testing with scripted mock providers
//! - A clean dependency graph

pub mod error;
pub mod message;
pub mod provider;
pub mod table;

// Re-export key types at crate root for ergonomics
pub use error::{DocumentError, Error, ProviderError, TableError};
pub use message::{Conversation, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use table::{Column, ColumnKind, DataFormat, Table, TableSet, Value};
