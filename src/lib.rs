//! llmscan — static scanner for LLM integration risks.
//!
//! Flags three classes of issue in repositories that call LLM APIs: leaked
//! credentials, unsanitized user input reaching an LLM call, and LLM calls
//! made in loops without rate limiting. One read-only pass over a file tree,
//! a structured report out, no persisted state.

pub mod config;
pub mod engines;
pub mod error;
pub mod observability;
pub mod parser;
pub mod report;
pub mod types;
pub mod walker;
