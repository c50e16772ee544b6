//! genhl - a generic syntax highlighter
//!
//! Languages are described declaratively as Kate-style context/rule
//! definitions (see [`syntax::LanguageDefinition`]) and highlighted line by
//! line, carrying the context stack from one line to the next.

pub mod config;
pub mod error;
pub mod render;
pub mod syntax;

pub use error::{HighlightError, Result};
