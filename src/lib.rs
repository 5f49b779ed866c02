//! lash: an incremental, token-at-a-time parser for a shell-like command
//! language.
//!
//! The engine consumes one pre-lexed token at a time and keeps a rendered
//! AST fragment buffer, so a line-oriented front end can print exactly one
//! output line per input line. Grammars are arenas of rules built in two
//! phases ([`rules::GrammarBuilder`] then [`rules::Grammar`]); a
//! [`session::Session`] drives one parse over a shared grammar and applies
//! the explicit effects its rule hooks compute.

pub use crate::diagnostics::{print_error, LashError};

pub mod cli;
pub mod diagnostics;
mod engine;
pub mod grammar;
pub mod repl;
pub mod rules;
pub mod session;
pub mod token;
