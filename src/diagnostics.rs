//! The unified, `miette`-based diagnostic system for lash. Every error
//! produced by grammar construction, token decoding, or a parse session is a
//! `LashError`; the CLI and REPL render them through `print_error`.

use std::borrow::Cow;
use std::fmt;

use miette::{Diagnostic, Report};
use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LashError {
    /// The session's parser cannot accept this token in any interpretation.
    #[error("unexpected token `{token}`")]
    Rejected { token: Token },

    /// A semantic guard failed; the tokens were well formed but the construct
    /// is not allowed here.
    #[error("{message}")]
    Guard { message: String },

    /// A token was fed to a session that already failed.
    #[error("parse session has already failed; start a new one")]
    SessionFailed,

    /// The grammar under construction is defective.
    #[error("grammar construction failed: {message}")]
    Construction { message: String },

    /// A wire-format field could not be decoded into a token.
    #[error("unrecognized token field `{field}`")]
    Token { field: String },

    /// An engine invariant was violated. Indicates a bug, not bad input.
    #[error("internal parser error: {message}")]
    Internal { message: String },
}

impl Diagnostic for LashError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            LashError::Rejected { .. } => "lash::parse::rejected",
            LashError::Guard { .. } => "lash::parse::guard",
            LashError::SessionFailed => "lash::parse::session_failed",
            LashError::Construction { .. } => "lash::grammar::construction",
            LashError::Token { .. } => "lash::token::decode",
            LashError::Internal { .. } => "lash::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help: Cow<'static, str> = match self {
            LashError::Rejected { .. } => {
                "the line up to this token did not form a complete statement or command".into()
            }
            LashError::Guard { .. } => return None,
            LashError::SessionFailed => {
                "sessions are single-use after failure; the driver should restart".into()
            }
            LashError::Construction { .. } => {
                "check rule references and template slot positions in the grammar definition"
                    .into()
            }
            LashError::Token { .. } => {
                "expected whitespace-separated fields of the form KIND or KIND:payload".into()
            }
            LashError::Internal { .. } => {
                "this is a bug in lash; please report it".into()
            }
        };
        Some(Box::new(help))
    }
}

/// Prints a diagnostic report to stderr using miette's fancy renderer.
pub fn print_error(error: LashError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}
