//! Interactive and pipe-mode line drivers.
//!
//! Input arrives as pre-lexed wire lines. The driver feeds a line's tokens
//! plus an end-of-line marker to the session and emits exactly one line of
//! AST output per line of input. A failed parse prints a diagnostic,
//! discards the session, and starts a fresh one so the next line is parsed
//! from a clean slate.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::diagnostics::{print_error, LashError};
use crate::rules::{Grammar, RuleId};
use crate::session::Session;
use crate::token::{tokenize_line, Token};

/// Line-driver state that persists across lines.
pub struct LineDriver {
    grammar: Arc<Grammar>,
    root: RuleId,
    session: Session,
}

impl LineDriver {
    pub fn new(grammar: Arc<Grammar>, root: RuleId) -> LineDriver {
        let session = Session::new(Arc::clone(&grammar), root);
        LineDriver {
            grammar,
            root,
            session,
        }
    }

    /// Parses one wire line and returns the AST fragment it produced.
    /// On failure the session is replaced; open blocks from earlier lines
    /// are abandoned.
    pub fn eval_line(&mut self, line: &str) -> Result<String, LashError> {
        let tokens = tokenize_line(line).map_err(|e| self.restart_with(e))?;
        for token in tokens {
            self.session
                .feed(token)
                .map_err(|e| self.restart_with(e))?;
        }
        self.session
            .feed(Token::newline())
            .map_err(|e| self.restart_with(e))?;
        Ok(self.session.take_output())
    }

    /// Open block depth, excluding the root entry.
    pub fn open_blocks(&self) -> usize {
        self.session.depth() - 1
    }

    pub fn restart(&mut self) {
        self.session = Session::new(Arc::clone(&self.grammar), self.root);
    }

    fn restart_with(&mut self, error: LashError) -> LashError {
        self.restart();
        error
    }
}

/// Reads wire lines from stdin and writes one AST line per input line.
/// Parse failures are reported to stderr and yield an empty output line,
/// keeping input and output line-aligned.
pub fn run_pipe(driver: &mut LineDriver) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        match driver.eval_line(&line) {
            Ok(ast) => writeln!(out, "{ast}")?,
            Err(e) => {
                print_error(e);
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

/// Main interactive entry point.
pub fn run_repl(driver: &mut LineDriver) {
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!("lash {}", env!("CARGO_PKG_VERSION"));
        println!("Enter wire-format token lines. Type :help for help, :quit to exit.");
        println!();
    }

    loop {
        if interactive {
            if driver.open_blocks() > 0 {
                print!("   -> ");
            } else {
                print!("lash> ");
            }
            let _ = io::stdout().flush();
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                if interactive {
                    println!();
                }
                break;
            }
            Ok(_) => {
                let line = line.trim_end();
                if line.starts_with(':') {
                    match handle_repl_command(line, driver) {
                        ReplCommand::Continue => continue,
                        ReplCommand::Quit => break,
                    }
                }
                match driver.eval_line(line) {
                    Ok(ast) => println!("{ast}"),
                    Err(e) => print_error(e),
                }
            }
            Err(e) => {
                eprintln!("error reading input: {e}");
                break;
            }
        }
    }
}

enum ReplCommand {
    Continue,
    Quit,
}

fn handle_repl_command(command: &str, driver: &mut LineDriver) -> ReplCommand {
    match command.to_ascii_lowercase().as_str() {
        ":help" | ":h" => {
            println!("lash REPL commands:");
            println!("  :help, :h      Show this help");
            println!("  :quit, :q      Exit");
            println!("  :restart, :r   Discard the session and any open blocks");
            ReplCommand::Continue
        }
        ":quit" | ":q" => ReplCommand::Quit,
        ":restart" | ":r" => {
            driver.restart();
            println!("session restarted.");
            ReplCommand::Continue
        }
        _ => {
            println!("unknown command: {command}. Type :help for available commands.");
            ReplCommand::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::language;

    fn script_driver() -> LineDriver {
        let lang = language();
        LineDriver::new(Arc::clone(&lang.grammar), lang.script)
    }

    #[test]
    fn one_output_line_per_input_line() {
        let mut d = script_driver();
        let out = d
            .eval_line("NEW WS ID:x WS EQUALS WS INT:1 SEMI")
            .unwrap();
        assert_eq!(out, "(new (init x (exp 1)));");
    }

    #[test]
    fn failure_restarts_the_session() {
        let mut d = script_driver();
        assert!(d.eval_line("SEMI").is_err());
        let out = d
            .eval_line("NEW WS ID:y WS EQUALS WS INT:2 SEMI")
            .unwrap();
        assert_eq!(out, "(new (init y (exp 2)));");
    }

    #[test]
    fn open_blocks_track_the_context_stack() {
        let mut d = script_driver();
        d.eval_line("IF WS INT:1 WS LBRACE").unwrap();
        assert_eq!(d.open_blocks(), 1);
        d.eval_line("RBRACE").unwrap();
        assert_eq!(d.open_blocks(), 0);
    }
}
