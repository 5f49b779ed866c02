//! Command-line interface: argument definitions and command dispatch.
//!
//! Uses `clap` with its derive feature for a declarative, type-safe argument
//! structure.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::print_error;
use crate::grammar::language;
use crate::repl::{run_pipe, run_repl, LineDriver};
use crate::token::tokenize_line;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "lash",
    version,
    about = "An incremental, token-at-a-time parser for the lash shell language."
)]
pub struct LashArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Which grammar root a session parses with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Command lines: program invocations and command blocks.
    Shell,
    /// Statement lines: declarations, assignments, branches, blocks.
    Script,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse wire-format token lines and print one AST line per input line.
    Parse {
        /// File of wire lines to parse; stdin when omitted.
        file: Option<PathBuf>,
        /// Grammar root to parse with.
        #[arg(long, value_enum, default_value_t = Mode::Script)]
        mode: Mode,
    },
    /// Interactive session reading wire lines.
    Repl {
        /// Grammar root to parse with.
        #[arg(long, value_enum, default_value_t = Mode::Shell)]
        mode: Mode,
    },
    /// Decode wire lines and dump the tokens as JSON, one array per line.
    Tokens {
        /// File of wire lines to decode; stdin when omitted.
        file: Option<PathBuf>,
    },
}

fn driver_for(mode: Mode) -> LineDriver {
    let lang = language();
    let root = match mode {
        Mode::Shell => lang.shell,
        Mode::Script => lang.script,
    };
    LineDriver::new(Arc::clone(&lang.grammar), root)
}

fn read_input(file: Option<&PathBuf>) -> std::io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => std::io::read_to_string(std::io::stdin()),
    }
}

fn fail(message: &str) -> ! {
    let choice = if atty::is(atty::Stream::Stderr) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(choice);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "error");
    let _ = stderr.reset();
    let _ = writeln!(stderr, ": {message}");
    process::exit(1);
}

/// Parses arguments and runs the selected command. Exits the process on
/// failure.
pub fn run() {
    let args = LashArgs::parse();
    match args.command {
        Command::Parse { file, mode } => {
            let mut driver = driver_for(mode);
            if file.is_none() && !atty::is(atty::Stream::Stdin) {
                if let Err(e) = run_pipe(&mut driver) {
                    fail(&format!("io failure: {e}"));
                }
                return;
            }
            let input = match read_input(file.as_ref()) {
                Ok(input) => input,
                Err(e) => fail(&format!("cannot read input: {e}")),
            };
            let mut failures = 0usize;
            for line in input.lines() {
                match driver.eval_line(line) {
                    Ok(ast) => println!("{ast}"),
                    Err(e) => {
                        failures += 1;
                        print_error(e);
                        println!();
                    }
                }
            }
            if failures > 0 {
                fail(&format!("{failures} line(s) failed to parse"));
            }
        }
        Command::Repl { mode } => {
            let mut driver = driver_for(mode);
            run_repl(&mut driver);
        }
        Command::Tokens { file } => {
            let input = match read_input(file.as_ref()) {
                Ok(input) => input,
                Err(e) => fail(&format!("cannot read input: {e}")),
            };
            for line in input.lines() {
                match tokenize_line(line) {
                    Ok(tokens) => match serde_json::to_string(&tokens) {
                        Ok(json) => println!("{json}"),
                        Err(e) => fail(&format!("cannot serialize tokens: {e}")),
                    },
                    Err(e) => {
                        print_error(e);
                        process::exit(1);
                    }
                }
            }
        }
    }
}
