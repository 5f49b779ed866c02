//! Grammar construction checker for lash.
//!
//! Builds the language grammar from its rule definitions and reports any
//! construction defects: unresolved forward references, ambiguous forward
//! names, or malformed output templates. Exits nonzero when the grammar
//! does not build or an expected entry point is missing.
//!
//! ## Usage
//! ```bash
//! cargo run --bin check_grammar
//! ```

use std::process;

use lash::grammar::build_language;
use lash::print_error;

/// Rules every working grammar must define.
const CRITICAL_RULES: &[&str] = &[
    "stmt",
    "exp",
    "codeblock",
    "cmdline",
    "invocation",
    "script",
    "shell",
];

fn main() {
    println!("🔍 Building the lash language grammar");

    let lang = match build_language() {
        Ok(lang) => lang,
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    };

    println!("📋 Built {} grammar rules", lang.grammar.len());

    let mut missing = Vec::new();
    for name in CRITICAL_RULES {
        if lang.grammar.rule_named(name).is_none() {
            missing.push(*name);
        }
    }

    if !missing.is_empty() {
        eprintln!("❌ Missing critical rules:");
        for name in missing {
            eprintln!("  • {name}");
        }
        process::exit(1);
    }

    println!("✅ Grammar check passed - no issues found");
}
