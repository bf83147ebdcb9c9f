//! Lint frame schema files: tab indentation, no trailing whitespace, and
//! layout checks on the frames themselves (overlaps, gaps, self-covering checksums).
//!
//! Usage:
//!   lint_schema [OPTIONS] [FILE ...]
//!   lint_schema < file.frames
//!
//! Options:
//!   --fix, -f    Rewrite files (or print stdin) with whitespace fixed, then lint the result.
//!   --human, -H  Human-readable output
//!
//! Exit code 1 if any error-level finding remains.

use frameproto::lint::{lint, lint_fix, LintMessage, Severity};
use std::io::{self, Read, Write};
use std::path::Path;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_message(path: &str, m: &LintMessage, style: OutputStyle) {
    let severity = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match style {
        OutputStyle::Compact => println!(
            "{}:{}:{}: {}: {} [{}]",
            path,
            m.line,
            m.column,
            severity,
            m.message,
            m.rule.id()
        ),
        OutputStyle::Human => {
            println!("  {} {}:{}: {}", path, m.line, m.column, m.message);
            println!("    rule: {} ({})", m.rule.id(), severity);
        }
    }
}

#[derive(Default)]
struct Totals {
    errors: usize,
    warnings: usize,
}

impl Totals {
    fn report(&mut self, path: &str, messages: &[LintMessage], style: OutputStyle) -> bool {
        for m in messages {
            match m.severity {
                Severity::Error => self.errors += 1,
                Severity::Warning => self.warnings += 1,
            }
            print_message(path, m, style);
        }
        messages.iter().any(|m| m.severity == Severity::Error)
    }
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    match args.iter().position(|a| a == long || a == short) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let fix = take_flag(&mut args, "--fix", "-f");
    let style = if take_flag(&mut args, "--human", "-H") {
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };

    let mut totals = Totals::default();
    let mut has_error = false;

    if args.is_empty() {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        if fix {
            io::stdout().write_all(lint_fix(&src).as_bytes())?;
            return Ok(());
        }
        has_error |= totals.report("<stdin>", &lint(&src), style);
    } else {
        for path in &args {
            let path = Path::new(path);
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    has_error = true;
                    continue;
                }
            };
            let src = if fix {
                let fixed = lint_fix(&src);
                if fixed != src {
                    if let Err(e) = std::fs::write(path, &fixed) {
                        eprintln!("{}: write failed: {}", path.display(), e);
                        has_error = true;
                        continue;
                    }
                    eprintln!("{}: fixed", path.display());
                }
                fixed
            } else {
                src
            };
            has_error |= totals.report(&path.display().to_string(), &lint(&src), style);
        }
    }

    if totals.errors > 0 || totals.warnings > 0 {
        eprintln!("lint: {} error(s), {} warning(s)", totals.errors, totals.warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
